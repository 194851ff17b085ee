// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JavaScript API for the viewer
//!
//! ```javascript
//! const viewer = new IfcViewer({ selectionFilter: "selectableOnly" });
//! const load = viewer.beginLoad();
//! const g = viewer.addGeometry(load, 42, false, positions, normals, indices);
//! const m = viewer.addMaterial(load, 0.8, 0.8, 0.8, 1.0);
//! viewer.addInstance(load, 1001, g, m, matrix);
//! viewer.finishLoad(load);
//! for (const mesh of viewer.getAllMeshes()) { ... }
//! ```

use ifc_lite_data::{ElementData, ProcessRequest, Property};
use ifc_lite_scene::{
    Element, ElementKey, Error, LoadTicket, LoadingStatus, SubscriptionId, ViewMode,
    ViewerConfig, ViewerEvent, ViewerState,
};
use js_sys::{Array, Function};
use rustc_hash::FxHashMap;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::meshes::{GeometryJs, InstancedMeshJs, PointerHitJs};
use crate::staging::PendingModel;
use crate::utils::{js_error, warn};

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(js_error)
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsError> {
    serde_wasm_bindgen::from_value(value).map_err(js_error)
}

fn is_absent(value: &JsValue) -> bool {
    value.is_undefined() || value.is_null()
}

/// Event payload handed to subscribers.
#[derive(Serialize)]
#[serde(tag = "type")]
enum EventJs {
    #[serde(rename = "selectionChanged")]
    SelectionChanged {
        #[serde(rename = "expressId")]
        express_id: Option<u32>,
    },
    #[serde(rename = "hoverChanged")]
    HoverChanged {
        #[serde(rename = "expressId")]
        express_id: Option<u32>,
    },
    #[serde(rename = "viewModeChanged")]
    ViewModeChanged { mode: ViewMode },
    #[serde(rename = "modelLoaded")]
    ModelLoaded { elements: usize, instances: usize },
    #[serde(rename = "dataRestored")]
    DataRestored { elements: usize },
    #[serde(rename = "progress")]
    Progress {
        status: LoadingStatus,
        loaded: usize,
        total: usize,
    },
}

impl From<&ViewerEvent> for EventJs {
    fn from(event: &ViewerEvent) -> Self {
        match *event {
            ViewerEvent::SelectionChanged { express_id, .. } => EventJs::SelectionChanged { express_id },
            ViewerEvent::HoverChanged { express_id, .. } => EventJs::HoverChanged { express_id },
            ViewerEvent::ViewModeChanged(mode) => EventJs::ViewModeChanged { mode },
            ViewerEvent::ModelLoaded {
                elements,
                instances,
            } => EventJs::ModelLoaded {
                elements,
                instances,
            },
            ViewerEvent::DataRestored { elements } => EventJs::DataRestored { elements },
            ViewerEvent::Progress(p) => EventJs::Progress {
                status: p.status,
                loaded: p.loaded,
                total: p.total,
            },
        }
    }
}

/// Instanced IFC viewer state exposed to JavaScript.
#[wasm_bindgen]
pub struct IfcViewer {
    state: ViewerState,
    pending: Option<(LoadTicket, PendingModel)>,
    subscriptions: FxHashMap<u32, SubscriptionId>,
    next_subscription: u32,
}

#[wasm_bindgen]
impl IfcViewer {
    /// Create a viewer. `config` may be omitted; missing fields use defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<IfcViewer, JsError> {
        let config: ViewerConfig = if is_absent(&config) {
            ViewerConfig::default()
        } else {
            from_js(config)?
        };
        Ok(Self {
            state: ViewerState::new(config),
            pending: None,
            subscriptions: FxHashMap::default(),
            next_subscription: 0,
        })
    }

    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    /// Drop the current model and start a new load. Returns the load id
    /// every staging call must pass.
    #[wasm_bindgen(js_name = beginLoad)]
    pub fn begin_load(&mut self) -> f64 {
        let ticket = self.state.begin_load();
        self.pending = Some((ticket, PendingModel::new()));
        ticket.id() as f64
    }

    fn staging(&mut self, load: f64) -> Result<&mut PendingModel, JsError> {
        let current = self.pending.as_ref().map(|(ticket, _)| ticket.id());
        match &mut self.pending {
            Some((ticket, model)) if ticket.id() == load as u64 => Ok(model),
            _ => Err(js_error(Error::StaleLoad {
                ticket: load as u64,
                current: current.unwrap_or_default(),
            })),
        }
    }

    /// Stage a mesh. Returns its geometry id.
    #[wasm_bindgen(js_name = addGeometry)]
    pub fn add_geometry(
        &mut self,
        load: f64,
        express_id: u32,
        transparent: bool,
        positions: Vec<f32>,
        normals: Vec<f32>,
        indices: Vec<u32>,
    ) -> Result<String, JsError> {
        self.staging(load)?
            .add_geometry(express_id, transparent, positions, normals, indices)
            .map_err(js_error)
    }

    /// Stage the material for a color. Returns its material id.
    #[wasm_bindgen(js_name = addMaterial)]
    pub fn add_material(&mut self, load: f64, r: f32, g: f32, b: f32, a: f32) -> Result<String, JsError> {
        Ok(self.staging(load)?.add_material(r, g, b, a))
    }

    /// Stage property data for one element.
    #[wasm_bindgen(js_name = addElement)]
    pub fn add_element(&mut self, load: f64, data: JsValue) -> Result<(), JsError> {
        let data: ElementData = from_js(data)?;
        self.staging(load)?.add_element(data).map_err(js_error)
    }

    /// Stage one placement. `matrix` is 16 column-major values.
    #[wasm_bindgen(js_name = addInstance)]
    pub fn add_instance(
        &mut self,
        load: f64,
        express_id: u32,
        geometry_id: &str,
        material_id: &str,
        matrix: &[f32],
    ) -> Result<(), JsError> {
        self.staging(load)?
            .add_instance(express_id, geometry_id, material_id, matrix)
            .map_err(js_error)
    }

    /// Publish loader progress. `status` is a `LoadingStatus` name such as
    /// `"LOADING_MESHES"`.
    #[wasm_bindgen(js_name = reportProgress)]
    pub fn report_progress(
        &mut self,
        load: f64,
        status: JsValue,
        loaded: usize,
        total: usize,
    ) -> Result<(), JsError> {
        let status: LoadingStatus = from_js(status)?;
        self.state
            .report_progress(LoadTicket::from(load as u64), status, loaded, total)
            .map_err(js_error)
    }

    /// Apply everything staged for `load` and frame the model.
    #[wasm_bindgen(js_name = finishLoad)]
    pub fn finish_load(&mut self, load: f64) -> Result<(), JsError> {
        let ticket = LoadTicket::from(load as u64);
        let model = match self.pending.take() {
            Some((pending, model)) if pending == ticket => model,
            other => {
                self.pending = other;
                PendingModel::new()
            }
        };
        self.state
            .finish_load(ticket, |registry| model.apply(registry).map(|_| ()))
            .map_err(js_error)
    }

    /// Merge processed element data into the current model.
    #[wasm_bindgen(js_name = setElementsData)]
    pub fn set_elements_data(&mut self, load: f64, data: JsValue) -> Result<usize, JsError> {
        let data: Vec<ElementData> = from_js(data)?;
        self.state
            .restore_data(LoadTicket::from(load as u64), data)
            .map_err(js_error)
    }

    /// Compute links, selectable and always-visible flags from requirements.
    #[wasm_bindgen(js_name = processData)]
    pub fn process_data(&mut self, load: f64, request: JsValue) -> Result<usize, JsError> {
        let request: ProcessRequest = if is_absent(&request) {
            ProcessRequest::default()
        } else {
            from_js(request)?
        };
        self.state
            .process_data(LoadTicket::from(load as u64), &request)
            .map_err(js_error)
    }

    #[wasm_bindgen(getter, js_name = loadingProgress)]
    pub fn loading_progress(&self) -> Result<JsValue, JsError> {
        to_js(&self.state.loading_progress())
    }

    // ---------------------------------------------------------------------
    // Scene access
    // ---------------------------------------------------------------------

    /// One entry per pooled buffer, including empty ones. Reading clears
    /// each buffer's dirty flag.
    #[wasm_bindgen(js_name = getAllMeshes)]
    pub fn get_all_meshes(&mut self) -> Result<Array, JsError> {
        let keys: Vec<_> = self.state.registry().all_meshes().map(|(key, _)| key).collect();
        let meshes = Array::new();
        for key in keys {
            let dirty = self.state.registry_mut().take_dirty(key).map_err(js_error)?;
            if let Some(buffer) = self.state.registry().buffer(key) {
                meshes.push(&JsValue::from(InstancedMeshJs::new(buffer, dirty)));
            }
        }
        Ok(meshes)
    }

    #[wasm_bindgen(js_name = getGeometry)]
    pub fn get_geometry(&self, geometry_id: &str) -> Option<GeometryJs> {
        self.state
            .registry()
            .geometry(geometry_id)
            .map(|geometry| GeometryJs::from(geometry.as_ref()))
    }

    #[wasm_bindgen(getter, js_name = instanceCount)]
    pub fn instance_count(&self) -> usize {
        self.state.registry().live_instance_count()
    }

    /// Property data of one element, or `undefined`.
    #[wasm_bindgen(js_name = getIfcElement)]
    pub fn get_ifc_element(&self, express_id: u32) -> Result<JsValue, JsError> {
        let registry = self.state.registry();
        match registry
            .element_by_express_id(express_id)
            .and_then(|key| registry.element(key))
        {
            Some(element) => to_js(&element.data),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    #[wasm_bindgen(js_name = getAllSelectableElements)]
    pub fn get_all_selectable_elements(&self) -> Result<JsValue, JsError> {
        self.collect(self.state.registry().selectable_elements())
    }

    #[wasm_bindgen(js_name = getAllAlwaysVisibleElements)]
    pub fn get_all_always_visible_elements(&self) -> Result<JsValue, JsError> {
        self.collect(self.state.registry().always_visible_elements())
    }

    #[wasm_bindgen(js_name = getAllElementsWithData)]
    pub fn get_all_elements_with_data(&self) -> Result<JsValue, JsError> {
        self.collect(self.state.registry().elements_with_data())
    }

    // ---------------------------------------------------------------------
    // Selection and view
    // ---------------------------------------------------------------------

    #[wasm_bindgen(getter, js_name = selectedExpressId)]
    pub fn selected_express_id(&self) -> Option<u32> {
        self.express_id(self.state.selected().map(|s| s.element))
    }

    #[wasm_bindgen(getter, js_name = hoveredExpressId)]
    pub fn hovered_express_id(&self) -> Option<u32> {
        self.express_id(self.state.hovered().map(|s| s.element))
    }

    /// Select by express id; `undefined` clears the selection.
    #[wasm_bindgen(js_name = selectByExpressId)]
    pub fn select_by_express_id(&mut self, express_id: Option<u32>) -> Result<Option<u32>, JsError> {
        let element = self.state.select_by_express_id(express_id).map_err(js_error)?;
        Ok(self.express_id(element))
    }

    /// Select the first element carrying `{ name, value }` and frame it.
    #[wasm_bindgen(js_name = selectByProperty)]
    pub fn select_by_property(&mut self, property: JsValue) -> Result<Option<u32>, JsError> {
        let property: Option<Property> = if is_absent(&property) {
            None
        } else {
            Some(from_js(property)?)
        };
        let element = self
            .state
            .select_by_property(property.as_ref())
            .map_err(js_error)?;
        Ok(self.express_id(element))
    }

    #[wasm_bindgen(getter, js_name = viewMode)]
    pub fn view_mode(&self) -> Result<JsValue, JsError> {
        to_js(&self.state.view_mode())
    }

    /// Switch to `mode`, or to the next mode when omitted.
    #[wasm_bindgen(js_name = changeViewMode)]
    pub fn change_view_mode(&mut self, mode: JsValue) -> Result<JsValue, JsError> {
        let mode: Option<ViewMode> = if is_absent(&mode) {
            None
        } else {
            Some(from_js(mode)?)
        };
        let mode = self.state.change_view_mode(mode).map_err(js_error)?;
        to_js(&mode)
    }

    #[wasm_bindgen(js_name = fitView)]
    pub fn fit_view(&mut self) -> bool {
        self.state.fit_view()
    }

    #[wasm_bindgen(js_name = focusView)]
    pub fn focus_view(&mut self) -> bool {
        self.state.focus_view()
    }

    #[wasm_bindgen(js_name = resetView)]
    pub fn reset_view(&mut self) -> Result<bool, JsError> {
        self.state.reset_view().map_err(js_error)
    }

    /// `[x, y, z, radius]` of the sphere `fitView` frames.
    #[wasm_bindgen(getter, js_name = boundingSphere)]
    pub fn bounding_sphere(&self) -> Vec<f32> {
        let sphere = self.state.bounding_sphere();
        vec![sphere.center.x, sphere.center.y, sphere.center.z, sphere.radius]
    }

    // ---------------------------------------------------------------------
    // Camera
    // ---------------------------------------------------------------------

    #[wasm_bindgen(getter, js_name = cameraPosition)]
    pub fn camera_position(&self) -> Vec<f32> {
        self.state.camera().position.coords.as_slice().to_vec()
    }

    #[wasm_bindgen(getter, js_name = cameraTarget)]
    pub fn camera_target(&self) -> Vec<f32> {
        self.state.camera().target.coords.as_slice().to_vec()
    }

    /// Orbit-control update from the host.
    #[wasm_bindgen(js_name = setCamera)]
    pub fn set_camera(&mut self, position: &[f32], target: &[f32]) -> Result<(), JsError> {
        let (&[px, py, pz], &[tx, ty, tz]) = (position, target) else {
            return Err(JsError::new("Camera position and target need 3 values each"));
        };
        let camera = self.state.camera_mut();
        camera.position = nalgebra::Point3::new(px, py, pz);
        camera.target = nalgebra::Point3::new(tx, ty, tz);
        Ok(())
    }

    /// Column-major view matrix
    #[wasm_bindgen(getter, js_name = viewMatrix)]
    pub fn view_matrix(&self) -> Vec<f32> {
        self.state.camera().view_matrix().as_slice().to_vec()
    }

    /// Column-major projection matrix for a viewport
    #[wasm_bindgen(js_name = projectionMatrix)]
    pub fn projection_matrix(&mut self, width: f32, height: f32) -> Vec<f32> {
        let camera = self.state.camera_mut();
        camera.set_viewport(width, height);
        camera.projection_matrix().as_slice().to_vec()
    }

    // ---------------------------------------------------------------------
    // Pointer
    // ---------------------------------------------------------------------

    /// All hits under a pixel, nearest first.
    pub fn pick(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<Array, JsError> {
        let hits = self.state.pick(x, y, width, height).map_err(js_error)?;
        let out = Array::new();
        for hit in &hits {
            if let Some(hit) = PointerHitJs::from_hit(hit, self.state.registry()) {
                out.push(&JsValue::from(hit));
            }
        }
        Ok(out)
    }

    /// Returns the hovered express id.
    #[wasm_bindgen(js_name = onPointerMove)]
    pub fn on_pointer_move(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<Option<u32>, JsError> {
        let element = self
            .state
            .handle_pointer_move(x, y, width, height)
            .map_err(js_error)?;
        Ok(self.express_id(element))
    }

    #[wasm_bindgen(js_name = onPointerDown)]
    pub fn on_pointer_down(&mut self, x: f32, y: f32) {
        self.state.handle_pointer_down(x, y);
    }

    /// Returns whether the release counted as a click.
    #[wasm_bindgen(js_name = onPointerUp)]
    pub fn on_pointer_up(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<bool, JsError> {
        self.state
            .handle_pointer_up(x, y, width, height)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = onPointerLeave)]
    pub fn on_pointer_leave(&mut self) -> Result<(), JsError> {
        self.state.handle_pointer_leave().map_err(js_error)
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Call `callback(event)` on every change. Returns an id for
    /// `unsubscribe`.
    pub fn subscribe(&mut self, callback: Function) -> u32 {
        let id = self.next_subscription;
        self.next_subscription += 1;
        let subscription = self.state.subscribe(move |event| {
            let payload = match to_js(&EventJs::from(event)) {
                Ok(payload) => payload,
                Err(_) => {
                    warn("failed to serialize viewer event");
                    return;
                }
            };
            if callback.call1(&JsValue::NULL, &payload).is_err() {
                warn("viewer event listener threw");
            }
        });
        self.subscriptions.insert(id, subscription);
        id
    }

    pub fn unsubscribe(&mut self, id: u32) -> bool {
        self.subscriptions
            .remove(&id)
            .is_some_and(|subscription| self.state.unsubscribe(subscription))
    }
}

impl IfcViewer {
    fn express_id(&self, element: Option<ElementKey>) -> Option<u32> {
        element
            .and_then(|key| self.state.registry().element(key))
            .map(Element::express_id)
    }

    fn collect<'a>(&self, elements: impl Iterator<Item = (ElementKey, &'a Element)>) -> Result<JsValue, JsError> {
        let mut data: Vec<&ElementData> = elements.map(|(_, e)| &e.data).collect();
        data.sort_by_key(|d| d.express_id);
        to_js(&data)
    }
}
