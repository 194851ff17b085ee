// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer state container.
//!
//! [`ViewerState`] owns one model's registry together with the camera, the
//! pointer resolver, the current selection and hover, the view mode and the
//! list of subscribers notified when any of them change. Its lifetime is the
//! viewer's; nothing here is process-global.
//!
//! Loads are sequenced with [`LoadTicket`]s. Starting a load invalidates
//! every earlier ticket, so work that was already in flight may finish but
//! its result is rejected with [`Error::StaleLoad`].

use std::fmt;

use ifc_lite_data::{
    match_properties_and_type, process_elements, ElementData, ExpressId, ProcessRequest, Property,
};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::bounds::Sphere;
use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::keys::{ElementKey, InstanceState, RecordKey};
use crate::picking::{pointer_to_ndc, PointerHit, PointerResolver, PointerTracker};
use crate::registry::ElementRegistry;
use crate::spatial::{fit_camera_to_sphere, focus_camera_on, SpatialQuery};

/// Which elements are drawn and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewMode {
    /// Everything in its default material.
    #[default]
    #[serde(rename = "VIEW_MODE_ALL")]
    All,
    /// Elements that are neither selectable nor always visible are ghosted.
    #[serde(rename = "VIEW_MODE_TRANSPARENT")]
    Transparent,
    /// Elements that are neither selectable nor always visible are hidden.
    #[serde(rename = "VIEW_MODE_SELECTABLE")]
    Selectable,
}

impl ViewMode {
    /// Selectable → All → Transparent → Selectable.
    pub fn next(self) -> Self {
        match self {
            ViewMode::Selectable => ViewMode::All,
            ViewMode::All => ViewMode::Transparent,
            ViewMode::Transparent => ViewMode::Selectable,
        }
    }
}

/// Lifecycle of a model load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingStatus {
    #[default]
    NotInitialized,
    Fetching,
    LoadingMeshes,
    LoadingProperties,
    Processing,
    SettingData,
    Done,
    Error,
    ErrorFetching,
    ErrorLoadingMeshes,
    ErrorLoadingProperties,
    ErrorProcessing,
    ErrorSettingData,
}

impl LoadingStatus {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            LoadingStatus::Error
                | LoadingStatus::ErrorFetching
                | LoadingStatus::ErrorLoadingMeshes
                | LoadingStatus::ErrorLoadingProperties
                | LoadingStatus::ErrorProcessing
                | LoadingStatus::ErrorSettingData
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadingProgress {
    pub status: LoadingStatus,
    pub loaded: usize,
    pub total: usize,
}

impl LoadingProgress {
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.loaded as f32 / self.total as f32 * 100.0
    }
}

/// Identifies one load. Only the most recent ticket is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl From<u64> for LoadTicket {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// An element, optionally narrowed to one of its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub element: ElementKey,
    pub record: Option<RecordKey>,
}

impl Selection {
    pub fn element(element: ElementKey) -> Self {
        Self {
            element,
            record: None,
        }
    }
}

impl From<PointerHit> for Selection {
    fn from(hit: PointerHit) -> Self {
        Self {
            element: hit.element,
            record: Some(hit.record),
        }
    }
}

/// Notification sent to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    SelectionChanged {
        selection: Option<Selection>,
        express_id: Option<ExpressId>,
    },
    HoverChanged {
        selection: Option<Selection>,
        express_id: Option<ExpressId>,
    },
    ViewModeChanged(ViewMode),
    ModelLoaded {
        elements: usize,
        instances: usize,
    },
    DataRestored {
        elements: usize,
    },
    Progress(LoadingProgress),
}

/// Handle returned by [`ViewerState::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&ViewerEvent)>;

fn publish_progress(
    listeners: &mut [(SubscriptionId, Listener)],
    progress: &mut LoadingProgress,
    status: LoadingStatus,
    loaded: usize,
    total: usize,
) {
    *progress = LoadingProgress {
        status,
        loaded,
        total,
    };
    let event = ViewerEvent::Progress(*progress);
    for (_, listener) in listeners {
        listener(&event);
    }
}

/// Selection, hover, view mode and camera state of one viewer.
pub struct ViewerState {
    registry: ElementRegistry,
    resolver: PointerResolver,
    tracker: PointerTracker,
    camera: Camera,
    config: ViewerConfig,

    view_mode: ViewMode,
    selected: Option<Selection>,
    hovered: Option<Selection>,
    bounding_sphere: Sphere,

    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,

    load_epoch: u64,
    progress: LoadingProgress,
}

impl fmt::Debug for ViewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerState")
            .field("view_mode", &self.view_mode)
            .field("selected", &self.selected)
            .field("hovered", &self.hovered)
            .field("camera", &self.camera)
            .field("listeners", &self.listeners.len())
            .field("load_epoch", &self.load_epoch)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl ViewerState {
    pub fn new(config: ViewerConfig) -> Self {
        let [x, y, z] = config.reset_camera_position;
        let camera = Camera {
            position: Point3::new(x, y, z),
            ..Camera::default()
        };
        Self {
            registry: ElementRegistry::with_options(config.palette(), config.initial_buffer_capacity),
            resolver: PointerResolver::new(config.selection_filter),
            tracker: PointerTracker::new(config.pointer_move_threshold_px, config.click_threshold_px),
            camera,
            view_mode: ViewMode::default(),
            selected: None,
            hovered: None,
            bounding_sphere: Sphere::zero(),
            listeners: Vec::new(),
            next_subscription: 0,
            load_epoch: 0,
            progress: LoadingProgress::default(),
            config,
        }
    }

    #[inline]
    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    /// Direct registry access for loaders. Call
    /// [`refresh_display`](Self::refresh_display) after bulk changes.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut ElementRegistry {
        &mut self.registry
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[inline]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[inline]
    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    #[inline]
    pub fn selected(&self) -> Option<Selection> {
        self.selected
    }

    #[inline]
    pub fn hovered(&self) -> Option<Selection> {
        self.hovered
    }

    /// Sphere framed by `fit_view`: the selection, or the whole model.
    #[inline]
    pub fn bounding_sphere(&self) -> Sphere {
        self.bounding_sphere
    }

    #[inline]
    pub fn loading_progress(&self) -> LoadingProgress {
        self.progress
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ViewerEvent) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: ViewerEvent) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Drops the current model and starts a new load. Earlier tickets become
    /// stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_epoch += 1;
        self.registry.clear();
        self.resolver.invalidate();
        self.selected = None;
        self.hovered = None;
        self.bounding_sphere = Sphere::zero();
        tracing::debug!(ticket = self.load_epoch, "load started");
        self.set_progress(LoadingStatus::Fetching, 0, 0);
        LoadTicket(self.load_epoch)
    }

    fn check_ticket(&self, ticket: LoadTicket) -> Result<()> {
        if ticket.0 != self.load_epoch {
            tracing::warn!(ticket = ticket.0, current = self.load_epoch, "discarding stale load");
            return Err(Error::StaleLoad {
                ticket: ticket.0,
                current: self.load_epoch,
            });
        }
        Ok(())
    }

    fn set_progress(&mut self, status: LoadingStatus, loaded: usize, total: usize) {
        publish_progress(&mut self.listeners, &mut self.progress, status, loaded, total);
    }

    /// Publishes loader progress for the current load.
    pub fn report_progress(
        &mut self,
        ticket: LoadTicket,
        status: LoadingStatus,
        loaded: usize,
        total: usize,
    ) -> Result<()> {
        self.check_ticket(ticket)?;
        self.set_progress(status, loaded, total);
        Ok(())
    }

    /// Populates the registry for `ticket`, then aligns the model, applies
    /// the view mode and frames the camera.
    ///
    /// A stale ticket is rejected before `populate` runs.
    pub fn finish_load<F>(&mut self, ticket: LoadTicket, populate: F) -> Result<()>
    where
        F: FnOnce(&mut ElementRegistry) -> Result<()>,
    {
        self.check_ticket(ticket)?;
        self.set_progress(LoadingStatus::LoadingMeshes, 0, 0);

        if let Err(err) = populate(&mut self.registry) {
            tracing::warn!(error = %err, "populating model failed");
            self.set_progress(LoadingStatus::ErrorLoadingMeshes, 0, 0);
            return Err(err);
        }

        let [x, y, z] = self.config.align_on_load;
        self.registry.align_model(x, y, z);
        self.refresh_display()?;
        self.reset_view()?;

        let elements = self.registry.element_count();
        let instances = self.registry.live_instance_count();
        tracing::info!(elements, instances, "model loaded");
        self.set_progress(LoadingStatus::Done, elements, elements);
        self.emit(ViewerEvent::ModelLoaded {
            elements,
            instances,
        });
        Ok(())
    }

    /// Merges externally processed element data for `ticket`.
    pub fn restore_data(&mut self, ticket: LoadTicket, data: Vec<ElementData>) -> Result<usize> {
        self.check_ticket(ticket)?;
        let total = data.len();
        self.set_progress(LoadingStatus::SettingData, 0, total);

        let restored = self.registry.restore_data(data);
        if let Err(err) = self.refresh_display() {
            self.set_progress(LoadingStatus::ErrorSettingData, 0, total);
            return Err(err);
        }

        self.set_progress(LoadingStatus::Done, restored, total);
        self.emit(ViewerEvent::DataRestored { elements: restored });
        Ok(restored)
    }

    /// Runs the requirement processor on a copy of the element data and
    /// merges the result. Subscribers receive `Processing` progress after
    /// every batch.
    pub fn process_data(&mut self, ticket: LoadTicket, request: &ProcessRequest) -> Result<usize> {
        self.check_ticket(ticket)?;

        let mut snapshot: Vec<ElementData> = self
            .registry
            .elements()
            .map(|(_, element)| element.data.clone())
            .collect();
        let mut request = request.clone();
        request.batch_size.get_or_insert(self.config.process_batch_size);

        let (listeners, progress) = (&mut self.listeners, &mut self.progress);
        let processed = process_elements(&mut snapshot, &request, |report| {
            publish_progress(
                listeners,
                progress,
                LoadingStatus::Processing,
                report.processed,
                report.total,
            );
        });
        if let Err(err) = processed {
            self.set_progress(LoadingStatus::ErrorProcessing, 0, snapshot.len());
            return Err(err.into());
        }

        self.restore_data(ticket, snapshot)
    }

    // =========================================================================
    // Display
    // =========================================================================

    /// State an element should be drawn in under the current selection,
    /// hover and view mode.
    pub fn display_state(&self, element: ElementKey) -> InstanceState {
        if self.selected.is_some_and(|s| s.element == element) {
            return InstanceState::Selected;
        }
        if self.hovered.is_some_and(|s| s.element == element) {
            return InstanceState::Hovered;
        }
        let featured = self
            .registry
            .element(element)
            .is_some_and(|e| e.is_selectable() || e.is_always_visible());
        match self.view_mode {
            ViewMode::All => InstanceState::Default,
            ViewMode::Transparent if featured => InstanceState::Default,
            ViewMode::Transparent => InstanceState::Transparent,
            ViewMode::Selectable if featured => InstanceState::Default,
            ViewMode::Selectable => InstanceState::Hidden,
        }
    }

    fn update_display(&mut self, element: ElementKey) -> Result<()> {
        let state = self.display_state(element);
        self.registry.set_element_state(element, state)
    }

    /// Re-applies the display state of every element.
    pub fn refresh_display(&mut self) -> Result<()> {
        let elements: Vec<ElementKey> = self.registry.elements().map(|(key, _)| key).collect();
        for element in elements {
            self.update_display(element)?;
        }
        self.update_bounding_sphere();
        Ok(())
    }

    /// Sets the view mode, or advances to the next one when `None`.
    pub fn change_view_mode(&mut self, mode: Option<ViewMode>) -> Result<ViewMode> {
        let mode = mode.unwrap_or_else(|| self.view_mode.next());
        self.view_mode = mode;
        self.refresh_display()?;
        self.emit(ViewerEvent::ViewModeChanged(mode));
        Ok(mode)
    }

    fn update_bounding_sphere(&mut self) {
        let spatial = SpatialQuery::new(&self.registry);
        self.bounding_sphere = match self.selected {
            Some(Selection {
                record: Some(record),
                ..
            }) => spatial.bounding_sphere_of_instance(record),
            Some(Selection { element, .. }) => spatial.bounding_sphere_of_element(element),
            None => spatial.bounding_sphere_of_model(),
        };
    }

    fn express_id(&self, selection: Option<Selection>) -> Option<ExpressId> {
        selection
            .and_then(|s| self.registry.element(s.element))
            .map(|e| e.express_id())
    }

    fn validate(&self, selection: Option<Selection>) -> Result<()> {
        if let Some(selection) = selection {
            if self.registry.element(selection.element).is_none() {
                return Err(Error::InvalidElement(selection.element));
            }
            if let Some(record) = selection.record {
                if self.registry.record(record).map(|r| r.element()) != Some(selection.element) {
                    return Err(Error::InvalidRecord(record));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Selection and hover
    // =========================================================================

    /// Selects an element (or clears the selection) and re-styles the
    /// previous and new selection.
    pub fn select(&mut self, selection: Option<Selection>) -> Result<()> {
        self.validate(selection)?;
        let previous = std::mem::replace(&mut self.selected, selection);
        if let Some(previous) = previous {
            self.update_display(previous.element)?;
        }
        if let Some(current) = selection {
            self.update_display(current.element)?;
        }
        self.update_bounding_sphere();
        let express_id = self.express_id(selection);
        self.emit(ViewerEvent::SelectionChanged {
            selection,
            express_id,
        });
        Ok(())
    }

    /// Hovers an element (or clears hover). Repeating the current hover is a
    /// no-op.
    pub fn hover(&mut self, selection: Option<Selection>) -> Result<()> {
        if self.hovered == selection {
            return Ok(());
        }
        self.validate(selection)?;
        let previous = std::mem::replace(&mut self.hovered, selection);
        if let Some(previous) = previous {
            self.update_display(previous.element)?;
        }
        if let Some(current) = selection {
            self.update_display(current.element)?;
        }
        let express_id = self.express_id(selection);
        self.emit(ViewerEvent::HoverChanged {
            selection,
            express_id,
        });
        Ok(())
    }

    /// Selects the element with `express_id`; `None` or an unknown id clears
    /// the selection.
    pub fn select_by_express_id(&mut self, express_id: Option<ExpressId>) -> Result<Option<ElementKey>> {
        let element = express_id.and_then(|id| self.registry.element_by_express_id(id));
        self.select(element.map(Selection::element))?;
        Ok(element)
    }

    /// Selects the first element (by express id) with a matching property,
    /// narrows the selection to its first record and frames it. `None`
    /// clears the selection; no match leaves it unchanged.
    pub fn select_by_property(&mut self, property: Option<&Property>) -> Result<Option<ElementKey>> {
        let Some(property) = property else {
            self.select(None)?;
            return Ok(None);
        };

        let found = self
            .registry
            .elements()
            .filter(|(_, e)| match_properties_and_type(&e.data, std::slice::from_ref(property), None))
            .min_by_key(|(_, e)| e.express_id())
            .map(|(key, e)| Selection {
                element: key,
                record: e.records().first().copied(),
            });

        let Some(selection) = found else {
            return Ok(None);
        };
        self.select(Some(selection))?;
        self.fit_view();
        Ok(Some(selection.element))
    }

    // =========================================================================
    // Camera
    // =========================================================================

    /// Frames the current bounding sphere. Returns `false` when there is
    /// nothing to frame.
    pub fn fit_view(&mut self) -> bool {
        let fitted = fit_camera_to_sphere(
            &self.bounding_sphere,
            &mut self.camera,
            self.config.fit_margin,
            self.config.fit_min_distance,
        );
        if !fitted {
            tracing::debug!("nothing to frame, camera left in place");
        }
        fitted
    }

    /// Re-targets the camera on the current bounding sphere.
    pub fn focus_view(&mut self) -> bool {
        focus_camera_on(&self.bounding_sphere, &mut self.camera)
    }

    /// Clears the selection, moves the camera back to its home position and
    /// frames the whole model.
    pub fn reset_view(&mut self) -> Result<bool> {
        self.select(None)?;
        let [x, y, z] = self.config.reset_camera_position;
        self.camera.position = Point3::new(x, y, z);
        Ok(self.fit_view())
    }

    // =========================================================================
    // Pointer
    // =========================================================================

    /// Resolves hover under a pixel position once the pointer has moved far
    /// enough. Returns the hovered element.
    pub fn handle_pointer_move(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<Option<ElementKey>> {
        if !self.config.enable_hover || !self.tracker.pointer_move(Point2::new(x, y)) {
            return Ok(self.hovered.map(|s| s.element));
        }
        self.camera.set_viewport(width, height);
        let hit = self
            .resolver
            .first_hit(pointer_to_ndc(x, y, width, height), &self.camera, &self.registry)?;
        self.hover(hit.map(Selection::from))?;
        Ok(self.hovered.map(|s| s.element))
    }

    /// Every hit under a pixel position, nearest first.
    pub fn pick(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<Vec<PointerHit>> {
        self.camera.set_viewport(width, height);
        self.resolver
            .resolve(pointer_to_ndc(x, y, width, height), &self.camera, &self.registry)
    }

    pub fn handle_pointer_down(&mut self, x: f32, y: f32) {
        self.tracker.pointer_down(Point2::new(x, y));
    }

    /// Completes a click: selects the nearest hit, or clears the selection
    /// when nothing is hit. Returns whether the release counted as a click.
    pub fn handle_pointer_up(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<bool> {
        if !self.tracker.pointer_up(Point2::new(x, y)) || !self.config.enable_selection {
            return Ok(false);
        }
        self.camera.set_viewport(width, height);
        let hit = self
            .resolver
            .first_hit(pointer_to_ndc(x, y, width, height), &self.camera, &self.registry)?;
        self.select(hit.map(Selection::from))?;
        Ok(true)
    }

    pub fn handle_pointer_leave(&mut self) -> Result<()> {
        self.tracker.pointer_leave();
        self.hover(None)
    }
}
