// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Render-facing views of the scene.
//!
//! Transform buffers are exposed without copying: JavaScript builds a view
//! with `new Float32Array(getMemory().buffer, transformsPtr, transformsLen)`.
//! The view is only valid until the next call that changes the scene.

use ifc_lite_scene::{ElementRegistry, GeometryResource, InstancedBuffer, MaterialResource, PointerHit};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::utils::js_error;

/// One pooled buffer: a single instanced draw call.
#[wasm_bindgen]
pub struct InstancedMeshJs {
    geometry_id: String,
    material_id: String,
    state: &'static str,
    material: MaterialResource,
    count: u32,
    capacity: u32,
    dirty: bool,
    transforms_ptr: *const f32,
    transforms_len: usize,
}

impl InstancedMeshJs {
    pub(crate) fn new(buffer: &InstancedBuffer, dirty: bool) -> Self {
        let transforms = buffer.transforms();
        Self {
            geometry_id: buffer.geometry_id().to_string(),
            material_id: buffer.material_id().to_string(),
            state: buffer.state().as_str(),
            material: MaterialResource::clone(buffer.material()),
            count: buffer.count(),
            capacity: buffer.capacity(),
            dirty,
            transforms_ptr: transforms.as_ptr(),
            transforms_len: transforms.len(),
        }
    }
}

#[wasm_bindgen]
impl InstancedMeshJs {
    #[wasm_bindgen(getter, js_name = geometryId)]
    pub fn geometry_id(&self) -> String {
        self.geometry_id.clone()
    }

    #[wasm_bindgen(getter, js_name = materialId)]
    pub fn material_id(&self) -> String {
        self.material_id.clone()
    }

    /// `default`, `hovered`, `selected` or `transparent`.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.state.to_string()
    }

    /// Resolved material for this pool as a plain object.
    #[wasm_bindgen(getter)]
    pub fn material(&self) -> Result<JsValue, JsError> {
        self.material
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(js_error)
    }

    /// Number of live instances to draw.
    #[wasm_bindgen(getter)]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[wasm_bindgen(getter)]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Whether the transforms changed since the previous upload.
    #[wasm_bindgen(getter)]
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Pointer to the column-major matrices in WASM memory
    #[wasm_bindgen(getter, js_name = transformsPtr)]
    pub fn transforms_ptr(&self) -> *const f32 {
        self.transforms_ptr
    }

    /// Length in f32 elements, 16 per live instance
    #[wasm_bindgen(getter, js_name = transformsLen)]
    pub fn transforms_len(&self) -> usize {
        self.transforms_len
    }
}

/// Copy of a geometry's vertex data.
#[wasm_bindgen]
pub struct GeometryJs {
    positions: Vec<f32>,
    normals: Vec<f32>,
    indices: Vec<u32>,
}

impl From<&GeometryResource> for GeometryJs {
    fn from(geometry: &GeometryResource) -> Self {
        Self {
            positions: geometry.positions().to_vec(),
            normals: geometry.normals().to_vec(),
            indices: geometry.indices().to_vec(),
        }
    }
}

#[wasm_bindgen]
impl GeometryJs {
    #[wasm_bindgen(getter)]
    pub fn positions(&self) -> js_sys::Float32Array {
        js_sys::Float32Array::from(&self.positions[..])
    }

    #[wasm_bindgen(getter)]
    pub fn normals(&self) -> js_sys::Float32Array {
        js_sys::Float32Array::from(&self.normals[..])
    }

    #[wasm_bindgen(getter)]
    pub fn indices(&self) -> js_sys::Uint32Array {
        js_sys::Uint32Array::from(&self.indices[..])
    }

    #[wasm_bindgen(getter, js_name = vertexCount)]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// A pointer hit reported by express id.
#[wasm_bindgen]
#[derive(Debug, Clone, Copy)]
pub struct PointerHitJs {
    #[wasm_bindgen(js_name = expressId)]
    pub express_id: u32,
    pub distance: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl PointerHitJs {
    pub(crate) fn from_hit(hit: &PointerHit, registry: &ElementRegistry) -> Option<Self> {
        let element = registry.element(hit.element)?;
        Some(Self {
            express_id: element.express_id(),
            distance: hit.distance,
            x: hit.point.x,
            y: hit.point.y,
            z: hit.point.z,
        })
    }
}
