// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model staging.
//!
//! The loader streams geometries, materials and instances in whatever order
//! its source produces them. They are validated and collected here, then
//! applied to the registry in one step when the load finishes, so a load
//! that is superseded half-way never touches the visible scene.

use ifc_lite_data::{ElementData, ExpressId};
use ifc_lite_scene::{
    geometry_id, material_id, ElementRegistry, GeometryId, GeometryResource, MaterialId,
    MaterialResource, Matrix4,
};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum StagingError {
    #[error("Instance matrix needs 16 values, got {0}")]
    InvalidMatrix(usize),

    #[error("Vertex buffer length {0} is not a multiple of 3")]
    InvalidVertexData(usize),

    #[error("Geometry {0} has not been staged")]
    UnknownGeometry(GeometryId),

    #[error("Material {0} has not been staged")]
    UnknownMaterial(MaterialId),

    #[error("Element #{0} was staged twice")]
    DuplicateElement(ExpressId),
}

struct PendingInstance {
    express_id: ExpressId,
    geometry_id: GeometryId,
    material_id: MaterialId,
    matrix: Matrix4<f32>,
}

/// Everything a loader has produced for one model so far.
#[derive(Default)]
pub struct PendingModel {
    geometries: FxHashMap<GeometryId, GeometryResource>,
    materials: FxHashMap<MaterialId, MaterialResource>,
    elements: Vec<ElementData>,
    element_ids: FxHashSet<ExpressId>,
    instances: Vec<PendingInstance>,
}

impl PendingModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a mesh and returns its content id. Staging the same mesh
    /// twice keeps the first copy.
    pub fn add_geometry(
        &mut self,
        express_id: ExpressId,
        transparent: bool,
        positions: Vec<f32>,
        normals: Vec<f32>,
        indices: Vec<u32>,
    ) -> Result<GeometryId, StagingError> {
        if positions.len() % 3 != 0 {
            return Err(StagingError::InvalidVertexData(positions.len()));
        }
        if normals.len() % 3 != 0 {
            return Err(StagingError::InvalidVertexData(normals.len()));
        }
        let id = geometry_id(express_id, transparent);
        self.geometries
            .entry(id.clone())
            .or_insert_with(|| GeometryResource::new(positions, normals, indices));
        Ok(id)
    }

    /// Stages the loader material for a color and returns its content id.
    pub fn add_material(&mut self, r: f32, g: f32, b: f32, a: f32) -> MaterialId {
        let id = material_id(r as f64, g as f64, b as f64, a != 1.0);
        self.materials
            .entry(id.clone())
            .or_insert_with(|| MaterialResource::from_rgba(r, g, b, a));
        id
    }

    pub fn add_element(&mut self, data: ElementData) -> Result<(), StagingError> {
        if !self.element_ids.insert(data.express_id) {
            return Err(StagingError::DuplicateElement(data.express_id));
        }
        self.elements.push(data);
        Ok(())
    }

    /// Stages one placement of a staged geometry. Elements without property
    /// data are created bare when the model is applied.
    pub fn add_instance(
        &mut self,
        express_id: ExpressId,
        geometry_id: &str,
        material_id: &str,
        matrix: &[f32],
    ) -> Result<(), StagingError> {
        if matrix.len() != 16 {
            return Err(StagingError::InvalidMatrix(matrix.len()));
        }
        if !self.geometries.contains_key(geometry_id) {
            return Err(StagingError::UnknownGeometry(geometry_id.to_string()));
        }
        if !self.materials.contains_key(material_id) {
            return Err(StagingError::UnknownMaterial(material_id.to_string()));
        }
        self.instances.push(PendingInstance {
            express_id,
            geometry_id: geometry_id.to_string(),
            material_id: material_id.to_string(),
            matrix: Matrix4::from_column_slice(matrix),
        });
        Ok(())
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Moves everything into `registry` and returns the number of instances
    /// placed.
    pub fn apply(self, registry: &mut ElementRegistry) -> ifc_lite_scene::Result<usize> {
        for (id, geometry) in self.geometries {
            registry.set_geometry(id, geometry);
        }
        for (id, material) in self.materials {
            registry.set_material(id, material);
        }
        for data in self.elements {
            registry.add_element(data)?;
        }

        let placed = self.instances.len();
        for instance in self.instances {
            let element = match registry.element_by_express_id(instance.express_id) {
                Some(element) => element,
                None => registry.add_element(ElementData::new(instance.express_id))?,
            };
            registry.add_instance_record(
                element,
                &instance.geometry_id,
                &instance.material_id,
                instance.matrix,
            )?;
        }
        Ok(placed)
    }
}
