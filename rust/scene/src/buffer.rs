// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instanced transform buffer with swap-remove packing.
//!
//! One buffer holds the placements of every live instance sharing a
//! `(state, geometry, material)` key. Transforms are stored densely as
//! column-major 4×4 `f32` matrices in `[0, count)`, ready for GPU upload;
//! content at `[count, capacity)` is undefined.

use std::cell::Cell;
use std::sync::Arc;

use nalgebra::Matrix4;

use crate::bounds::Aabb;
use crate::error::{Error, Result};
use crate::keys::InstanceState;
use crate::resources::{GeometryId, GeometryResource, MaterialId, MaterialResource};

/// Floats per stored transform.
pub const FLOATS_PER_INSTANCE: usize = 16;

/// A resizable buffer of instance transforms for one pool key.
#[derive(Debug)]
pub struct InstancedBuffer {
    state: InstanceState,
    geometry_id: GeometryId,
    material_id: MaterialId,
    geometry: Arc<GeometryResource>,
    material: Arc<MaterialResource>,

    transforms: Vec<f32>,
    capacity: u32,
    count: u32,
    dirty: bool,
    bounds: Cell<Option<Aabb>>,
}

impl InstancedBuffer {
    /// Creates an empty buffer. A zero capacity hint is treated as 1.
    pub fn new(
        state: InstanceState,
        geometry_id: GeometryId,
        material_id: MaterialId,
        geometry: Arc<GeometryResource>,
        material: Arc<MaterialResource>,
        capacity_hint: u32,
    ) -> Self {
        let capacity = capacity_hint.max(1);
        Self {
            state,
            geometry_id,
            material_id,
            geometry,
            material,
            transforms: vec![0.0; capacity as usize * FLOATS_PER_INSTANCE],
            capacity,
            count: 0,
            dirty: false,
            bounds: Cell::new(None),
        }
    }

    /// Writes `matrix` into slot `count` and returns that slot, doubling the
    /// capacity first when full.
    pub fn allocate(&mut self, matrix: &Matrix4<f32>) -> u32 {
        if self.count == self.capacity {
            self.grow(self.count + 1);
        }
        let slot = self.count;
        self.write(slot, matrix);
        self.count += 1;
        self.touch();
        slot
    }

    /// Overwrites the transform at a live slot.
    pub fn update(&mut self, slot: u32, matrix: &Matrix4<f32>) -> Result<()> {
        self.check_slot(slot)?;
        self.write(slot, matrix);
        self.touch();
        Ok(())
    }

    /// Swap-removes a live slot.
    ///
    /// Returns `Some(last)` when the instance formerly at `last` was moved
    /// into `slot`, and `None` when `slot` was the last live slot.
    pub fn release(&mut self, slot: u32) -> Result<Option<u32>> {
        self.check_slot(slot)?;
        let last = self.count - 1;
        let swapped = if slot != last {
            let src = last as usize * FLOATS_PER_INSTANCE;
            let dst = slot as usize * FLOATS_PER_INSTANCE;
            self.transforms
                .copy_within(src..src + FLOATS_PER_INSTANCE, dst);
            Some(last)
        } else {
            None
        };
        self.count = last;
        self.touch();
        Ok(swapped)
    }

    /// Grows the capacity by doubling until it holds `required` instances.
    pub fn ensure_capacity(&mut self, required: u32) {
        if required > self.capacity {
            self.grow(required);
        }
    }

    fn grow(&mut self, required: u32) {
        let mut capacity = self.capacity.max(1);
        while capacity < required {
            capacity = capacity.saturating_mul(2);
        }
        tracing::trace!(
            geometry = %self.geometry_id,
            material = %self.material_id,
            from = self.capacity,
            to = capacity,
            "growing instance buffer"
        );
        self.transforms
            .resize(capacity as usize * FLOATS_PER_INSTANCE, 0.0);
        self.capacity = capacity;
        self.touch();
    }

    #[inline]
    fn check_slot(&self, slot: u32) -> Result<()> {
        if slot >= self.count {
            return Err(Error::InvalidSlot {
                slot,
                count: self.count,
            });
        }
        Ok(())
    }

    #[inline]
    fn write(&mut self, slot: u32, matrix: &Matrix4<f32>) {
        let start = slot as usize * FLOATS_PER_INSTANCE;
        self.transforms[start..start + FLOATS_PER_INSTANCE].copy_from_slice(matrix.as_slice());
    }

    #[inline]
    fn touch(&mut self) {
        self.dirty = true;
        self.bounds.set(None);
    }

    /// Transform stored at a live slot.
    pub fn transform(&self, slot: u32) -> Result<Matrix4<f32>> {
        self.check_slot(slot)?;
        let start = slot as usize * FLOATS_PER_INSTANCE;
        Ok(Matrix4::from_column_slice(
            &self.transforms[start..start + FLOATS_PER_INSTANCE],
        ))
    }

    /// Live transforms, `count * 16` floats.
    #[inline]
    pub fn transforms(&self) -> &[f32] {
        &self.transforms[..self.count as usize * FLOATS_PER_INSTANCE]
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns and clears the dirty flag. Call once the transforms are
    /// uploaded.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    #[inline]
    pub fn state(&self) -> InstanceState {
        self.state
    }

    #[inline]
    pub fn geometry_id(&self) -> &str {
        &self.geometry_id
    }

    #[inline]
    pub fn material_id(&self) -> &str {
        &self.material_id
    }

    #[inline]
    pub fn geometry(&self) -> &Arc<GeometryResource> {
        &self.geometry
    }

    #[inline]
    pub fn material(&self) -> &Arc<MaterialResource> {
        &self.material
    }

    /// Union of every live instance's transformed geometry box, in model
    /// space. Cached until the next mutation.
    pub fn cached_bounds(&self) -> Aabb {
        if let Some(bounds) = self.bounds.get() {
            return bounds;
        }
        let local = self.geometry.local_bounds();
        let mut bounds = Aabb::empty();
        for transform in self.transforms().chunks_exact(FLOATS_PER_INSTANCE) {
            bounds.union(&local.transformed(&Matrix4::from_column_slice(transform)));
        }
        self.bounds.set(Some(bounds));
        bounds
    }
}
