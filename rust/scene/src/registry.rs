// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based ownership of elements, instance records and pooled buffers.
//!
//! The [`ElementRegistry`] is the sole owner of scene data. Elements, records
//! and buffers live in slot maps with generational keys; records refer back
//! to their element by key only. Buffers are pooled by
//! `(state, geometry id, material id)` and created lazily on first use.
//!
//! ## Slot bookkeeping
//!
//! Every visible record occupies exactly one slot of one buffer. The record
//! stores its [`InstanceHandle`] and the [`InstanceIndex`] maps the handle
//! back to the record. Releasing a slot swap-removes it from the buffer, so
//! the record that lived in the last slot is moved into the hole: its handle
//! and index entry are rewritten within the same call. All preconditions are
//! checked before the first mutation, so a failing call leaves the registry
//! untouched.

use std::fmt;
use std::sync::Arc;

use ifc_lite_data::{ElementData, ExpressId};
use nalgebra::{Matrix4, Vector3};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::bounds::Aabb;
use crate::buffer::InstancedBuffer;
use crate::element::{Element, InstanceRecord};
use crate::error::{Error, Result};
use crate::index::InstanceIndex;
use crate::keys::{BufferKey, ElementKey, InstanceHandle, InstanceState, RecordKey};
use crate::resources::{GeometryId, GeometryResource, MaterialId, MaterialResource, StatePalette};

/// Composite key of a buffer pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub state: InstanceState,
    pub geometry_id: GeometryId,
    pub material_id: MaterialId,
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.state, self.geometry_id, self.material_id)
    }
}

/// Per-axis placement used by [`ElementRegistry::align_model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Leave the axis as loaded.
    #[default]
    Keep,
    /// Move the box minimum to 0.
    Min,
    /// Move the box center to 0.
    Center,
    /// Move the box maximum to 0.
    Max,
}

impl Alignment {
    fn offset(self, min: f32, max: f32) -> f32 {
        match self {
            Alignment::Keep => 0.0,
            Alignment::Min => -min,
            Alignment::Center => -(min + max) * 0.5,
            Alignment::Max => -max,
        }
    }
}

/// Owner of every element, instance record, buffer and shared resource of
/// one model.
///
/// # Example
///
/// ```
/// use ifc_lite_data::ElementData;
/// use ifc_lite_scene::{ElementRegistry, GeometryResource, InstanceState, MaterialResource};
/// use nalgebra::Matrix4;
///
/// let mut registry = ElementRegistry::new();
/// registry.set_geometry("1O", GeometryResource::new(vec![0.0; 9], vec![], vec![0, 1, 2]));
/// registry.set_material("1-1-1-O", MaterialResource::default());
///
/// let wall = registry.add_element(ElementData::new(42)).unwrap();
/// let record = registry
///     .add_instance_record(wall, "1O", "1-1-1-O", Matrix4::identity())
///     .unwrap();
///
/// registry.set_record_state(record, InstanceState::Selected).unwrap();
/// assert_eq!(registry.live_instance_count(), 1);
/// ```
#[derive(Debug)]
pub struct ElementRegistry {
    // Entity storage
    elements: SlotMap<ElementKey, Element>,
    records: SlotMap<RecordKey, InstanceRecord>,
    buffers: SlotMap<BufferKey, InstancedBuffer>,

    // Lookup
    pools: FxHashMap<PoolKey, BufferKey>,
    express_ids: FxHashMap<ExpressId, ElementKey>,
    index: InstanceIndex,

    // Shared resources
    geometries: FxHashMap<GeometryId, Arc<GeometryResource>>,
    materials: FxHashMap<MaterialId, Arc<MaterialResource>>,

    palette: StatePalette,
    initial_capacity: u32,
    model_transform: Matrix4<f32>,
    generation: u64,
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::with_options(StatePalette::default(), 1)
    }

    /// Creates a registry using `palette` for state materials and
    /// `initial_capacity` for new buffers.
    pub fn with_options(palette: StatePalette, initial_capacity: u32) -> Self {
        Self {
            elements: SlotMap::with_key(),
            records: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            pools: FxHashMap::default(),
            express_ids: FxHashMap::default(),
            index: InstanceIndex::new(),
            geometries: FxHashMap::default(),
            materials: FxHashMap::default(),
            palette,
            initial_capacity: initial_capacity.max(1),
            model_transform: Matrix4::identity(),
            generation: 0,
        }
    }

    /// Drops the whole model. Keys issued before stay invalid afterwards.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.records.clear();
        self.buffers.clear();
        self.pools.clear();
        self.express_ids.clear();
        self.index = InstanceIndex::new();
        self.geometries.clear();
        self.materials.clear();
        self.model_transform = Matrix4::identity();
        self.generation += 1;
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Registers a geometry under `id`. An id that is already registered
    /// keeps its first resource.
    pub fn set_geometry(
        &mut self,
        id: impl Into<GeometryId>,
        geometry: GeometryResource,
    ) -> Arc<GeometryResource> {
        self.geometries
            .entry(id.into())
            .or_insert_with(|| Arc::new(geometry))
            .clone()
    }

    pub fn geometry(&self, id: &str) -> Option<&Arc<GeometryResource>> {
        self.geometries.get(id)
    }

    /// Registers a material under `id`. An id that is already registered
    /// keeps its first resource.
    pub fn set_material(
        &mut self,
        id: impl Into<MaterialId>,
        material: MaterialResource,
    ) -> Arc<MaterialResource> {
        self.materials
            .entry(id.into())
            .or_insert_with(|| Arc::new(material))
            .clone()
    }

    pub fn material(&self, id: &str) -> Option<&Arc<MaterialResource>> {
        self.materials.get(id)
    }

    pub fn palette(&self) -> &StatePalette {
        &self.palette
    }

    // =========================================================================
    // Elements and records
    // =========================================================================

    /// Adds an element. Express ids are unique per registry.
    pub fn add_element(&mut self, data: ElementData) -> Result<ElementKey> {
        let express_id = data.express_id;
        if self.express_ids.contains_key(&express_id) {
            return Err(Error::DuplicateElement(express_id));
        }
        let key = self.elements.insert(Element::new(data));
        self.express_ids.insert(express_id, key);
        Ok(key)
    }

    /// Places a new instance of `element` in the default state. Geometry and
    /// material must already be registered.
    pub fn add_instance_record(
        &mut self,
        element: ElementKey,
        geometry_id: &str,
        material_id: &str,
        matrix: Matrix4<f32>,
    ) -> Result<RecordKey> {
        if !self.elements.contains_key(element) {
            return Err(Error::InvalidElement(element));
        }
        let buffer = self.pool_buffer(InstanceState::Default, geometry_id, material_id, |base| {
            base.clone()
        })?;

        let record = self.records.insert(InstanceRecord {
            element,
            geometry_id: geometry_id.to_string(),
            material_id: material_id.to_string(),
            matrix,
            state: InstanceState::Default,
            handle: None,
        });
        if let Err(err) = self.attach(record, buffer) {
            self.records.remove(record);
            return Err(err);
        }

        if let Some(element) = self.elements.get_mut(element) {
            element.records.push(record);
        }
        Ok(record)
    }

    /// Like [`add_instance_record`](Self::add_instance_record), registering
    /// the geometry and material first when their ids are new.
    pub fn add_instance_record_with(
        &mut self,
        element: ElementKey,
        geometry_id: &str,
        geometry: GeometryResource,
        material_id: &str,
        material: MaterialResource,
        matrix: Matrix4<f32>,
    ) -> Result<RecordKey> {
        if !self.elements.contains_key(element) {
            return Err(Error::InvalidElement(element));
        }
        self.set_geometry(geometry_id, geometry);
        self.set_material(material_id, material);
        self.add_instance_record(element, geometry_id, material_id, matrix)
    }

    /// Moves a record into the buffer pooled for `target`.
    ///
    /// Moving to the current state is a no-op. Hidden records hold no slot.
    /// `resolver` derives the state material from the base material and is
    /// only called when the target buffer does not exist yet; the default
    /// state always draws the base material.
    pub fn move_record_to_state<F>(
        &mut self,
        record: RecordKey,
        target: InstanceState,
        resolver: F,
    ) -> Result<()>
    where
        F: FnOnce(&MaterialResource) -> MaterialResource,
    {
        let current = self.records.get(record).ok_or(Error::InvalidRecord(record))?;
        if current.state == target {
            return Ok(());
        }

        let destination = if target.is_visible() {
            let geometry_id = current.geometry_id.clone();
            let material_id = current.material_id.clone();
            Some(self.pool_buffer(target, &geometry_id, &material_id, resolver)?)
        } else {
            None
        };

        if self.records[record].handle.is_some() {
            self.detach(record)?;
        }
        self.records[record].state = target;

        if let Some(buffer) = destination {
            self.attach(record, buffer)?;
        }
        Ok(())
    }

    /// Moves a record to `target` using the registry palette.
    pub fn set_record_state(&mut self, record: RecordKey, target: InstanceState) -> Result<()> {
        let palette = self.palette;
        self.move_record_to_state(record, target, |base| palette.resolve(target, base))
    }

    pub fn set_record_to_default(&mut self, record: RecordKey) -> Result<()> {
        self.set_record_state(record, InstanceState::Default)
    }

    pub fn hide_record(&mut self, record: RecordKey) -> Result<()> {
        self.set_record_state(record, InstanceState::Hidden)
    }

    /// Releases a record's slot and marks it hidden. Fails if the record
    /// holds no slot.
    pub fn release_record(&mut self, record: RecordKey) -> Result<()> {
        let current = self.records.get(record).ok_or(Error::InvalidRecord(record))?;
        if current.handle.is_none() {
            return Err(Error::AlreadyReleased(record));
        }
        self.detach(record)?;
        self.records[record].state = InstanceState::Hidden;
        Ok(())
    }

    /// Moves every record of `element` to `target`.
    pub fn set_element_state(&mut self, element: ElementKey, target: InstanceState) -> Result<()> {
        let records = self
            .elements
            .get(element)
            .ok_or(Error::InvalidElement(element))?
            .records
            .clone();
        for record in records {
            self.set_record_state(record, target)?;
        }
        Ok(())
    }

    /// Replaces a record's placement, updating its slot when visible.
    pub fn update_record_matrix(&mut self, record: RecordKey, matrix: Matrix4<f32>) -> Result<()> {
        let current = self.records.get(record).ok_or(Error::InvalidRecord(record))?;
        if let Some(handle) = current.handle {
            self.buffers
                .get_mut(handle.buffer)
                .ok_or(Error::InvalidBuffer(handle.buffer))?
                .update(handle.slot, &matrix)?;
        }
        self.records[record].matrix = matrix;
        Ok(())
    }

    /// Returns the pooled buffer for the key, creating it on first use.
    fn pool_buffer<F>(
        &mut self,
        state: InstanceState,
        geometry_id: &str,
        material_id: &str,
        resolver: F,
    ) -> Result<BufferKey>
    where
        F: FnOnce(&MaterialResource) -> MaterialResource,
    {
        let key = PoolKey {
            state,
            geometry_id: geometry_id.to_string(),
            material_id: material_id.to_string(),
        };
        if let Some(&buffer) = self.pools.get(&key) {
            return Ok(buffer);
        }

        let geometry = self
            .geometries
            .get(geometry_id)
            .cloned()
            .ok_or_else(|| Error::MissingResource {
                kind: "geometry",
                id: geometry_id.to_string(),
            })?;
        let base = self
            .materials
            .get(material_id)
            .ok_or_else(|| Error::MissingResource {
                kind: "material",
                id: material_id.to_string(),
            })?;
        let material = match state {
            InstanceState::Default => Arc::clone(base),
            _ => Arc::new(resolver(base)),
        };

        tracing::debug!(pool = %key, "creating instance buffer");
        let buffer = self.buffers.insert(InstancedBuffer::new(
            state,
            key.geometry_id.clone(),
            key.material_id.clone(),
            geometry,
            material,
            self.initial_capacity,
        ));
        self.pools.insert(key, buffer);
        self.generation += 1;
        Ok(buffer)
    }

    /// Allocates a slot for a record that currently holds none.
    fn attach(&mut self, record: RecordKey, buffer: BufferKey) -> Result<()> {
        let matrix = self.records.get(record).ok_or(Error::InvalidRecord(record))?.matrix;
        let target = self
            .buffers
            .get_mut(buffer)
            .ok_or(Error::InvalidBuffer(buffer))?;

        let handle = InstanceHandle::new(buffer, target.count());
        if self.index.get(handle).is_some() {
            return Err(Error::InconsistentIndex(format!(
                "free slot {} of {:?} is still indexed",
                handle.slot, buffer
            )));
        }

        let was_empty = target.is_empty();
        let slot = target.allocate(&matrix);
        debug_assert_eq!(slot, handle.slot);
        self.index.insert(handle, record)?;
        self.records[record].handle = Some(handle);
        if was_empty {
            self.generation += 1;
        }
        Ok(())
    }

    /// Releases a record's slot, fixing up the record swapped into it.
    fn detach(&mut self, record: RecordKey) -> Result<()> {
        let handle = self
            .records
            .get(record)
            .ok_or(Error::InvalidRecord(record))?
            .handle
            .ok_or(Error::AlreadyReleased(record))?;
        let buffer = self
            .buffers
            .get(handle.buffer)
            .ok_or(Error::InvalidBuffer(handle.buffer))?;

        if handle.slot >= buffer.count() {
            return Err(Error::InconsistentIndex(format!(
                "{:?} points at slot {} past count {}",
                record,
                handle.slot,
                buffer.count()
            )));
        }
        if self.index.get(handle) != Some(record) {
            return Err(Error::InconsistentIndex(format!(
                "slot {} of {:?} is not indexed to {:?}",
                handle.slot, handle.buffer, record
            )));
        }

        let last = InstanceHandle::new(handle.buffer, buffer.count() - 1);
        let swapped = if last.slot != handle.slot {
            let moved = self.index.get(last).ok_or_else(|| {
                Error::InconsistentIndex(format!(
                    "last slot {} of {:?} has no record",
                    last.slot, last.buffer
                ))
            })?;
            let moved_handle = self.records.get(moved).and_then(|r| r.handle);
            if moved_handle != Some(last) {
                return Err(Error::InconsistentIndex(format!(
                    "{:?} indexed at slot {} but holds {:?}",
                    moved, last.slot, moved_handle
                )));
            }
            Some(moved)
        } else {
            None
        };

        let buffer = self
            .buffers
            .get_mut(handle.buffer)
            .ok_or(Error::InvalidBuffer(handle.buffer))?;
        let from = buffer.release(handle.slot)?;
        let now_empty = buffer.is_empty();

        self.index.remove(handle);
        if let (Some(moved), Some(from)) = (swapped, from) {
            debug_assert_eq!(from, last.slot);
            self.index.relocate(last, handle)?;
            self.records[moved].handle = Some(handle);
            tracing::trace!(from, to = handle.slot, "moved last instance into released slot");
        }
        self.records[record].handle = None;

        if now_empty {
            self.generation += 1;
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[inline]
    pub fn element(&self, key: ElementKey) -> Option<&Element> {
        self.elements.get(key)
    }

    #[inline]
    pub fn record(&self, key: RecordKey) -> Option<&InstanceRecord> {
        self.records.get(key)
    }

    #[inline]
    pub fn buffer(&self, key: BufferKey) -> Option<&InstancedBuffer> {
        self.buffers.get(key)
    }

    pub fn pool(&self, key: &PoolKey) -> Option<BufferKey> {
        self.pools.get(key).copied()
    }

    pub fn element_by_express_id(&self, express_id: ExpressId) -> Option<ElementKey> {
        self.express_ids.get(&express_id).copied()
    }

    /// The record occupying a slot, if any.
    pub fn instance_record_at(&self, handle: InstanceHandle) -> Option<RecordKey> {
        self.index.get(handle)
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementKey, &Element)> + '_ {
        self.elements.iter()
    }

    pub fn records(&self) -> impl Iterator<Item = (RecordKey, &InstanceRecord)> + '_ {
        self.records.iter()
    }

    pub fn selectable_elements(&self) -> impl Iterator<Item = (ElementKey, &Element)> + '_ {
        self.elements().filter(|(_, e)| e.is_selectable())
    }

    pub fn always_visible_elements(&self) -> impl Iterator<Item = (ElementKey, &Element)> + '_ {
        self.elements().filter(|(_, e)| e.is_always_visible())
    }

    pub fn elements_with_values(&self) -> impl Iterator<Item = (ElementKey, &Element)> + '_ {
        self.elements().filter(|(_, e)| e.data.values.is_some())
    }

    pub fn elements_with_properties(&self) -> impl Iterator<Item = (ElementKey, &Element)> + '_ {
        self.elements().filter(|(_, e)| e.data.properties.is_some())
    }

    pub fn elements_with_data(&self) -> impl Iterator<Item = (ElementKey, &Element)> + '_ {
        self.elements().filter(|(_, e)| e.data.has_data())
    }

    /// Every buffer ever created, including empty ones.
    pub fn all_meshes(&self) -> impl Iterator<Item = (BufferKey, &InstancedBuffer)> + '_ {
        self.buffers.iter()
    }

    /// Buffers holding at least one instance.
    pub fn live_meshes(&self) -> impl Iterator<Item = (BufferKey, &InstancedBuffer)> + '_ {
        self.buffers.iter().filter(|(_, b)| !b.is_empty())
    }

    pub fn live_instance_count(&self) -> usize {
        self.buffers.values().map(|b| b.count() as usize).sum()
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Bumped whenever a buffer is created or becomes empty or non-empty.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns and clears a buffer's dirty flag after upload.
    pub fn take_dirty(&mut self, buffer: BufferKey) -> Result<bool> {
        Ok(self
            .buffers
            .get_mut(buffer)
            .ok_or(Error::InvalidBuffer(buffer))?
            .take_dirty())
    }

    // =========================================================================
    // Model transform
    // =========================================================================

    #[inline]
    pub fn model_transform(&self) -> &Matrix4<f32> {
        &self.model_transform
    }

    pub fn set_model_transform(&mut self, transform: Matrix4<f32>) {
        self.model_transform = transform;
    }

    /// Box of every live instance before the model transform.
    pub fn model_bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        for (_, buffer) in self.live_meshes() {
            bounds.union(&buffer.cached_bounds());
        }
        bounds
    }

    /// Translates the model so its box sits at the origin as requested per
    /// axis. Returns `false` for an empty model.
    pub fn align_model(&mut self, x: Alignment, y: Alignment, z: Alignment) -> bool {
        let bounds = self.model_bounds();
        if bounds.is_empty() {
            return false;
        }
        let offset = Vector3::new(
            x.offset(bounds.min.x, bounds.max.x),
            y.offset(bounds.min.y, bounds.max.y),
            z.offset(bounds.min.z, bounds.max.z),
        );
        tracing::debug!(x = offset.x, y = offset.y, z = offset.z, "aligning model");
        self.model_transform = Matrix4::new_translation(&offset);
        true
    }

    // =========================================================================
    // Property data
    // =========================================================================

    /// Merges processed element data onto the matching elements. Records for
    /// unknown express ids are skipped. Returns how many elements changed.
    pub fn restore_data(&mut self, records: impl IntoIterator<Item = ElementData>) -> usize {
        let mut restored = 0;
        let mut unknown = 0;
        for data in records {
            match self
                .express_ids
                .get(&data.express_id)
                .and_then(|&key| self.elements.get_mut(key))
            {
                Some(element) => {
                    element.data.merge_from(data);
                    restored += 1;
                }
                None => unknown += 1,
            }
        }
        if unknown > 0 {
            tracing::warn!(unknown, "skipped data for unknown elements");
        }
        self.generation += 1;
        restored
    }

    /// Mutable element data, for flags set outside the processor.
    pub fn element_data_mut(&mut self, key: ElementKey) -> Option<&mut ElementData> {
        self.elements.get_mut(key).map(|e| &mut e.data)
    }

    // =========================================================================
    // Consistency
    // =========================================================================

    /// Verifies that handles, the index and buffer contents agree.
    pub fn check_consistency(&self) -> Result<()> {
        let fail = |message: String| Err(Error::InconsistentIndex(message));

        for (key, record) in &self.records {
            match (record.state, record.handle) {
                (InstanceState::Hidden, Some(_)) => {
                    return fail(format!("hidden {key:?} holds a slot"));
                }
                (InstanceState::Hidden, None) => {}
                (_, None) => return fail(format!("visible {key:?} holds no slot")),
                (state, Some(handle)) => {
                    let Some(buffer) = self.buffers.get(handle.buffer) else {
                        return fail(format!("{key:?} points at a missing buffer"));
                    };
                    if handle.slot >= buffer.count() {
                        return fail(format!("{key:?} points past count"));
                    }
                    if self.index.get(handle) != Some(key) {
                        return fail(format!("{key:?} not indexed at its slot"));
                    }
                    if buffer.state() != state
                        || buffer.geometry_id() != record.geometry_id
                        || buffer.material_id() != record.material_id
                    {
                        return fail(format!("{key:?} sits in the wrong pool"));
                    }
                    if buffer.transform(handle.slot)? != record.matrix {
                        return fail(format!("slot of {key:?} holds a different matrix"));
                    }
                }
            }
            let owned = self
                .elements
                .get(record.element)
                .is_some_and(|e| e.records.contains(&key));
            if !owned {
                return fail(format!("{key:?} not listed on its element"));
            }
        }

        for (handle, key) in self.index.iter() {
            if self.records.get(key).and_then(|r| r.handle) != Some(handle) {
                return fail(format!("index entry for {key:?} is stale"));
            }
        }

        if self.index.len() != self.live_instance_count() {
            return fail(format!(
                "{} index entries for {} live slots",
                self.index.len(),
                self.live_instance_count()
            ));
        }
        Ok(())
    }
}
