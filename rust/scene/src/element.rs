// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Elements and their instance records.

use ifc_lite_data::{ElementData, ExpressId};
use nalgebra::Matrix4;

use crate::keys::{ElementKey, InstanceHandle, InstanceState, RecordKey};
use crate::resources::{GeometryId, MaterialId};

/// One logical BIM entity and the instances it contributes.
#[derive(Debug, Clone)]
pub struct Element {
    pub data: ElementData,
    pub(crate) records: Vec<RecordKey>,
}

impl Element {
    pub(crate) fn new(data: ElementData) -> Self {
        Self {
            data,
            records: Vec::new(),
        }
    }

    #[inline]
    pub fn express_id(&self) -> ExpressId {
        self.data.express_id
    }

    /// Instance records in insertion order.
    #[inline]
    pub fn records(&self) -> &[RecordKey] {
        &self.records
    }

    #[inline]
    pub fn is_selectable(&self) -> bool {
        self.data.is_selectable()
    }

    #[inline]
    pub fn is_always_visible(&self) -> bool {
        self.data.is_always_visible()
    }
}

/// One placed instance of an element's geometry.
///
/// `handle` is `Some` exactly when the record occupies a buffer slot, which
/// is whenever `state` is not hidden.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub(crate) element: ElementKey,
    pub(crate) geometry_id: GeometryId,
    pub(crate) material_id: MaterialId,
    pub(crate) matrix: Matrix4<f32>,
    pub(crate) state: InstanceState,
    pub(crate) handle: Option<InstanceHandle>,
}

impl InstanceRecord {
    #[inline]
    pub fn element(&self) -> ElementKey {
        self.element
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
    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.matrix
    }

    #[inline]
    pub fn state(&self) -> InstanceState {
        self.state
    }

    #[inline]
    pub fn handle(&self) -> Option<InstanceHandle> {
        self.handle
    }
}
