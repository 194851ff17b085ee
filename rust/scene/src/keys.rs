// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key types for arena-based scene storage.
//!
//! Elements, instance records and buffers live in `slotmap::SlotMap`s owned
//! by the registry. Keys stay valid while other entries come and go, and a
//! stale key never aliases a newer entry.

use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key for an element (one logical BIM object).
    pub struct ElementKey;

    /// Key for an instance record (one placement of one geometry).
    pub struct RecordKey;

    /// Key for an instanced buffer.
    pub struct BufferKey;
}

/// Location of a live instance: a buffer and a slot in `[0, count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    pub buffer: BufferKey,
    pub slot: u32,
}

impl InstanceHandle {
    #[inline]
    pub fn new(buffer: BufferKey, slot: u32) -> Self {
        Self { buffer, slot }
    }
}

/// Display state of an instance record.
///
/// Every state except [`InstanceState::Hidden`] places the record in a
/// buffer pooled by `(state, geometry, material)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    #[default]
    Default,
    Hovered,
    Selected,
    Transparent,
    Hidden,
}

impl InstanceState {
    /// Returns the state name as used in pool keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Default => "default",
            InstanceState::Hovered => "hovered",
            InstanceState::Selected => "selected",
            InstanceState::Transparent => "transparent",
            InstanceState::Hidden => "hidden",
        }
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        !matches!(self, InstanceState::Hidden)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
