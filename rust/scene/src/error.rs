// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for scene operations.

use crate::keys::{BufferKey, ElementKey, RecordKey};

/// Result type alias for scene operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while mutating or querying an instanced scene.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A buffer slot outside `[0, count)` was addressed.
    #[error("slot {slot} out of range for buffer with {count} live instances")]
    InvalidSlot { slot: u32, count: u32 },

    /// The record key does not belong to this registry.
    #[error("instance record not found: {0:?}")]
    InvalidRecord(RecordKey),

    /// The element key does not belong to this registry.
    #[error("element not found: {0:?}")]
    InvalidElement(ElementKey),

    /// The buffer key does not belong to this registry.
    #[error("instance buffer not found: {0:?}")]
    InvalidBuffer(BufferKey),

    /// A geometry or material id was never registered.
    #[error("{kind} resource not registered: {id}")]
    MissingResource { kind: &'static str, id: String },

    /// The record holds no slot to release.
    #[error("instance record {0:?} is already released")]
    AlreadyReleased(RecordKey),

    /// An element with this express id is already registered.
    #[error("duplicate element: #{0}")]
    DuplicateElement(u32),

    /// Record handles and the instance index disagree.
    #[error("inconsistent instance index: {0}")]
    InconsistentIndex(String),

    /// The result belongs to a load that has since been superseded.
    #[error("stale load result (ticket {ticket}, current {current})")]
    StaleLoad { ticket: u64, current: u64 },

    /// Property data error.
    #[error(transparent)]
    Data(#[from] ifc_lite_data::Error),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
