// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Slot-to-record lookup.
//!
//! The reverse direction lives on the record itself (`InstanceRecord::handle`);
//! the registry keeps both sides in agreement.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::keys::{BufferKey, InstanceHandle, RecordKey};

/// Map from `(buffer, slot)` to the record occupying it.
#[derive(Debug, Default)]
pub struct InstanceIndex {
    slots: FxHashMap<InstanceHandle, RecordKey>,
}

impl InstanceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `record` at `handle`. An occupied handle is an error.
    pub fn insert(&mut self, handle: InstanceHandle, record: RecordKey) -> Result<()> {
        if let Some(existing) = self.slots.get(&handle) {
            return Err(Error::InconsistentIndex(format!(
                "slot {} of {:?} already holds {:?}",
                handle.slot, handle.buffer, existing
            )));
        }
        self.slots.insert(handle, record);
        Ok(())
    }

    #[inline]
    pub fn get(&self, handle: InstanceHandle) -> Option<RecordKey> {
        self.slots.get(&handle).copied()
    }

    #[inline]
    pub fn lookup(&self, buffer: BufferKey, slot: u32) -> Option<RecordKey> {
        self.get(InstanceHandle::new(buffer, slot))
    }

    /// Removes the entry at `handle`, returning the record it held.
    pub fn remove(&mut self, handle: InstanceHandle) -> Option<RecordKey> {
        self.slots.remove(&handle)
    }

    /// Moves the entry at `from` to `to` and returns the moved record.
    /// `to` must be vacant.
    pub fn relocate(&mut self, from: InstanceHandle, to: InstanceHandle) -> Result<RecordKey> {
        let record = self.slots.remove(&from).ok_or_else(|| {
            Error::InconsistentIndex(format!(
                "no record at slot {} of {:?}",
                from.slot, from.buffer
            ))
        })?;
        self.insert(to, record)?;
        Ok(record)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceHandle, RecordKey)> + '_ {
        self.slots.iter().map(|(handle, record)| (*handle, *record))
    }
}
