// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keyed element records for the externally persisted data path.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::types::{ElementData, ExpressId};

/// Element data keyed by express id.
///
/// Serialises as a JSON array ordered by express id.
#[derive(Debug, Clone, Default)]
pub struct PropertyRecords {
    records: FxHashMap<ExpressId, ElementData>,
}

impl PropertyRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map, rejecting repeated express ids.
    pub fn from_elements(elements: impl IntoIterator<Item = ElementData>) -> Result<Self> {
        let mut records = Self::new();
        for data in elements {
            records.insert(data)?;
        }
        Ok(records)
    }

    pub fn insert(&mut self, data: ElementData) -> Result<()> {
        let id = data.express_id;
        if self.records.contains_key(&id) {
            return Err(Error::DuplicateRecord(id));
        }
        self.records.insert(id, data);
        Ok(())
    }

    /// Inserts or merges into an existing record.
    pub fn upsert(&mut self, data: ElementData) {
        match self.records.get_mut(&data.express_id) {
            Some(existing) => existing.merge_from(data),
            None => {
                self.records.insert(data.express_id, data);
            }
        }
    }

    #[inline]
    pub fn get(&self, id: ExpressId) -> Option<&ElementData> {
        self.records.get(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records sorted by express id.
    pub fn sorted(&self) -> Vec<&ElementData> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_unstable_by_key(|data| data.express_id);
        records
    }

    pub fn into_sorted_vec(self) -> Vec<ElementData> {
        let mut records: Vec<_> = self.records.into_values().collect();
        records.sort_unstable_by_key(|data| data.express_id);
        records
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let elements: Vec<ElementData> = serde_json::from_str(json)?;
        Self::from_elements(elements)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.sorted())?)
    }
}
