// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-Lite Data
//!
//! Plain, ownership-free element property data for instanced IFC scenes.
//!
//! Everything in this crate operates on [`ElementData`] values: the express
//! id of an element, its property sets, flat values and the flags derived from
//! viewer requirements (`selectable`, `always_visible`, links). Nothing here
//! knows about instance buffers, so the [`processor`] can run on a snapshot
//! in a worker and its output can be merged back into a scene in one batch.

pub mod error;
pub mod matching;
pub mod processor;
pub mod records;
pub mod requirements;
pub mod types;

pub use error::{Error, Result};
pub use matching::{
    filter_by_properties_and_type, find_property_value, match_properties_and_type,
    match_property, satisfies_requirements,
};
pub use processor::{process_elements, ProcessProgress, ProcessRequest, DEFAULT_BATCH_SIZE};
pub use records::PropertyRecords;
pub use requirements::{LinkRequirement, Requirements, SelectableRequirements};
pub use types::{ElementData, ExpressId, Links, Property, PropertySet, PropertyValue, Tag};
