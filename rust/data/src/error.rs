// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for property data handling.

use crate::types::ExpressId;

/// Result type alias for property data operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing or persisting element data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two records in one batch carry the same express id.
    #[error("duplicate element record: #{0}")]
    DuplicateRecord(ExpressId),

    /// A processing batch size of zero was requested.
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
