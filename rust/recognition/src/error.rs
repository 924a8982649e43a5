// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for recognition.
//!
//! Detection problems never surface here: they degrade to lower confidence
//! or a review flag. Only invalid configuration and cancellation abort.

use crate::context::Stage;

/// Result type alias for recognition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort recognition of a page or document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration rejected before any page was processed.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Cooperative cancellation observed; partial results are discarded.
    #[error("recognition cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{lower} must be smaller than {upper}")]
    InvertedRange {
        lower: &'static str,
        upper: &'static str,
    },
}
