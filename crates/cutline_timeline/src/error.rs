// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy shared by every timeline operation.

use thiserror::Error;

/// A single item that failed inside a bulk operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    /// Host node name of the failed item
    pub item: String,
    /// Rendered cause
    pub reason: String,
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.item, self.reason)
    }
}

/// Timeline errors
#[derive(Debug, Error)]
pub enum TimelineError {
    /// Referenced curve, shot, attribute or node does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Edit attempted on referenced or locked content
    #[error("Read-only: {0}")]
    ReadOnly(String),

    /// Empty or inverted range, or a frame outside the shot it must split
    #[error("Invalid range [{start}, {end}]: {reason}")]
    InvalidRange {
        /// Requested start
        start: f64,
        /// Requested end
        end: f64,
        /// What made the range unusable
        reason: String,
    },

    /// More than one shot occupies a range that must be unique
    #[error("Shots {shots:?} overlap the range [{start}, {end}]")]
    AmbiguousOverlap {
        /// Unlocked shots found in the range
        shots: Vec<String>,
        /// Range start
        start: f64,
        /// Range end
        end: f64,
    },

    /// One or more items of a bulk operation failed
    #[error("{operation} failed on {} item(s): {}", .failures.len(), format_failures(.failures))]
    OperationFailed {
        /// Name of the bulk operation
        operation: String,
        /// Every item that failed, in processing order
        failures: Vec<ItemFailure>,
    },

    /// The host refused an edit
    #[error("Host rejected edit: {0}")]
    Rejected(String),

    /// Settings could not be parsed
    #[error("Settings error: {0}")]
    Settings(#[from] ron::error::SpannedError),

    /// Settings could not be written
    #[error("Settings serialization error: {0}")]
    SettingsWrite(#[from] ron::Error),

    /// Undo snapshot could not be taken or restored
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    /// Settings file I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TimelineError {
    /// Build an `InvalidRange` error
    pub fn invalid_range(start: f64, end: f64, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            start,
            end,
            reason: reason.into(),
        }
    }

    /// Names of the failed items when this is an aggregate failure
    pub fn failed_items(&self) -> Vec<&str> {
        match self {
            Self::OperationFailed { failures, .. } => {
                failures.iter().map(|f| f.item.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn format_failures(failures: &[ItemFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;
