// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command line errors.

use cutline_timeline::TimelineError;
use std::path::PathBuf;
use thiserror::Error;

/// Command line errors
#[derive(Debug, Error)]
pub enum CliError {
    /// A timeline edit failed
    #[error(transparent)]
    Timeline(#[from] TimelineError),

    /// A script command failed
    #[error("Command {index} ({description}) failed: {source}")]
    Command {
        /// 1-based position in the script
        index: usize,
        /// Command description
        description: String,
        /// Cause
        source: TimelineError,
    },

    /// File could not be read or written
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Cause
        source: std::io::Error,
    },

    /// RON scene or script could not be parsed
    #[error("Parse error in {path:?}: {source}")]
    Ron {
        /// File path
        path: PathBuf,
        /// Cause
        source: ron::error::SpannedError,
    },

    /// JSON scene could not be parsed or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON scene could not be written
    #[error("Serialization error: {0}")]
    Serialization(#[from] ron::Error),

    /// Scene file extension is neither `ron` nor `json`
    #[error("Unsupported scene format: {0:?}")]
    UnsupportedFormat(PathBuf),

    /// Log filter directive could not be parsed
    #[error("Invalid log directive: {0}")]
    Logging(#[from] tracing_subscriber::filter::ParseError),
}

impl CliError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
