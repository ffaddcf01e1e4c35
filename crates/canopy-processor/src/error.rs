//! Error types for the processor.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for processor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that surface from top-level processing calls.
///
/// Per-file and per-project failures never appear here: they are returned
/// as error nodes inside the aggregate tree.
#[derive(Debug, Error)]
pub enum Error {
    /// Classification, missing input or cancellation.
    #[error(transparent)]
    Core(#[from] canopy_core::Error),

    /// The solution manifest itself could not be read or parsed.
    #[error("Failed to resolve solution {path}: {source}")]
    Solution {
        path: PathBuf,
        #[source]
        source: canopy_manifest::Error,
    },
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Core(err) if err.is_cancelled())
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, Error::Core(canopy_core::Error::Classification { .. }))
    }
}
