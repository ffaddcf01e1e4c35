//! Error types for canopy core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for canopy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while classifying, parsing or assembling results.
#[derive(Debug, Error)]
pub enum Error {
    /// The input path matches no known analyzer or manifest type.
    #[error("Unsupported input: {path}")]
    Classification {
        /// Path that could not be classified.
        path: PathBuf,
    },

    /// The target path does not exist.
    #[error("File not found: {path}")]
    MissingFile {
        /// Path that was expected to exist.
        path: PathBuf,
    },

    /// No registered analyzer claims the file.
    #[error("No analyzer registered for {path}")]
    NoAnalyzer {
        /// Path without a matching analyzer.
        path: PathBuf,
    },

    /// The syntax-parsing service failed for a file.
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// Path of the file that failed to parse.
        path: PathBuf,
        /// Message reported by the parsing service.
        message: String,
    },

    /// A project or solution manifest could not be read or parsed.
    #[error("Manifest error in {path}: {message}")]
    ManifestParse {
        /// Path of the manifest.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// Configuration is invalid.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for the cancellation signal.
    ///
    /// Cancellation is not a failure: callers propagate it instead of
    /// turning it into an error node.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Stable name of the error category, used as the `errorKind` attribute
    /// on synthetic error nodes.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::Classification { .. } => "Classification",
            Error::MissingFile { .. } => "MissingFile",
            Error::NoAnalyzer { .. } => "NoAnalyzer",
            Error::Parse { .. } => "ParseFailure",
            Error::ManifestParse { .. } => "ManifestFailure",
            Error::InvalidConfig { .. } => "InvalidConfig",
            Error::Cancelled => "Cancelled",
            Error::Io(_) => "Io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let err = Error::Parse {
            path: PathBuf::from("a.cs"),
            message: "bad".to_string(),
        };
        assert_eq!(err.kind_name(), "ParseFailure");
        assert!(!err.is_cancelled());
        assert!(Error::Cancelled.is_cancelled());
    }

    #[test]
    fn test_display_includes_path() {
        let err = Error::MissingFile {
            path: PathBuf::from("/src/missing.cs"),
        };
        assert_eq!(err.to_string(), "File not found: /src/missing.cs");
    }
}
