//! Error types for canopy-manifest

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using canopy-manifest Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or resolving manifests
#[derive(Debug, Error)]
pub enum Error {
    /// The manifest could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid UTF-8
    #[error("Manifest is not valid UTF-8: {0}")]
    Encoding(PathBuf),

    /// XML syntax error
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute syntax error
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Well-formed XML that is not a manifest of the expected shape
    #[error("Invalid manifest document: {0}")]
    InvalidDocument(String),

    /// Item pattern could not be compiled
    #[error("Invalid item pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

impl Error {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::InvalidData {
            Error::Encoding(path.to_path_buf())
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Converts into the core taxonomy, attributing the failure to `manifest`.
    ///
    /// Every manifest failure, a missing manifest included, is a
    /// `ManifestParse`; the message keeps the underlying cause.
    pub fn into_core(self, manifest: &Path) -> canopy_core::Error {
        canopy_core::Error::ManifestParse {
            path: manifest.to_path_buf(),
            message: self.to_string(),
        }
    }
}
