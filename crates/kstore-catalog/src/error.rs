//! Error types for catalog operations.

use std::path::PathBuf;

use kstore_store::StoreError;
use thiserror::Error;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The package archive is malformed, unreadable or empty.
    #[error("cannot extract {archive:?}: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    /// Writing one of the package files to the store failed.
    #[error("upload of {key} from {archive:?} failed: {source}")]
    Upload {
        archive: PathBuf,
        key: String,
        #[source]
        source: StoreError,
    },

    /// Reading an artifact from the store failed.
    #[error("download of {key} failed: {source}")]
    Download {
        key: String,
        #[source]
        source: StoreError,
    },

    /// No object exists under the template's prefix.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The version has no committed objects.
    #[error("template version not found: {template}/{version}")]
    VersionNotFound { template: String, version: String },

    /// Neither the template nor any of its versions carries `info.json`.
    #[error("template information not found: {0}")]
    InfoNotFound(String),

    /// A template name or version cannot be used as a key segment.
    #[error("invalid {kind} {name:?}: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// A stored JSON document could not be parsed.
    #[error("invalid document {key}: {source}")]
    InvalidDocument {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A catalog record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The object store failed for a reason other than absence.
    #[error("store error: {0}")]
    Backend(#[from] StoreError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local filesystem failure (staging, fetch destination).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Returns `true` when the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TemplateNotFound(_) | Self::VersionNotFound { .. } | Self::InfoNotFound(_)
        )
    }

    /// Returns `true` when the store could not serve the request and a retry
    /// may succeed.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Backend(e) | Self::Upload { source: e, .. } | Self::Download { source: e, .. } => {
                e.is_transient()
            }
            _ => false,
        }
    }

    pub(crate) fn version_not_found(template: &str, version: &str) -> Self {
        Self::VersionNotFound {
            template: template.to_string(),
            version: version.to_string(),
        }
    }
}

/// Convenience type alias for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
