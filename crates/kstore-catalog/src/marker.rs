//! Version commit markers.
//!
//! A version's files are uploaded first and its marker last. Readers treat a
//! version without a marker as absent, so an ingestion that fails halfway
//! never shows up in the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Contents of a commit marker object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Number of files uploaded for the version, the marker excluded.
    pub files: usize,
    pub committed_at: DateTime<Utc>,
}

impl CommitRecord {
    pub fn new(files: usize) -> Self {
        Self {
            files,
            committed_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> CatalogResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CatalogError::Serialization(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let record = CommitRecord::new(4);
        let decoded = CommitRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(CommitRecord::from_bytes(b"not json").is_none());
    }
}
