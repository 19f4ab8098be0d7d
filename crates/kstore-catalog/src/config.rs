use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

pub const ENV_BUCKET: &str = "MODEL_STORE";
pub const ENV_STAGING_DIR: &str = "KSTORE_STAGING_DIR";
pub const ENV_UPLOAD_PARALLELISM: &str = "KSTORE_UPLOAD_PARALLELISM";
pub const ENV_DOWNLOAD_PARALLELISM: &str = "KSTORE_DOWNLOAD_PARALLELISM";

/// Configuration for a template repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Bucket holding every template object.
    pub bucket: String,
    /// Directory under which per-ingestion staging directories are created.
    /// `None` selects the system temporary directory.
    pub staging_dir: Option<PathBuf>,
    /// Maximum concurrent uploads during ingestion.
    pub upload_parallelism: usize,
    /// Maximum concurrent downloads during artifact fetch.
    pub download_parallelism: usize,
    /// When `true`, versions without a commit marker are invisible.
    pub require_commit_marker: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            bucket: "models-store".into(),
            staging_dir: None,
            upload_parallelism: 1,
            download_parallelism: 1,
            require_commit_marker: true,
        }
    }
}

impl CatalogConfig {
    pub fn from_toml_str(s: &str) -> CatalogResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| CatalogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> CatalogResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Config(format!("cannot read {path:?}: {e}")))?;
        Self::from_toml_str(&text)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> CatalogResult<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> CatalogResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bucket) = lookup(ENV_BUCKET) {
            self.bucket = bucket;
        }
        if let Some(dir) = lookup(ENV_STAGING_DIR) {
            self.staging_dir = Some(PathBuf::from(dir));
        }
        if let Some(n) = lookup(ENV_UPLOAD_PARALLELISM) {
            self.upload_parallelism = parse_count(ENV_UPLOAD_PARALLELISM, &n)?;
        }
        if let Some(n) = lookup(ENV_DOWNLOAD_PARALLELISM) {
            self.download_parallelism = parse_count(ENV_DOWNLOAD_PARALLELISM, &n)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> CatalogResult<()> {
        if self.bucket.is_empty() {
            return Err(CatalogError::Config("bucket must not be empty".into()));
        }
        if self.upload_parallelism == 0 || self.download_parallelism == 0 {
            return Err(CatalogError::Config("parallelism must be at least 1".into()));
        }
        Ok(())
    }

    pub fn staging_root(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn parse_count(name: &str, value: &str) -> CatalogResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| CatalogError::Config(format!("{name} must be a positive integer, got {value:?}")))
}
