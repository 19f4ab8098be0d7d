use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::object::{build_listing, ObjectEntry};
use crate::traits::ObjectStore;

/// Directory holding in-flight writes, kept outside every bucket.
const TMP_DIR: &str = ".tmp";

/// Filesystem-backed object store.
///
/// Each bucket is a directory under `root`; each object is a file whose
/// path is the key split on `/`. Writes go to a temporary file first and are
/// renamed into place, so readers never observe a partially written object.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(TMP_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty() || bucket.starts_with('.') || bucket.contains(['/', '\\']) {
            return Err(StoreError::InvalidKey {
                key: bucket.to_string(),
                reason: "invalid bucket name".into(),
            });
        }
        Ok(self.root.join(bucket))
    }

    fn existing_bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        Ok(dir)
    }

    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        let mut path = self.existing_bucket_dir(bucket)?;
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(StoreError::InvalidKey {
                    key: key.to_string(),
                    reason: format!("unsupported path segment {segment:?}"),
                });
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Remove empty directories between `path` and the bucket root.
    fn prune_empty_parents(&self, bucket_dir: &Path, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == bucket_dir || std::fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let segments: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    segments.map(|s| s.join("/"))
}

impl ObjectStore for FsObjectStore {
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> StoreResult<Vec<ObjectEntry>> {
        let dir = self.existing_bucket_dir(bucket)?;
        let mut objects = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(false) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(key) = relative_key(&dir, entry.path()) else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 object path");
                continue;
            };
            if key.starts_with(prefix) {
                let size = entry.metadata().map_err(|e| StoreError::Io(e.into()))?.len();
                objects.push((key, size));
            }
        }
        Ok(build_listing(
            objects.iter().map(|(k, s)| (k.as_str(), *s)),
            prefix,
            recursive,
        ))
    }

    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::not_found(bucket, key))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = tempfile::NamedTempFile::new_in(self.root.join(TMP_DIR))?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let bucket_dir = self.existing_bucket_dir(bucket)?;
        let path = self.object_path(bucket, key)?;
        if !path.is_file() {
            return Err(StoreError::not_found(bucket, key));
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_parents(&bucket_dir, &path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::not_found(bucket, key))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.bucket_dir(bucket)?.is_dir())
    }

    fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        std::fs::create_dir_all(self.bucket_dir(bucket)?)?;
        Ok(())
    }

    fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        Ok(self.object_path(bucket, key)?.is_file())
    }
}
