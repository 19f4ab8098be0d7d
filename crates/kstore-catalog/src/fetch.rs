//! Model artifact download.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, CatalogResult};
use crate::keys::{self, FileRole};
use crate::parallel::map_bounded;
use crate::repository::TemplateRepository;

impl TemplateRepository {
    /// Download the model artifacts of a committed version into `dest`.
    ///
    /// Every object under `{name}/{version}/models/` is written to `dest`
    /// under its base name, nested directories flattened. Existing files are
    /// overwritten. Returns the written paths in key order.
    pub fn fetch_model_files(
        &self,
        name: &str,
        version: &str,
        dest: &Path,
    ) -> CatalogResult<Vec<PathBuf>> {
        keys::validate_segment("template", name)?;
        keys::validate_segment("version", version)?;
        let artifacts: Vec<String> = self
            .version_keys(name, version)?
            .into_iter()
            .filter(|key| {
                keys::parse_key(key)
                    .relpath
                    .is_some_and(|rel| FileRole::classify(rel) == FileRole::Model)
            })
            .collect();

        // Flattening can map several keys onto one file; the last key wins.
        let mut last_by_name: HashMap<&str, usize> = HashMap::new();
        for (i, key) in artifacts.iter().enumerate() {
            last_by_name.insert(base_name(key), i);
        }
        let artifacts: Vec<&str> = artifacts
            .iter()
            .enumerate()
            .filter(|(i, key)| {
                let kept = last_by_name.get(base_name(key)) == Some(i);
                if !kept {
                    tracing::debug!(key = %key, "artifact shadowed by a later key");
                }
                kept
            })
            .map(|(_, key)| key.as_str())
            .collect();

        std::fs::create_dir_all(dest)?;
        tracing::info!(
            template = %name,
            version = %version,
            files = artifacts.len(),
            dest = %dest.display(),
            "fetching model files"
        );
        map_bounded(&artifacts, self.config.download_parallelism, |key| {
            self.download(key, dest)
        })
    }

    fn download(&self, key: &str, dest: &Path) -> CatalogResult<PathBuf> {
        let data = self
            .store
            .get_object(&self.config.bucket, key)
            .map_err(|source| CatalogError::Download {
                key: key.to_string(),
                source,
            })?;
        let path = dest.join(base_name(key));
        std::fs::write(&path, &data)?;
        tracing::debug!(key = %key, path = %path.display(), "downloaded object");
        Ok(path)
    }
}

fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use crate::config::CatalogConfig;
    use crate::error::CatalogError;
    use crate::marker::CommitRecord;
    use crate::repository::TemplateRepository;
    use kstore_store::{InMemoryObjectStore, ObjectStore};
    use std::sync::Arc;

    const BUCKET: &str = "models-store";

    fn repo_with(objects: &[(&str, &[u8])], download_parallelism: usize) -> TemplateRepository {
        let store = Arc::new(InMemoryObjectStore::with_bucket(BUCKET));
        for (key, data) in objects {
            store.put_object(BUCKET, key, data).unwrap();
        }
        let config = CatalogConfig {
            download_parallelism,
            ..CatalogConfig::default()
        };
        TemplateRepository::open(store, config).unwrap()
    }

    #[test]
    fn nested_artifacts_are_flattened() {
        let marker = CommitRecord::new(3).to_bytes().unwrap();
        let repo = repo_with(
            &[
                ("t/1/manifest.json", b"{}".as_slice()),
                ("t/1/models/a.bin", b"A".as_slice()),
                ("t/1/models/sub/b.bin", b"B".as_slice()),
                ("t/1/.kstore-commit", marker.as_slice()),
                ("t/10/models/c.bin", b"C".as_slice()),
            ],
            1,
        );
        let dest = tempfile::tempdir().unwrap();
        let out = dest.path().join("out");
        let written = repo.fetch_model_files("t", "1", &out).unwrap();
        assert_eq!(written, vec![out.join("a.bin"), out.join("b.bin")]);
        assert_eq!(std::fs::read(out.join("a.bin")).unwrap(), b"A");
        assert_eq!(std::fs::read(out.join("b.bin")).unwrap(), b"B");
        assert!(!out.join("c.bin").exists());
        assert!(!out.join("manifest.json").exists());
    }

    #[test]
    fn existing_files_are_overwritten() {
        let marker = CommitRecord::new(1).to_bytes().unwrap();
        let repo = repo_with(
            &[
                ("t/1/models/a.bin", b"new".as_slice()),
                ("t/1/.kstore-commit", marker.as_slice()),
            ],
            1,
        );
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(dest.path().join("a.bin"), b"old").unwrap();
        repo.fetch_model_files("t", "1", dest.path()).unwrap();
        assert_eq!(std::fs::read(dest.path().join("a.bin")).unwrap(), b"new");
    }

    #[test]
    fn parallel_fetch() {
        let marker = CommitRecord::new(8).to_bytes().unwrap();
        let names: Vec<String> = (0..8).map(|i| format!("t/1/models/m{i}.bin")).collect();
        let mut objects: Vec<(&str, &[u8])> =
            names.iter().map(|k| (k.as_str(), k.as_bytes())).collect();
        objects.push(("t/1/.kstore-commit", marker.as_slice()));
        let repo = repo_with(&objects, 4);
        let dest = tempfile::tempdir().unwrap();
        let written = repo.fetch_model_files("t", "1", dest.path()).unwrap();
        assert_eq!(written.len(), 8);
        assert_eq!(
            std::fs::read(dest.path().join("m3.bin")).unwrap(),
            b"t/1/models/m3.bin"
        );
    }

    #[test]
    fn colliding_names_keep_the_last_key() {
        let marker = CommitRecord::new(4).to_bytes().unwrap();
        let earlier = vec![b'A'; 1 << 20];
        let later = vec![b'B'; 1 << 20];
        let repo = repo_with(
            &[
                ("t/1/models/a.bin", earlier.as_slice()),
                ("t/1/models/other.bin", b"o".as_slice()),
                ("t/1/models/sub/a.bin", later.as_slice()),
                ("t/1/.kstore-commit", marker.as_slice()),
            ],
            2,
        );
        for _ in 0..20 {
            let dest = tempfile::tempdir().unwrap();
            let written = repo.fetch_model_files("t", "1", dest.path()).unwrap();
            assert_eq!(
                written,
                vec![dest.path().join("other.bin"), dest.path().join("a.bin")]
            );
            assert_eq!(std::fs::read(dest.path().join("a.bin")).unwrap(), later);
        }
    }

    #[test]
    fn uncommitted_version_is_not_found() {
        let repo = repo_with(&[("t/1/models/a.bin", b"A".as_slice())], 1);
        let dest = tempfile::tempdir().unwrap();
        let err = repo.fetch_model_files("t", "1", dest.path()).unwrap_err();
        assert!(matches!(err, CatalogError::VersionNotFound { .. }));
    }

    #[test]
    fn version_without_models_fetches_nothing() {
        let marker = CommitRecord::new(1).to_bytes().unwrap();
        let repo = repo_with(
            &[
                ("t/1/manifest.json", b"{}".as_slice()),
                ("t/1/.kstore-commit", marker.as_slice()),
            ],
            1,
        );
        let dest = tempfile::tempdir().unwrap();
        assert!(repo.fetch_model_files("t", "1", dest.path()).unwrap().is_empty());
    }
}
