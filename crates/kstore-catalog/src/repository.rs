use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use kstore_store::ObjectStore;
use serde_json::Value;
use walkdir::WalkDir;

use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::extract::{self, StagedFile, StagedPackage, ARCHIVE_SUFFIXES};
use crate::keys::{self, FileRole};
use crate::marker::CommitRecord;
use crate::parallel::map_bounded;
use crate::types::{AddedTemplate, SeedReport, TemplateSummary, TemplateVersionDetail};

/// Versioned template catalog over a flat object store.
///
/// Holds no catalog state of its own: every query lists keys and derives the
/// template/version tree from them through [`keys`].
pub struct TemplateRepository {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) config: CatalogConfig,
}

impl std::fmt::Debug for TemplateRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRepository")
            .field("bucket", &self.config.bucket)
            .finish()
    }
}

impl TemplateRepository {
    /// Open a repository, creating the configured bucket if it is missing.
    pub fn open(store: Arc<dyn ObjectStore>, config: CatalogConfig) -> CatalogResult<Self> {
        config.validate()?;
        if !store.bucket_exists(&config.bucket)? {
            tracing::info!(bucket = %config.bucket, "creating template bucket");
            store.create_bucket(&config.bucket)?;
        }
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    // ---- Ingestion ----

    /// Ingest a package archive.
    ///
    /// Uploads every file of the package, then commits each version it
    /// contains. A failure leaves the versions uncommitted: already uploaded
    /// objects stay in the store but are not part of the catalog.
    pub fn add(&self, archive: &Path) -> CatalogResult<AddedTemplate> {
        tracing::info!(archive = %archive.display(), "adding template package");
        let package = extract::extract(archive, &self.config.staging_root())?;
        let versions = package.versions();

        // Hide versions being replaced until the new files are complete.
        for version in &versions {
            self.remove_quietly(&keys::marker_key(&package.template, version))?;
        }

        let uploaded = map_bounded(&package.files, self.config.upload_parallelism, |file| {
            self.upload(&package, file)
        })?;

        let mut per_version: BTreeMap<&str, usize> = BTreeMap::new();
        for key in &uploaded {
            if let Some(version) = keys::parse_key(key).version {
                *per_version.entry(version).or_default() += 1;
            }
        }
        for (version, files) in per_version {
            let key = keys::marker_key(&package.template, version);
            let record = CommitRecord::new(files).to_bytes()?;
            self.store
                .put_object(&self.config.bucket, &key, &record)
                .map_err(|source| CatalogError::Upload {
                    archive: package.archive.clone(),
                    key,
                    source,
                })?;
        }

        tracing::info!(
            template = %package.template,
            files = uploaded.len(),
            versions = ?versions,
            "added template"
        );
        Ok(AddedTemplate {
            name: package.template.clone(),
            versions: keys::sorted_versions(versions),
            keys: uploaded,
        })
    }

    fn upload(&self, package: &StagedPackage, file: &StagedFile) -> CatalogResult<String> {
        let key = package.key_for(file);
        let data = std::fs::read(&file.path)?;
        tracing::debug!(key = %key, len = data.len(), "uploading object");
        self.store
            .put_object(&self.config.bucket, &key, &data)
            .map_err(|source| CatalogError::Upload {
                archive: package.archive.clone(),
                key: key.clone(),
                source,
            })?;
        Ok(key)
    }

    /// Ingest every package archive found under `dir`.
    ///
    /// Failures are logged and reported without stopping the walk.
    pub fn seed_from_dir(&self, dir: &Path) -> CatalogResult<SeedReport> {
        tracing::info!(dir = %dir.display(), "loading template packages");
        let mut report = SeedReport::default();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| CatalogError::Io(e.into()))?;
            let is_package = entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| ARCHIVE_SUFFIXES.iter().any(|s| name.ends_with(s)));
            if !is_package {
                continue;
            }
            match self.add(entry.path()) {
                Ok(added) => report.added.push(added),
                Err(e) => {
                    tracing::warn!(archive = %entry.path().display(), error = %e, "failed to load template package");
                    report.failed.push((entry.path().to_path_buf(), e));
                }
            }
        }
        Ok(report)
    }

    // ---- Catalog queries ----

    /// Names of all templates, sorted.
    pub fn list_templates(&self) -> CatalogResult<Vec<String>> {
        let entries = self.store.list_objects(&self.config.bucket, "", false)?;
        let names: BTreeSet<String> = entries
            .iter()
            .filter(|e| e.key.contains('/'))
            .map(|e| keys::parse_key(&e.key).template)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }

    pub fn get_template_info(&self, name: &str) -> CatalogResult<TemplateSummary> {
        keys::validate_segment("template", name)?;
        let keys = self.keys_under(&keys::template_prefix(name))?;
        if keys.is_empty() {
            return Err(CatalogError::TemplateNotFound(name.to_string()));
        }
        let versions = keys::sorted_versions(self.visible_versions(&keys));
        let info = self.read_info(name, &keys, versions.iter().rev().map(String::as_str))?;
        Ok(TemplateSummary { info, versions })
    }

    pub fn get_template_version(
        &self,
        name: &str,
        version: &str,
    ) -> CatalogResult<TemplateVersionDetail> {
        keys::validate_segment("template", name)?;
        keys::validate_segment("version", version)?;
        let keys = self.version_keys(name, version)?;

        let mut manifest_key: Option<&str> = None;
        let mut pipeline_key: Option<&str> = None;
        let mut marker_key: Option<&str> = None;
        for key in &keys {
            let Some(relpath) = keys::parse_key(key).relpath else {
                continue;
            };
            let slot = match FileRole::classify(relpath) {
                FileRole::Manifest => &mut manifest_key,
                FileRole::Pipeline => &mut pipeline_key,
                FileRole::Marker => &mut marker_key,
                _ => continue,
            };
            // Prefer the file closest to the version root.
            if slot.map_or(true, |current| depth(key) < depth(current)) {
                *slot = Some(key.as_str());
            }
        }

        let manifest = match manifest_key {
            Some(key) => self.read_json(key)?,
            None => None,
        };
        let pipeline = match pipeline_key {
            Some(key) => self.read_object(key)?,
            None => None,
        };
        let committed_at = match marker_key {
            Some(key) => match self.read_object(key)? {
                Some(data) => {
                    let record = CommitRecord::from_bytes(&data);
                    if record.is_none() {
                        tracing::warn!(key = %key, "unreadable commit marker");
                    }
                    record.map(|r| r.committed_at)
                }
                None => None,
            },
            None => None,
        };

        let mut info_keys = keys.clone();
        if self
            .store
            .object_exists(&self.config.bucket, &keys::info_key(name))?
        {
            info_keys.push(keys::info_key(name));
        }
        let info = self.read_info(name, &info_keys, std::iter::once(version))?;

        Ok(TemplateVersionDetail {
            info,
            version: version.to_string(),
            manifest,
            pipeline,
            committed_at,
        })
    }

    pub fn has_template(&self, name: &str) -> CatalogResult<bool> {
        keys::validate_segment("template", name)?;
        Ok(!self.keys_under(&keys::template_prefix(name))?.is_empty())
    }

    pub fn has_version(&self, name: &str, version: &str) -> CatalogResult<bool> {
        keys::validate_segment("template", name)?;
        keys::validate_segment("version", version)?;
        match self.version_keys(name, version) {
            Ok(_) => Ok(true),
            Err(CatalogError::VersionNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ---- Deletion ----

    /// Remove every object of a template. Returns the removed keys; empty
    /// when the template does not exist.
    pub fn delete_template(&self, name: &str) -> CatalogResult<Vec<String>> {
        keys::validate_segment("template", name)?;
        let keys = self.keys_under(&keys::template_prefix(name))?;
        let removed = self.remove_all(keys)?;
        tracing::info!(template = %name, objects = removed.len(), "deleted template");
        Ok(removed)
    }

    /// Remove every object of one version, leaving sibling versions intact.
    pub fn delete_template_version(&self, name: &str, version: &str) -> CatalogResult<Vec<String>> {
        keys::validate_segment("template", name)?;
        keys::validate_segment("version", version)?;
        let scope = keys::version_prefix(name, version);
        let keys: Vec<String> = self
            .keys_under(&keys::template_prefix(name))?
            .into_iter()
            .filter(|key| key.starts_with(&scope))
            .collect();
        let removed = self.remove_all(keys)?;
        tracing::info!(
            template = %name,
            version = %version,
            objects = removed.len(),
            "deleted template version"
        );
        Ok(removed)
    }

    /// Remove `keys`, commit markers first so versions leave the catalog
    /// before their files do.
    fn remove_all(&self, mut keys: Vec<String>) -> CatalogResult<Vec<String>> {
        keys.sort_by_key(|key| {
            keys::parse_key(key).relpath.map(FileRole::classify) != Some(FileRole::Marker)
        });
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if self.remove_quietly(&key)? {
                removed.push(key);
            } else {
                tracing::warn!(key = %key, "object vanished before removal");
            }
        }
        Ok(removed)
    }

    /// Remove one object. Returns `false` if it was already gone.
    fn remove_quietly(&self, key: &str) -> CatalogResult<bool> {
        match self.store.remove_object(&self.config.bucket, key) {
            Ok(()) => {
                tracing::debug!(key = %key, "removed object");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // ---- Helpers ----

    /// Keys of all objects under `prefix`, sorted.
    pub(crate) fn keys_under(&self, prefix: &str) -> CatalogResult<Vec<String>> {
        Ok(self
            .store
            .list_objects(&self.config.bucket, prefix, true)?
            .into_iter()
            .filter(|e| !e.is_prefix)
            .map(|e| e.key)
            .collect())
    }

    /// Keys of a visible version, or `VersionNotFound`.
    pub(crate) fn version_keys(&self, name: &str, version: &str) -> CatalogResult<Vec<String>> {
        let keys: Vec<String> = self
            .keys_under(&keys::version_prefix(name, version))?
            .into_iter()
            .filter(|key| keys::parse_key(key).version == Some(version))
            .collect();
        if !self.visible_versions(&keys).contains(version) {
            return Err(CatalogError::version_not_found(name, version));
        }
        Ok(keys)
    }

    fn visible_versions(&self, keys: &[String]) -> BTreeSet<String> {
        let keys = keys.iter().map(String::as_str);
        if self.config.require_commit_marker {
            keys::committed_versions(keys)
        } else {
            keys::distinct_versions(keys)
        }
    }

    /// Template info: the template-level document if present, else the
    /// first of `fallback_versions` carrying one.
    fn read_info<'a, I>(&self, name: &str, keys: &[String], fallback_versions: I) -> CatalogResult<Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: BTreeSet<&str> = keys.iter().map(String::as_str).collect();
        let candidates = std::iter::once(keys::info_key(name)).chain(
            fallback_versions
                .into_iter()
                .map(|v| keys::version_info_key(name, v)),
        );
        for key in candidates {
            if !present.contains(key.as_str()) {
                continue;
            }
            if let Some(info) = self.read_json(&key)? {
                return Ok(info);
            }
            tracing::warn!(key = %key, "template info vanished while reading");
        }
        Err(CatalogError::InfoNotFound(name.to_string()))
    }

    /// Read an object; `None` if it does not exist.
    pub(crate) fn read_object(&self, key: &str) -> CatalogResult<Option<Vec<u8>>> {
        match self.store.get_object(&self.config.bucket, key) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_json(&self, key: &str) -> CatalogResult<Option<Value>> {
        let Some(data) = self.read_object(key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| CatalogError::InvalidDocument {
                key: key.to_string(),
                source,
            })
    }
}

fn depth(key: &str) -> usize {
    key.matches('/').count()
}
