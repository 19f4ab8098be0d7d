//! Package extraction into per-call staging directories.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{CatalogError, CatalogResult};
use crate::keys;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Archive suffixes stripped from the file name to obtain the template name.
pub const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar"];

/// A regular file unpacked from a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedFile {
    /// Absolute path inside the staging directory.
    pub path: PathBuf,
    /// Path relative to the staging root, `/`-separated.
    pub relpath: String,
}

/// An unpacked package.
///
/// Owns its staging directory exclusively; the directory and everything in
/// it is removed when the value is dropped.
#[derive(Debug)]
pub struct StagedPackage {
    pub template: String,
    pub archive: PathBuf,
    pub files: Vec<StagedFile>,
    dir: TempDir,
}

impl StagedPackage {
    pub fn staging_path(&self) -> &Path {
        self.dir.path()
    }

    /// Object key for a staged file.
    pub fn key_for(&self, file: &StagedFile) -> String {
        keys::package_key(&self.template, &file.relpath)
    }

    /// Versions the package contains.
    pub fn versions(&self) -> BTreeSet<String> {
        let keys: Vec<String> = self.files.iter().map(|f| self.key_for(f)).collect();
        keys::distinct_versions(keys.iter().map(String::as_str))
    }
}

/// Derive the template name from an archive path.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use kstore_catalog::extract::template_name;
///
/// assert_eq!(template_name(Path::new("/tmp/xgboost.tar")).unwrap(), "xgboost");
/// assert_eq!(template_name(Path::new("lgbm.tar.gz")).unwrap(), "lgbm");
/// ```
pub fn template_name(archive: &Path) -> CatalogResult<String> {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CatalogError::Extraction {
            archive: archive.to_path_buf(),
            reason: "archive path has no UTF-8 file name".into(),
        })?;
    let name = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .or_else(|| Path::new(file_name).file_stem().and_then(|s| s.to_str()))
        .unwrap_or(file_name);
    keys::validate_segment("template", name)?;
    Ok(name.to_string())
}

/// Unpack `archive` into a fresh directory under `staging_root`.
pub fn extract(archive: &Path, staging_root: &Path) -> CatalogResult<StagedPackage> {
    let template = template_name(archive)?;
    let fail = |reason: String| CatalogError::Extraction {
        archive: archive.to_path_buf(),
        reason,
    };

    std::fs::create_dir_all(staging_root)?;
    let dir = tempfile::Builder::new()
        .prefix(&format!("kstore-{template}-"))
        .tempdir_in(staging_root)?;
    tracing::debug!(archive = %archive.display(), staging = %dir.path().display(), "extracting package");

    let file = File::open(archive).map_err(|e| fail(format!("cannot open archive: {e}")))?;
    let mut reader = BufReader::new(file);
    let gzipped = reader
        .fill_buf()
        .map_err(|e| fail(format!("cannot read archive: {e}")))?
        .starts_with(&GZIP_MAGIC);
    let reader: Box<dyn Read> = if gzipped {
        Box::new(flate2::read::GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_permissions(false);
    tar.unpack(dir.path())
        .map_err(|e| fail(format!("malformed archive: {e}")))?;

    let files = staged_files(dir.path()).map_err(|e| fail(e.to_string()))?;
    if files.is_empty() {
        return Err(fail("archive contains no files".into()));
    }
    if let Some(reserved) = files
        .iter()
        .find(|f| f.relpath.rsplit('/').next() == Some(keys::COMMIT_MARKER))
    {
        return Err(fail(format!("reserved file name {}", reserved.relpath)));
    }

    Ok(StagedPackage {
        template,
        archive: archive.to_path_buf(),
        files,
        dir,
    })
}

/// Regular files under `root`, sorted by relative path.
fn staged_files(root: &Path) -> std::io::Result<Vec<StagedFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let segments: Option<Vec<&str>> =
            rel.components().map(|c| c.as_os_str().to_str()).collect();
        let relpath = segments.map(|s| s.join("/")).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("non UTF-8 file name in archive: {rel:?}"),
            )
        })?;
        files.push(StagedFile {
            path: entry.path().to_path_buf(),
            relpath,
        });
    }
    files.sort_by(|a, b| a.relpath.cmp(&b.relpath));
    Ok(files)
}
