//! Catalog key convention.
//!
//! The catalog has no records of its own: templates and versions are read
//! off object keys laid out as
//!
//! ```text
//! {template}/info.json
//! {template}/{version}/manifest.json
//! {template}/{version}/<pipeline file>
//! {template}/{version}/models/<artifact file>
//! {template}/{version}/.kstore-commit
//! ```
//!
//! Every segment rule lives here. Keys with fewer than three segments never
//! name a version.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::{CatalogError, CatalogResult};

pub const INFO_FILE: &str = "info.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const PIPELINE_NAME: &str = "pipeline";
pub const MODELS_DIR: &str = "models";
pub const COMMIT_MARKER: &str = ".kstore-commit";

/// A key split into catalog coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedKey<'a> {
    pub template: &'a str,
    pub version: Option<&'a str>,
    pub relpath: Option<&'a str>,
}

/// Split a key into `(template, version, relpath)`.
///
/// `version` and `relpath` are only present when the key has a third,
/// non-empty segment.
///
/// # Examples
///
/// ```
/// use kstore_catalog::keys::parse_key;
///
/// let key = parse_key("xgboost/1/models/model.bst");
/// assert_eq!(key.template, "xgboost");
/// assert_eq!(key.version, Some("1"));
/// assert_eq!(key.relpath, Some("models/model.bst"));
///
/// assert_eq!(parse_key("xgboost/info.json").version, None);
/// ```
pub fn parse_key(key: &str) -> ParsedKey<'_> {
    let mut parts = key.splitn(3, '/');
    let template = parts.next().unwrap_or_default();
    let version = parts.next();
    match (version, parts.next()) {
        (Some(version), Some(relpath)) if !relpath.is_empty() => ParsedKey {
            template,
            version: Some(version),
            relpath: Some(relpath),
        },
        _ => ParsedKey {
            template,
            version: None,
            relpath: None,
        },
    }
}

pub fn to_key(template: &str, version: &str, relpath: &str) -> String {
    format!("{template}/{version}/{relpath}")
}

/// Key for a file staged at `relpath` inside a package of `template`.
pub fn package_key(template: &str, relpath: &str) -> String {
    format!("{template}/{relpath}")
}

pub fn template_prefix(template: &str) -> String {
    format!("{template}/")
}

/// Separator-qualified prefix: `"t/1/"` never matches keys of version `"10"`.
pub fn version_prefix(template: &str, version: &str) -> String {
    format!("{template}/{version}/")
}

pub fn models_prefix(template: &str, version: &str) -> String {
    format!("{template}/{version}/{MODELS_DIR}/")
}

pub fn info_key(template: &str) -> String {
    format!("{template}/{INFO_FILE}")
}

pub fn version_info_key(template: &str, version: &str) -> String {
    to_key(template, version, INFO_FILE)
}

pub fn marker_key(template: &str, version: &str) -> String {
    to_key(template, version, COMMIT_MARKER)
}

/// Distinct versions named by `keys`, sorted.
pub fn distinct_versions<'a, I>(keys: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    keys.into_iter()
        .filter_map(|key| parse_key(key).version)
        .map(str::to_string)
        .collect()
}

/// Versions whose commit marker appears in `keys`, sorted.
pub fn committed_versions<'a, I>(keys: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    keys.into_iter()
        .map(parse_key)
        .filter(|k| k.relpath == Some(COMMIT_MARKER))
        .filter_map(|k| k.version.map(str::to_string))
        .collect()
}

/// Order versions by dot-separated components, numerically where both
/// components are numbers, so `"2" < "10"` and `"1.2" < "1.10"`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Sort versions oldest first.
pub fn sorted_versions<I: IntoIterator<Item = String>>(versions: I) -> Vec<String> {
    let mut versions: Vec<String> = versions.into_iter().collect();
    versions.sort_by(|a, b| compare_versions(a, b));
    versions
}

/// What a file inside a version is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileRole {
    Manifest,
    Pipeline,
    Info,
    Model,
    Marker,
    Other,
}

impl FileRole {
    /// Classify a path relative to its version directory.
    pub fn classify(relpath: &str) -> Self {
        let file_name = relpath.rsplit('/').next().unwrap_or(relpath);
        if relpath == COMMIT_MARKER {
            Self::Marker
        } else if relpath.starts_with(MODELS_DIR) && relpath[MODELS_DIR.len()..].starts_with('/') {
            Self::Model
        } else if file_name.contains(MANIFEST_FILE) {
            Self::Manifest
        } else if file_name.contains(PIPELINE_NAME) {
            Self::Pipeline
        } else if file_name == INFO_FILE {
            Self::Info
        } else {
            Self::Other
        }
    }
}

/// Validate a template name or version for use as a single key segment.
pub fn validate_segment(kind: &'static str, name: &str) -> CatalogResult<()> {
    let invalid = |reason: &str| CatalogError::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("must not be '.' or '..'"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("must not contain path separators"));
    }
    if name.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn two_segments_never_name_a_version() {
        let key = parse_key("t/info.json");
        assert_eq!(key.template, "t");
        assert_eq!(key.version, None);
        assert_eq!(key.relpath, None);
    }

    #[test]
    fn deep_keys_name_their_second_segment() {
        let key = parse_key("t/1/models/sub/m.bin");
        assert_eq!(key.version, Some("1"));
        assert_eq!(key.relpath, Some("models/sub/m.bin"));
    }

    #[test]
    fn trailing_separator_is_not_a_file() {
        assert_eq!(parse_key("t/1/").version, None);
        assert_eq!(parse_key("t/").template, "t");
        assert_eq!(parse_key("t").template, "t");
    }

    #[test]
    fn distinct_versions_skip_shallow_keys() {
        let keys = ["t/info.json", "t/2/a", "t/1/models/m.bin", "t/1/manifest.json"];
        let versions: Vec<_> = distinct_versions(keys).into_iter().collect();
        assert_eq!(versions, vec!["1", "2"]);
    }

    #[test]
    fn committed_versions_need_a_marker() {
        let keys = ["t/1/manifest.json", "t/1/.kstore-commit", "t/2/manifest.json"];
        let versions: Vec<_> = committed_versions(keys).into_iter().collect();
        assert_eq!(versions, vec!["1"]);
    }

    #[test]
    fn prefixes_end_with_separator() {
        assert_eq!(version_prefix("t", "1"), "t/1/");
        assert!(!"t/10/a".starts_with(&version_prefix("t", "1")));
        assert_eq!(models_prefix("t", "1"), "t/1/models/");
        assert_eq!(info_key("t"), "t/info.json");
        assert_eq!(marker_key("t", "1"), "t/1/.kstore-commit");
    }

    #[test]
    fn versions_sort_numerically() {
        let sorted = sorted_versions(["10", "2", "1", "1.10", "1.2", "beta"].map(String::from));
        assert_eq!(sorted, vec!["1", "1.2", "1.10", "2", "10", "beta"]);
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    #[test]
    fn classify_roles() {
        assert_eq!(FileRole::classify("manifest.json"), FileRole::Manifest);
        assert_eq!(FileRole::classify("pipeline.yaml"), FileRole::Pipeline);
        assert_eq!(FileRole::classify("kfp/pipeline.py"), FileRole::Pipeline);
        assert_eq!(FileRole::classify("info.json"), FileRole::Info);
        assert_eq!(FileRole::classify("models/model.bst"), FileRole::Model);
        assert_eq!(FileRole::classify("models/pipeline.bin"), FileRole::Model);
        assert_eq!(FileRole::classify("modelsx/a"), FileRole::Other);
        assert_eq!(FileRole::classify(COMMIT_MARKER), FileRole::Marker);
        assert_eq!(FileRole::classify("README.md"), FileRole::Other);
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn validate_segment_rules() {
        assert!(validate_segment("template", "xgboost").is_ok());
        assert!(validate_segment("version", "1.0.0").is_ok());
        assert!(validate_segment("template", "").is_err());
        assert!(validate_segment("template", "..").is_err());
        assert!(validate_segment("template", "a/b").is_err());
        assert!(validate_segment("version", "a\nb").is_err());
    }

    proptest! {
        #[test]
        fn to_key_parse_key_agree(
            template in "[a-z0-9_.-]{1,12}",
            version in "[a-z0-9_.-]{1,8}",
            relpath in "[a-z0-9_.-]{1,8}(/[a-z0-9_.-]{1,8}){0,3}",
        ) {
            let key = to_key(&template, &version, &relpath);
            let parsed = parse_key(&key);
            prop_assert_eq!(parsed.template, template.as_str());
            prop_assert_eq!(parsed.version, Some(version.as_str()));
            prop_assert_eq!(parsed.relpath, Some(relpath.as_str()));
        }

        #[test]
        fn shallow_keys_have_no_version(template in "[a-z0-9]{1,8}", file in "[a-z0-9.]{0,8}") {
            let key = format!("{template}/{file}");
            prop_assert_eq!(parse_key(&key).version, None);
        }
    }
}
