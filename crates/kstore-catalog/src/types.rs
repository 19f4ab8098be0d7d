use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::CatalogError;

/// Template metadata and its visible versions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub info: Value,
    pub versions: Vec<String>,
}

/// One version of a template with its parsed manifest and raw pipeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TemplateVersionDetail {
    pub info: Value,
    pub version: String,
    pub manifest: Option<Value>,
    /// Pipeline definition exactly as stored; its format is up to consumers.
    #[serde(serialize_with = "serialize_text")]
    pub pipeline: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<DateTime<Utc>>,
}

impl TemplateVersionDetail {
    pub fn pipeline_text(&self) -> Option<String> {
        self.pipeline
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
    }
}

fn serialize_text<S: Serializer>(data: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match data {
        Some(bytes) => s.serialize_some(&String::from_utf8_lossy(bytes)),
        None => s.serialize_none(),
    }
}

/// Outcome of a successful ingestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedTemplate {
    pub name: String,
    pub versions: Vec<String>,
    /// Keys written, commit markers excluded.
    pub keys: Vec<String>,
}

/// Outcome of seeding a repository from a directory of packages.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub added: Vec<AddedTemplate>,
    pub failed: Vec<(PathBuf, CatalogError)>,
}

impl SeedReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pipeline_serialized_as_text() {
        let detail = TemplateVersionDetail {
            info: json!({"name": "t"}),
            version: "1".into(),
            manifest: Some(json!({"a": 1})),
            pipeline: Some(b"steps: []".to_vec()),
            committed_at: None,
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["pipeline"], "steps: []");
        assert_eq!(value["manifest"]["a"], 1);
        assert!(value.get("committed_at").is_none());
        assert_eq!(detail.pipeline_text().as_deref(), Some("steps: []"));
    }
}
