//! Versioned template package catalog for KStore.
//!
//! Template packages are tar archives (optionally gzip-compressed) holding
//! one or more versions of a template: a manifest, a pipeline definition and
//! model artifacts. The catalog stores them in a flat object store under
//! `{template}/{version}/{path}` keys and answers queries purely by listing
//! keys. There is no index to keep in sync.
//!
//! # Architecture
//!
//! - **keys**: the key convention and every rule deriving templates and
//!   versions from keys
//! - **extract**: unpacks an archive into a private staging directory
//! - **TemplateRepository**: ingestion, queries, scoped deletion, seeding
//! - **fetch**: downloads a version's model artifacts to a local directory
//! - **marker**: commit markers making an ingested version visible
//!
//! A version becomes visible only once its commit marker is written, after
//! every file of the package has been uploaded.

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod keys;
pub mod marker;
mod parallel;
pub mod repository;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::CatalogConfig;
pub use error::{CatalogError, CatalogResult};
pub use keys::FileRole;
pub use marker::CommitRecord;
pub use repository::TemplateRepository;
pub use types::{AddedTemplate, SeedReport, TemplateSummary, TemplateVersionDetail};
