//! Flat object storage for the KStore template catalog.
//!
//! This crate defines the object-store capability the catalog consumes: a
//! bucket-scoped, blocking key/value store with prefix listing, modelled on
//! S3/MinIO semantics. There are no directories, only keys. Hierarchy is an
//! interpretation layered on top by the catalog crate.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- one directory per bucket on the local filesystem
//!
//! # Design Rules
//!
//! 1. Single-object reads observe the latest completed write.
//! 2. Listings are sorted by key and may be served from a snapshot.
//! 3. Non-recursive listings collapse deeper keys into prefix entries.
//! 4. The store never interprets object contents.
//! 5. Absence is reported as [`StoreError::NotFound`], distinct from I/O or
//!    availability failures.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::ObjectEntry;
pub use traits::ObjectStore;
