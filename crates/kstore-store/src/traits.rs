use crate::error::StoreResult;
use crate::object::ObjectEntry;

/// Flat, bucket-scoped object store.
///
/// All implementations must satisfy these invariants:
/// - Keys are opaque strings; `/` has no meaning except in non-recursive
///   listings, where it delimits prefix entries.
/// - A successful `put_object` is visible to the next `get_object`.
/// - Listings are sorted by key.
/// - Absence is reported as `StoreError::NotFound`, never as an I/O error.
/// - Calls block until the backend has answered.
pub trait ObjectStore: Send + Sync {
    /// List objects whose key starts with `prefix`.
    ///
    /// With `recursive == false`, keys with a further `/` after the prefix
    /// are collapsed into a single prefix entry.
    fn list_objects(&self, bucket: &str, prefix: &str, recursive: bool)
        -> StoreResult<Vec<ObjectEntry>>;

    /// Read an object's bytes.
    ///
    /// Returns `Err(StoreError::NotFound)` if the object does not exist.
    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Write an object, replacing any previous content under the same key.
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Delete an object.
    ///
    /// Returns `Err(StoreError::NotFound)` if the object does not exist.
    fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Check whether a bucket exists.
    fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    /// Create a bucket. Creating an existing bucket is a no-op.
    fn create_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Check whether an object exists.
    ///
    /// Default implementation reads the object. Backends may override with
    /// a cheaper metadata lookup.
    fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        match self.get_object(bucket, key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
