use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::object::{build_listing, ObjectEntry};
use crate::traits::ObjectStore;

type Bucket = BTreeMap<String, Vec<u8>>;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Buckets are held in memory behind a
/// `RwLock` for safe concurrent access. Object bytes are cloned on read and
/// write.
pub struct InMemoryObjectStore {
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl InMemoryObjectStore {
    /// Create a new store without any buckets.
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new store with one empty bucket.
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        store
            .buckets
            .write()
            .expect("lock poisoned")
            .insert(bucket.to_string(), Bucket::new());
        store
    }

    /// Number of objects currently stored in `bucket`.
    pub fn len(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .map_or(0, |b| b.len())
    }

    /// Returns `true` if `bucket` holds no objects or does not exist.
    pub fn is_empty(&self, bucket: &str) -> bool {
        self.len(bucket) == 0
    }

    /// Return the sorted keys stored in `bucket`.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> StoreResult<Vec<ObjectEntry>> {
        let map = self.buckets.read().expect("lock poisoned");
        let objects = map
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        let entries = objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| (key.as_str(), data.len() as u64));
        Ok(build_listing(entries, prefix, recursive))
    }

    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let map = self.buckets.read().expect("lock poisoned");
        let objects = map
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }

    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key must not be empty".into(),
            });
        }
        let mut map = self.buckets.write().expect("lock poisoned");
        let objects = map
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let mut map = self.buckets.write().expect("lock poisoned");
        let objects = map
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }

    fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self
            .buckets
            .read()
            .expect("lock poisoned")
            .contains_key(bucket))
    }

    fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.buckets
            .write()
            .expect("lock poisoned")
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        let map = self.buckets.read().expect("lock poisoned");
        let objects = map
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        Ok(objects.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.buckets.read().expect("lock poisoned");
        let count: usize = map.values().map(|b| b.len()).sum();
        f.debug_struct("InMemoryObjectStore")
            .field("bucket_count", &map.len())
            .field("object_count", &count)
            .finish()
    }
}
