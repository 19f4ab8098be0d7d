//! Fixtures shared by the unit tests.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use kstore_store::{InMemoryObjectStore, ObjectEntry, ObjectStore, StoreError, StoreResult};

fn append_entries<W: std::io::Write>(builder: &mut tar::Builder<W>, entries: &[(&str, &[u8])]) {
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
}

pub fn write_tar(path: &Path, entries: &[(&str, &[u8])]) {
    let mut builder = tar::Builder::new(File::create(path).unwrap());
    append_entries(&mut builder, entries);
    builder.finish().unwrap();
}

pub fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
    let encoder = flate2::write::GzEncoder::new(
        File::create(path).unwrap(),
        flate2::Compression::default(),
    );
    let mut builder = tar::Builder::new(encoder);
    append_entries(&mut builder, entries);
    builder.into_inner().unwrap().finish().unwrap();
}

/// In-memory store that fails selected operations.
pub struct FaultyStore {
    pub inner: InMemoryObjectStore,
    /// Keys whose `put_object` fails.
    pub fail_puts: Mutex<Vec<String>>,
    /// When set, every listing fails as if the backend were unreachable.
    pub fail_listing: Mutex<bool>,
}

impl FaultyStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            inner: InMemoryObjectStore::with_bucket(bucket),
            fail_puts: Mutex::new(Vec::new()),
            fail_listing: Mutex::new(false),
        }
    }

    pub fn fail_put(&self, key: &str) {
        self.fail_puts.lock().unwrap().push(key.to_string());
    }

    pub fn set_listing_down(&self, down: bool) {
        *self.fail_listing.lock().unwrap() = down;
    }
}

impl ObjectStore for FaultyStore {
    fn list_objects(&self, bucket: &str, prefix: &str, recursive: bool) -> StoreResult<Vec<ObjectEntry>> {
        if *self.fail_listing.lock().unwrap() {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.list_objects(bucket, prefix, recursive)
    }

    fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get_object(bucket, key)
    }

    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        if self.fail_puts.lock().unwrap().iter().any(|k| k == key) {
            return Err(StoreError::Unavailable(format!("write of {key} refused")));
        }
        self.inner.put_object(bucket, key, data)
    }

    fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.inner.remove_object(bucket, key)
    }

    fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        self.inner.bucket_exists(bucket)
    }

    fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.inner.create_bucket(bucket)
    }
}
