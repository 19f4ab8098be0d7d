use std::collections::BTreeMap;

/// One entry of a bucket listing.
///
/// Recursive listings only contain real objects. Non-recursive listings also
/// contain prefix entries (`is_prefix == true`) standing in for every deeper
/// key below the next `/`, the way S3 reports common prefixes. A prefix
/// entry's key always ends with `/` and its size is zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub is_prefix: bool,
}

impl ObjectEntry {
    pub fn object(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            is_prefix: false,
        }
    }

    pub fn prefix(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: 0,
            is_prefix: true,
        }
    }
}

/// Build a listing from `(key, size)` pairs.
///
/// Keys not starting with `prefix` are ignored. The result is sorted by key
/// and holds each prefix entry once. Shared by every backend so they agree
/// on listing semantics.
pub fn build_listing<'a, I>(objects: I, prefix: &str, recursive: bool) -> Vec<ObjectEntry>
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut entries: BTreeMap<String, ObjectEntry> = BTreeMap::new();
    for (key, size) in objects {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        match rest.find('/') {
            Some(idx) if !recursive => {
                let dir = format!("{prefix}{}", &rest[..=idx]);
                entries
                    .entry(dir.clone())
                    .or_insert_with(|| ObjectEntry::prefix(dir));
            }
            _ => {
                entries.insert(key.to_string(), ObjectEntry::object(key, size));
            }
        }
    }
    entries.into_values().collect()
}
