//! Cacheable object contract and the generic hydrated EAV object.

use crate::{compute_content_hash, ContentHash, ObjectId, SchemeId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marker trait for hydrated objects the object cache can hold.
///
/// # Implementation Requirements
///
/// - `object_id()` must be unique within a domain
/// - `content_hash()` returns `None` for objects that were never hashed;
///   such objects are never cached
/// - `scheme_id()` identifies the object's type definition
pub trait CacheableObject: Send + Sync + 'static {
    /// Get the unique identifier for this object.
    fn object_id(&self) -> ObjectId;

    /// Get the content hash used for staleness checks.
    fn content_hash(&self) -> Option<ContentHash>;

    /// Get the scheme this object is an instance of.
    fn scheme_id(&self) -> SchemeId;
}

/// A hydrated object in its generic attribute/value form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EavObject {
    pub id: ObjectId,
    pub scheme_id: SchemeId,
    pub parent_id: Option<ObjectId>,
    pub name: String,
    pub hash: Option<ContentHash>,
    pub date_created: Timestamp,
    pub date_modified: Timestamp,
    pub values: BTreeMap<String, serde_json::Value>,
}

impl EavObject {
    /// Create an object without values. The hash is left unset.
    pub fn new(id: ObjectId, scheme_id: SchemeId, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            scheme_id,
            parent_id: None,
            name: name.into(),
            hash: None,
            date_created: now,
            date_modified: now,
            values: BTreeMap::new(),
        }
    }

    /// Set an attribute value.
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Hash the name and values and store the result.
    ///
    /// `values` is ordered, so equal content always yields an equal hash.
    pub fn rehash(&mut self) -> ContentHash {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(self.name.as_bytes());
        for (key, value) in &self.values {
            buf.push(0);
            buf.extend_from_slice(key.as_bytes());
            buf.push(b'=');
            buf.extend_from_slice(value.to_string().as_bytes());
        }
        let hash = compute_content_hash(&buf);
        self.hash = Some(hash);
        hash
    }

    /// Builder form of [`EavObject::rehash`].
    pub fn hashed(mut self) -> Self {
        self.rehash();
        self
    }
}

impl CacheableObject for EavObject {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn content_hash(&self) -> Option<ContentHash> {
        self.hash
    }

    fn scheme_id(&self) -> SchemeId {
        self.scheme_id
    }
}
