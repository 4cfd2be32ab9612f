//! Identifiers for the Vellum record store
//!
//! This module defines:
//! - SchemaId: opaque 16-byte id for field types, record types and vtags
//! - QName: namespaced name of a field type
//! - RecordId: record identifier with optional variant properties
//! - Link: a reference from one record to another, possibly relative
//!
//! A RecordId consists of a master id plus an ordered set of variant
//! properties. A record carrying variant properties is a named variant of
//! the base entity identified by the master id alone.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque identifier for schema objects (field types, record types, vtags)
///
/// A SchemaId is a wrapper around a UUID v4. Schema ids are carried in
/// change events as raw bytes, so the byte representation is part of the
/// wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(Uuid);

impl SchemaId {
    /// Create a new random SchemaId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SchemaId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Create a SchemaId from a byte slice
    ///
    /// # Errors
    /// Returns an error if the slice is not exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| Error::Serialization(format!("schema id must be 16 bytes, got {}", bytes.len())))?;
        Ok(Self(Uuid::from_bytes(arr)))
    }

    /// Get the raw bytes of this SchemaId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for SchemaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespaced name of a field type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    /// Namespace of the name
    pub namespace: String,
    /// Local part of the name
    pub name: String,
}

impl QName {
    /// Create a new qualified name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Identifier of a record: a master id plus optional variant properties
///
/// The textual and byte form is `master` for a non-variant id and
/// `master!k=v,k=v` for a variant id, with variant properties ordered by
/// key. Master ids and variant properties may not contain the `!`, `,` or
/// `=` separator characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    master: String,
    variant: BTreeMap<String, String>,
}

impl RecordId {
    /// Create a non-variant record id
    pub fn new(master: impl Into<String>) -> Self {
        Self {
            master: master.into(),
            variant: BTreeMap::new(),
        }
    }

    /// Create a variant record id
    pub fn with_variant(master: impl Into<String>, variant: BTreeMap<String, String>) -> Self {
        Self {
            master: master.into(),
            variant,
        }
    }

    /// The master id part
    pub fn master(&self) -> &str {
        &self.master
    }

    /// The variant properties (empty for a non-variant id)
    pub fn variant_properties(&self) -> &BTreeMap<String, String> {
        &self.variant
    }

    /// Whether this id carries variant properties
    pub fn is_variant(&self) -> bool {
        !self.variant.is_empty()
    }

    /// The id of the master record, if this id is a variant
    ///
    /// Returns None for a non-variant id: such an id *is* its own master.
    pub fn master_record_id(&self) -> Option<RecordId> {
        if self.variant.is_empty() {
            None
        } else {
            Some(RecordId::new(self.master.clone()))
        }
    }

    /// Byte representation, used as the row key in the cell store
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parse a record id back from its byte representation
    ///
    /// # Errors
    /// Returns an error on malformed input (bad UTF-8, malformed variant
    /// property list).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::Serialization("record id is not valid UTF-8".into()))?;
        match s.split_once('!') {
            None => Ok(RecordId::new(s)),
            Some((master, props)) => {
                let mut variant = BTreeMap::new();
                for pair in props.split(',') {
                    let (k, v) = pair.split_once('=').ok_or_else(|| {
                        Error::Serialization(format!("malformed variant property `{pair}` in record id"))
                    })?;
                    variant.insert(k.to_string(), v.to_string());
                }
                Ok(RecordId::with_variant(master, variant))
            }
        }
    }
}

// Display writes `master` or `master!k=v,k=v` with properties in key order.
impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.master)?;
        let mut first = true;
        for (k, v) in &self.variant {
            if first {
                write!(f, "!{}={}", k, v)?;
                first = false;
            } else {
                write!(f, ",{}={}", k, v)?;
            }
        }
        Ok(())
    }
}

/// A link value pointing at another record
///
/// Links may be relative: a link without an explicit master id inherits the
/// master id of the record it occurs in, and the link's own variant
/// properties override the context's. Resolution is always performed
/// against the *top-level* containing record id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    master: Option<String>,
    variant: BTreeMap<String, String>,
}

impl Link {
    /// An absolute link to the given master id
    pub fn to(master: impl Into<String>) -> Self {
        Self {
            master: Some(master.into()),
            variant: BTreeMap::new(),
        }
    }

    /// An absolute link to the given record id
    pub fn to_record(id: &RecordId) -> Self {
        Self {
            master: Some(id.master().to_string()),
            variant: id.variant_properties().clone(),
        }
    }

    /// A relative link: the master id is taken from the containing record
    pub fn relative() -> Self {
        Self {
            master: None,
            variant: BTreeMap::new(),
        }
    }

    /// Add a variant property to the link target
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variant.insert(key.into(), value.into());
        self
    }

    /// Resolve this link against the id of the containing record
    pub fn resolve(&self, context: &RecordId) -> RecordId {
        let master = self
            .master
            .clone()
            .unwrap_or_else(|| context.master().to_string());
        if self.variant.is_empty() {
            RecordId::new(master)
        } else {
            RecordId::with_variant(master, self.variant.clone())
        }
    }
}

/// Generator of fresh record ids, supplied to the record store at
/// construction time
pub trait IdGenerator: Send + Sync {
    /// Produce a new, unique, non-variant record id
    fn new_record_id(&self) -> RecordId;
}

/// Default id generator backed by UUID v4
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn new_record_id(&self) -> RecordId {
        RecordId::new(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_id_bytes_roundtrip() {
        let id = SchemaId::new();
        let restored = SchemaId::from_slice(id.as_bytes()).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn test_schema_id_from_slice_rejects_bad_length() {
        assert!(SchemaId::from_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_record_id_roundtrip_plain() {
        let id = RecordId::new("doc-42");
        let restored = RecordId::from_bytes(&id.to_bytes()).unwrap();
        assert_eq!(id, restored);
        assert!(id.master_record_id().is_none());
    }

    #[test]
    fn test_record_id_roundtrip_variant() {
        let mut props = BTreeMap::new();
        props.insert("lang".to_string(), "nl".to_string());
        props.insert("branch".to_string(), "live".to_string());
        let id = RecordId::with_variant("doc-42", props);
        let restored = RecordId::from_bytes(&id.to_bytes()).unwrap();
        assert_eq!(id, restored);
        assert_eq!(
            id.master_record_id().unwrap(),
            RecordId::new("doc-42"),
        );
    }

    #[test]
    fn test_record_id_display_orders_properties() {
        let mut props = BTreeMap::new();
        props.insert("b".to_string(), "2".to_string());
        props.insert("a".to_string(), "1".to_string());
        let id = RecordId::with_variant("m", props);
        assert_eq!(id.to_string(), "m!a=1,b=2");
    }

    #[test]
    fn test_record_id_rejects_malformed_variant() {
        assert!(RecordId::from_bytes(b"m!notapair").is_err());
    }

    #[test]
    fn test_link_resolution_relative() {
        let ctx = RecordId::new("doc-1");
        let link = Link::relative().with_property("lang", "fr");
        let target = link.resolve(&ctx);
        assert_eq!(target.master(), "doc-1");
        assert_eq!(target.variant_properties().get("lang").unwrap(), "fr");
    }

    #[test]
    fn test_link_resolution_absolute() {
        let ctx = RecordId::new("doc-1");
        let link = Link::to("doc-2");
        assert_eq!(link.resolve(&ctx), RecordId::new("doc-2"));
    }
}
