//! Schema collaboration
//!
//! The record store does not own the schema; it consumes it through the
//! [`SchemaRegistry`] trait. Record-type lookups have point-in-time
//! semantics: probing at version V resolves the definition with the
//! greatest version <= V, expressed here as an explicit query on
//! [`VersionMap`] rather than a nearest-match approximation.
//!
//! [`MemorySchemaRegistry`] is the in-process implementation used for
//! embedding and tests.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::id::{QName, SchemaId};
use crate::record::{FieldType, RecordType};

/// Ordered map keyed by version number with a point-in-time query
///
/// `entry_at(probe)` returns the value stored at the greatest key <= probe.
/// This governs which schema interprets old field bytes, so the exact
/// lookup rule matters: a probe below the first key resolves to nothing,
/// never to the nearest entry above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMap<V> {
    entries: BTreeMap<u64, V>,
}

impl<V> Default for VersionMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> VersionMap<V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert a value at a version, replacing any previous value there
    pub fn insert(&mut self, version: u64, value: V) {
        self.entries.insert(version, value);
    }

    /// The value active at `probe`: greatest key <= probe
    pub fn entry_at(&self, probe: u64) -> Option<(u64, &V)> {
        self.entries
            .range(..=probe)
            .next_back()
            .map(|(k, v)| (*k, v))
    }

    /// The entry with the highest version
    pub fn latest(&self) -> Option<(u64, &V)> {
        self.entries.iter().next_back().map(|(k, v)| (*k, v))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Schema lookups consumed by the record store and the indexing layer
///
/// Thread safety: implementations must be safe to share across threads.
pub trait SchemaRegistry: Send + Sync {
    /// Resolve a field type by id
    ///
    /// # Errors
    /// Returns [`Error::FieldTypeNotFound`] when the id is unknown.
    fn field_type_by_id(&self, id: &SchemaId) -> Result<FieldType>;

    /// Resolve a field type by qualified name
    ///
    /// # Errors
    /// Returns [`Error::FieldTypeNotFound`] when the name is unknown.
    fn field_type_by_name(&self, name: &QName) -> Result<FieldType>;

    /// Resolve a record type at a point in time
    ///
    /// With `version = Some(v)`, resolves the definition with the greatest
    /// type version <= v; with `None`, the latest definition.
    ///
    /// # Errors
    /// Returns [`Error::RecordTypeNotFound`] when the id is unknown or no
    /// definition exists at or below the probed version.
    fn record_type(&self, id: &SchemaId, version: Option<u64>) -> Result<RecordType>;
}

#[derive(Default)]
struct RegistryInner {
    field_types: HashMap<SchemaId, FieldType>,
    field_types_by_name: HashMap<QName, SchemaId>,
    record_types: HashMap<SchemaId, VersionMap<RecordType>>,
}

/// In-memory schema registry
///
/// Registration is last-wins per id (and per record-type version).
#[derive(Default)]
pub struct MemorySchemaRegistry {
    inner: RwLock<RegistryInner>,
}

impl MemorySchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field type
    pub fn register_field_type(&self, field_type: FieldType) {
        let mut inner = self.inner.write();
        inner
            .field_types_by_name
            .insert(field_type.name.clone(), field_type.id);
        inner.field_types.insert(field_type.id, field_type);
    }

    /// Register a record type definition at its version
    pub fn register_record_type(&self, record_type: RecordType) {
        let mut inner = self.inner.write();
        inner
            .record_types
            .entry(record_type.id)
            .or_default()
            .insert(record_type.version, record_type);
    }
}

impl SchemaRegistry for MemorySchemaRegistry {
    fn field_type_by_id(&self, id: &SchemaId) -> Result<FieldType> {
        self.inner
            .read()
            .field_types
            .get(id)
            .cloned()
            .ok_or_else(|| Error::FieldTypeNotFound(id.to_string()))
    }

    fn field_type_by_name(&self, name: &QName) -> Result<FieldType> {
        let inner = self.inner.read();
        inner
            .field_types_by_name
            .get(name)
            .and_then(|id| inner.field_types.get(id))
            .cloned()
            .ok_or_else(|| Error::FieldTypeNotFound(name.to_string()))
    }

    fn record_type(&self, id: &SchemaId, version: Option<u64>) -> Result<RecordType> {
        let inner = self.inner.read();
        let versions = inner
            .record_types
            .get(id)
            .ok_or(Error::RecordTypeNotFound(*id))?;
        let entry = match version {
            Some(v) => versions.entry_at(v),
            None => versions.latest(),
        };
        entry
            .map(|(_, rt)| rt.clone())
            .ok_or(Error::RecordTypeNotFound(*id))
    }
}
