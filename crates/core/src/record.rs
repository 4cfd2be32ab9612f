//! The record model
//!
//! A record maps field-type ids to values, references a record type at a
//! specific type version, and carries a store-assigned version number.
//! Fields split into two scopes:
//!
//! - **Versioned**: history is retained per record version
//! - **NonVersioned**: only the latest value is retained
//!
//! The scope is declared on the field type, not on the record.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::id::{QName, RecordId, SchemaId};
use crate::value::{Value, ValueType};

/// Retention scope of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// History retained per record version
    Versioned,
    /// Only the latest value retained
    NonVersioned,
}

/// A field type: the schema-side description of one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    /// Id of this field type
    pub id: SchemaId,
    /// Qualified name of this field type
    pub name: QName,
    /// Declared value shape
    pub value_type: ValueType,
    /// Retention scope
    pub scope: Scope,
}

impl FieldType {
    /// Create a field type
    pub fn new(id: SchemaId, name: QName, value_type: ValueType, scope: Scope) -> Self {
        Self {
            id,
            name,
            value_type,
            scope,
        }
    }
}

/// One field entry of a record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTypeEntry {
    /// The field type this entry references
    pub field_type: SchemaId,
    /// Whether a record of this type must carry the field
    pub mandatory: bool,
}

impl FieldTypeEntry {
    /// Create an entry
    pub fn new(field_type: SchemaId, mandatory: bool) -> Self {
        Self {
            field_type,
            mandatory,
        }
    }
}

/// A record type at one type version
///
/// Record types are versioned independently of records; a record references
/// the (id, version) pair that was current when it was written, and
/// point-in-time reads resolve the reference that was active at the probed
/// record version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordType {
    /// Id of this record type
    pub id: SchemaId,
    /// Version of this record type definition
    pub version: u64,
    /// Field entries
    pub fields: Vec<FieldTypeEntry>,
}

impl RecordType {
    /// Create a record type
    pub fn new(id: SchemaId, version: u64, fields: Vec<FieldTypeEntry>) -> Self {
        Self {
            id,
            version,
            fields,
        }
    }

    /// Iterate the ids of mandatory fields
    pub fn mandatory_fields(&self) -> impl Iterator<Item = &SchemaId> {
        self.fields
            .iter()
            .filter(|e| e.mandatory)
            .map(|e| &e.field_type)
    }

    /// Whether the type declares the given field
    pub fn has_field(&self, id: &SchemaId) -> bool {
        self.fields.iter().any(|e| &e.field_type == id)
    }
}

/// A record: field values plus identity, type reference and version
///
/// A record instance doubles as the write argument (partial state: the
/// fields to set and the fields to delete) and the read result (resolved
/// state at one version). Attributes are transient pass-through metadata:
/// they are copied onto the change event of the mutation and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Record {
    /// Record id; assigned by the store on create when absent
    pub id: Option<RecordId>,
    /// Referenced record type: (type id, type version)
    pub record_type: Option<(SchemaId, u64)>,
    /// Store-assigned version; None before the first write
    pub version: Option<u64>,
    /// Field values by field-type id
    pub fields: BTreeMap<SchemaId, Value>,
    /// Fields to delete on update (tombstoned, distinguished from absence)
    pub fields_to_delete: BTreeSet<SchemaId>,
    /// Transient metadata propagated onto the change event
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    /// Create an empty record without id
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with the given id
    pub fn with_id(id: RecordId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Set the record type reference
    pub fn set_record_type(&mut self, id: SchemaId, version: u64) -> &mut Self {
        self.record_type = Some((id, version));
        self
    }

    /// Set a field value
    pub fn set_field(&mut self, id: SchemaId, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(id, value.into());
        self
    }

    /// Get a field value
    pub fn field(&self, id: &SchemaId) -> Option<&Value> {
        self.fields.get(id)
    }

    /// Whether the record carries the given field
    pub fn has_field(&self, id: &SchemaId) -> bool {
        self.fields.contains_key(id)
    }

    /// Mark a field for deletion on the next update
    pub fn delete_field(&mut self, id: SchemaId) -> &mut Self {
        self.fields_to_delete.insert(id);
        self
    }

    /// Set a transient attribute
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
