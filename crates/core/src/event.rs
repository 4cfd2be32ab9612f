//! Change events and their wire codec
//!
//! Every create/update/delete on the record store produces one immutable
//! [`ChangeEvent`] describing the delta: what kind of mutation, which
//! versions, which fields changed, and optionally the
//! [`IndexFilterSnapshot`] — the minimal before/after field projection a
//! downstream consumer needs to re-evaluate index inclusion without
//! re-reading the record.
//!
//! ## Wire format
//!
//! Events travel as a JSON object where field *presence* is meaningful:
//! an omitted key means default/empty. Binary payloads (schema ids, field
//! value bytes) are base64 strings. `decode(encode(x)) == x` holds for
//! every field, including the present-but-empty vs. absent distinction on
//! `indexFilterData.fields`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value as Json};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::id::SchemaId;

/// Kind of mutation an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    /// A record was created
    Create,
    /// A record was updated
    Update,
    /// A record was deleted
    Delete,
    /// A reindex of specific vtags was requested
    Index,
}

impl ChangeType {
    /// Wire name of this change type
    pub fn wire_name(&self) -> &'static str {
        match self {
            ChangeType::Create => "CREATE",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
            ChangeType::Index => "INDEX",
        }
    }

    /// Parse a wire name
    ///
    /// # Errors
    /// Returns an error for an unknown name.
    pub fn from_wire_name(name: &str) -> Result<Self> {
        match name {
            "CREATE" => Ok(ChangeType::Create),
            "UPDATE" => Ok(ChangeType::Update),
            "DELETE" => Ok(ChangeType::Delete),
            "INDEX" => Ok(ChangeType::Index),
            other => Err(Error::Serialization(format!(
                "unexpected change type `{other}`"
            ))),
        }
    }
}

/// One changed field inside an [`IndexFilterSnapshot`]
///
/// Carries the raw serialized bytes of whichever sides are present. A
/// change is recorded only when the serialized old value differs in
/// presence or content from the new value; both sides absent is never
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// The field that changed
    pub field_id: SchemaId,
    /// Serialized value before the mutation, if the field existed
    pub old_value: Option<Vec<u8>>,
    /// Serialized value after the mutation, if the field exists
    pub new_value: Option<Vec<u8>>,
}

impl FieldChange {
    /// Create a field change
    pub fn new(field_id: SchemaId, old_value: Option<Vec<u8>>, new_value: Option<Vec<u8>>) -> Self {
        Self {
            field_id,
            old_value,
            new_value,
        }
    }
}

/// The minimal projection needed to re-evaluate index inclusion predicates
///
/// Contains the necessary information from both the old and the new record
/// state, so consumers know what matched before and what matches now —
/// enough to detect membership transitions (was-excluded → now-included
/// and the reverse) without a repository round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexFilterSnapshot {
    /// Whether a record existed before the mutation
    pub old_record_exists: bool,
    /// Whether a record exists after the mutation
    pub new_record_exists: bool,
    /// Record type before the mutation, when any filter depends on type
    pub old_record_type: Option<SchemaId>,
    /// Record type after the mutation, when any filter depends on type
    pub new_record_type: Option<SchemaId>,
    /// Changed filter-dependency fields; `None` when no field information
    /// was collected (distinct from collected-but-empty)
    pub field_changes: Option<Vec<FieldChange>>,
}

impl IndexFilterSnapshot {
    /// Record a changed field, creating the change list on first use
    pub fn add_field_change(
        &mut self,
        field_id: SchemaId,
        old_value: Option<Vec<u8>>,
        new_value: Option<Vec<u8>>,
    ) {
        self.field_changes
            .get_or_insert_with(Vec::new)
            .push(FieldChange::new(field_id, old_value, new_value));
    }
}

/// Immutable delta describing one mutation
///
/// Invariants, enforced by [`ChangeEvent::validate`]:
/// - `updated_fields` is empty for Delete events
/// - a Create event never carries `record_type_changed`
/// - `vtags_to_index` is only non-empty for Index events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Kind of mutation
    pub change_type: ChangeType,
    /// Version assigned by a create
    pub version_created: Option<u64>,
    /// Version assigned by an update
    pub version_updated: Option<u64>,
    /// Whether the record type reference changed as part of this event
    pub record_type_changed: bool,
    /// Fields added, changed or deleted by this mutation
    pub updated_fields: BTreeSet<SchemaId>,
    /// For Index events: the vtags to reindex
    pub vtags_to_index: BTreeSet<SchemaId>,
    /// Opaque pass-through metadata from the record's transient attributes
    pub attributes: BTreeMap<String, String>,
    /// Snapshot for index-filter re-evaluation, when indexing is configured
    pub index_filter_data: Option<IndexFilterSnapshot>,
}

impl ChangeEvent {
    /// Create an event of the given type with everything else empty
    pub fn new(change_type: ChangeType) -> Self {
        Self {
            change_type,
            version_created: None,
            version_updated: None,
            record_type_changed: false,
            updated_fields: BTreeSet::new(),
            vtags_to_index: BTreeSet::new(),
            attributes: BTreeMap::new(),
            index_filter_data: None,
        }
    }

    /// Check the structural invariants of this event
    ///
    /// # Errors
    /// Returns [`Error::Serialization`] describing the violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.change_type == ChangeType::Delete && !self.updated_fields.is_empty() {
            return Err(Error::Serialization(
                "a DELETE event cannot carry updated fields".into(),
            ));
        }
        if self.change_type == ChangeType::Create && self.record_type_changed {
            return Err(Error::Serialization(
                "a CREATE event cannot carry a record type change".into(),
            ));
        }
        if self.change_type != ChangeType::Index && !self.vtags_to_index.is_empty() {
            return Err(Error::Serialization(
                "only an INDEX event can carry vtags to index".into(),
            ));
        }
        Ok(())
    }

    /// Encode to the JSON wire form
    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        obj.insert("type".into(), json!(self.change_type.wire_name()));

        if let Some(v) = self.version_updated {
            obj.insert("versionUpdated".into(), json!(v));
        }
        if let Some(v) = self.version_created {
            obj.insert("versionCreated".into(), json!(v));
        }
        if self.record_type_changed {
            obj.insert("recordTypeChanged".into(), json!(true));
        }
        if !self.updated_fields.is_empty() {
            obj.insert("updatedFields".into(), encode_id_array(&self.updated_fields));
        }
        if !self.vtags_to_index.is_empty() {
            obj.insert("vtagsToIndex".into(), encode_id_array(&self.vtags_to_index));
        }
        if !self.attributes.is_empty() {
            let attrs: Map<String, Json> = self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            obj.insert("attributes".into(), Json::Object(attrs));
        }
        if let Some(filter_data) = &self.index_filter_data {
            obj.insert("indexFilterData".into(), filter_data.to_json());
        }

        Json::Object(obj)
    }

    /// Encode to wire bytes (UTF-8 JSON)
    ///
    /// # Errors
    /// Returns an error if JSON serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_json())?)
    }

    /// Decode from the JSON wire form
    ///
    /// Unknown keys are ignored; the payload is expected to be
    /// well-formed, validation is minimal.
    ///
    /// # Errors
    /// Returns an error on a non-object payload, a missing or unknown
    /// `type`, or malformed binary fields.
    pub fn from_json(json: &Json) -> Result<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| Error::Serialization("change event is not a JSON object".into()))?;

        let type_name = obj
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| Error::Serialization("change event has no type".into()))?;
        let mut event = ChangeEvent::new(ChangeType::from_wire_name(type_name)?);

        if let Some(v) = obj.get("versionUpdated") {
            event.version_updated = Some(decode_u64(v, "versionUpdated")?);
        }
        if let Some(v) = obj.get("versionCreated") {
            event.version_created = Some(decode_u64(v, "versionCreated")?);
        }
        if let Some(v) = obj.get("recordTypeChanged") {
            event.record_type_changed = v.as_bool().unwrap_or(false);
        }
        if let Some(v) = obj.get("updatedFields") {
            event.updated_fields = decode_id_array(v, "updatedFields")?;
        }
        if let Some(v) = obj.get("vtagsToIndex") {
            event.vtags_to_index = decode_id_array(v, "vtagsToIndex")?;
        }
        if let Some(v) = obj.get("attributes") {
            let attrs = v
                .as_object()
                .ok_or_else(|| Error::Serialization("attributes is not a JSON object".into()))?;
            for (k, v) in attrs {
                let s = v
                    .as_str()
                    .ok_or_else(|| Error::Serialization("attribute value is not a string".into()))?;
                event.attributes.insert(k.clone(), s.to_string());
            }
        }
        if let Some(v) = obj.get("indexFilterData") {
            event.index_filter_data = Some(IndexFilterSnapshot::from_json(v)?);
        }

        Ok(event)
    }

    /// Decode from wire bytes
    ///
    /// # Errors
    /// Returns an error on malformed JSON or a malformed event object.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let json: Json = serde_json::from_slice(bytes)?;
        Self::from_json(&json)
    }
}

impl IndexFilterSnapshot {
    /// Encode to the JSON wire form
    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        obj.insert("old".into(), json!(self.old_record_exists));
        obj.insert("new".into(), json!(self.new_record_exists));
        if let Some(id) = &self.new_record_type {
            obj.insert("newRecordType".into(), encode_bytes(id.as_bytes()));
        }
        if let Some(id) = &self.old_record_type {
            obj.insert("oldRecordType".into(), encode_bytes(id.as_bytes()));
        }
        if let Some(changes) = &self.field_changes {
            let fields: Vec<Json> = changes.iter().map(FieldChange::to_json).collect();
            obj.insert("fields".into(), Json::Array(fields));
        }
        Json::Object(obj)
    }

    /// Decode from the JSON wire form
    ///
    /// # Errors
    /// Returns an error on a non-object payload or malformed binary fields.
    pub fn from_json(json: &Json) -> Result<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| Error::Serialization("indexFilterData is not a JSON object".into()))?;

        let mut snapshot = IndexFilterSnapshot::default();
        if let Some(v) = obj.get("old") {
            snapshot.old_record_exists = v.as_bool().unwrap_or(false);
        }
        if let Some(v) = obj.get("new") {
            snapshot.new_record_exists = v.as_bool().unwrap_or(false);
        }
        if let Some(v) = obj.get("newRecordType") {
            snapshot.new_record_type = Some(decode_schema_id(v, "newRecordType")?);
        }
        if let Some(v) = obj.get("oldRecordType") {
            snapshot.old_record_type = Some(decode_schema_id(v, "oldRecordType")?);
        }
        if let Some(v) = obj.get("fields") {
            let arr = v
                .as_array()
                .ok_or_else(|| Error::Serialization("fields is not a JSON array".into()))?;
            let mut changes = Vec::with_capacity(arr.len());
            for item in arr {
                changes.push(FieldChange::from_json(item)?);
            }
            snapshot.field_changes = Some(changes);
        }
        Ok(snapshot)
    }
}

impl FieldChange {
    /// Encode to the JSON wire form
    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        obj.insert("id".into(), encode_bytes(self.field_id.as_bytes()));
        if let Some(old) = &self.old_value {
            obj.insert("old".into(), encode_bytes(old));
        }
        if let Some(new) = &self.new_value {
            obj.insert("new".into(), encode_bytes(new));
        }
        Json::Object(obj)
    }

    /// Decode from the JSON wire form
    ///
    /// # Errors
    /// Returns an error on a non-object payload, a missing id, or
    /// malformed binary fields.
    pub fn from_json(json: &Json) -> Result<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| Error::Serialization("field change is not a JSON object".into()))?;
        let id = obj
            .get("id")
            .ok_or_else(|| Error::Serialization("field change has no id".into()))?;
        Ok(FieldChange {
            field_id: decode_schema_id(id, "id")?,
            old_value: obj.get("old").map(|v| decode_binary(v, "old")).transpose()?,
            new_value: obj.get("new").map(|v| decode_binary(v, "new")).transpose()?,
        })
    }
}

fn encode_bytes(bytes: &[u8]) -> Json {
    json!(BASE64.encode(bytes))
}

fn encode_id_array(ids: &BTreeSet<SchemaId>) -> Json {
    Json::Array(ids.iter().map(|id| encode_bytes(id.as_bytes())).collect())
}

fn decode_binary(json: &Json, field: &str) -> Result<Vec<u8>> {
    let s = json
        .as_str()
        .ok_or_else(|| Error::Serialization(format!("{field} is not a base64 string")))?;
    BASE64
        .decode(s)
        .map_err(|e| Error::Serialization(format!("{field} is not valid base64: {e}")))
}

fn decode_schema_id(json: &Json, field: &str) -> Result<SchemaId> {
    SchemaId::from_slice(&decode_binary(json, field)?)
}

fn decode_u64(json: &Json, field: &str) -> Result<u64> {
    json.as_u64()
        .ok_or_else(|| Error::Serialization(format!("{field} is not an integer")))
}

fn decode_id_array(json: &Json, field: &str) -> Result<BTreeSet<SchemaId>> {
    let arr = json
        .as_array()
        .ok_or_else(|| Error::Serialization(format!("{field} is not a JSON array")))?;
    arr.iter().map(|v| decode_schema_id(v, field)).collect()
}
