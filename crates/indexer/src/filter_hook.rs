//! The index-filter snapshot hook
//!
//! Registered as a record update hook at repository construction, this
//! captures onto every change event the [`IndexFilterSnapshot`]: old/new
//! existence, the record-type transition (only when some filter depends
//! on record type), and the serialized before/after bytes of every
//! filter-dependency field that changed. Downstream consumers use it to
//! decide index-membership transitions without re-reading the record.
//!
//! When no indexes are configured the hook leaves the event untouched.

use std::sync::Arc;

use vellum_core::error::Result;
use vellum_core::event::{ChangeEvent, IndexFilterSnapshot};
use vellum_core::id::SchemaId;
use vellum_core::record::Record;
use vellum_repository::{HookContext, RecordUpdateHook};

use crate::indexes_info::IndexesInfo;

/// Record update hook capturing index-filter snapshots
pub struct IndexFilterHook {
    indexes: Arc<IndexesInfo>,
}

impl IndexFilterHook {
    /// Create a hook over the precomputed dependency set
    pub fn new(indexes: Arc<IndexesInfo>) -> Self {
        Self { indexes }
    }

    /// Serialize one side of a field change
    fn side_bytes(record: &Record, field: &SchemaId) -> Result<Option<Vec<u8>>> {
        record.field(field).map(|v| v.to_bytes()).transpose()
    }

    /// Record a change when the sides differ and at least one is present
    fn add_if_changed(
        snapshot: &mut IndexFilterSnapshot,
        field: SchemaId,
        old_value: Option<Vec<u8>>,
        new_value: Option<Vec<u8>>,
    ) {
        if old_value.is_none() && new_value.is_none() {
            return;
        }
        if old_value == new_value {
            return;
        }
        snapshot.add_field_change(field, old_value, new_value);
    }
}

impl RecordUpdateHook for IndexFilterHook {
    fn before_create(
        &self,
        record: &Record,
        event: &mut ChangeEvent,
        _ctx: &HookContext<'_>,
    ) -> Result<()> {
        if !self.indexes.has_indexes() {
            return Ok(());
        }
        let mut snapshot = IndexFilterSnapshot {
            old_record_exists: false,
            new_record_exists: true,
            ..Default::default()
        };
        if self.indexes.depends_on_record_type() {
            snapshot.new_record_type = record.record_type.map(|(id, _)| id);
        }
        for field in self.indexes.field_dependencies() {
            let new_value = Self::side_bytes(record, field)?;
            Self::add_if_changed(&mut snapshot, *field, None, new_value);
        }
        event.index_filter_data = Some(snapshot);
        Ok(())
    }

    fn before_update(
        &self,
        record: &Record,
        original: &Record,
        event: &mut ChangeEvent,
        _ctx: &HookContext<'_>,
    ) -> Result<()> {
        if !self.indexes.has_indexes() {
            return Ok(());
        }
        let mut snapshot = IndexFilterSnapshot {
            old_record_exists: true,
            new_record_exists: true,
            ..Default::default()
        };
        if self.indexes.depends_on_record_type() {
            let old_type = original.record_type.map(|(id, _)| id);
            snapshot.old_record_type = old_type;
            // Specifying the type on an update is optional: absence means
            // the type is unchanged.
            snapshot.new_record_type = record.record_type.map(|(id, _)| id).or(old_type);
        }
        for field in self.indexes.field_dependencies() {
            let old_value = Self::side_bytes(original, field)?;
            // The after-state: a supplied value wins, a requested delete
            // removes, anything else keeps the original.
            let new_value = if record.has_field(field) {
                Self::side_bytes(record, field)?
            } else if record.fields_to_delete.contains(field) {
                None
            } else {
                old_value.clone()
            };
            Self::add_if_changed(&mut snapshot, *field, old_value, new_value);
        }
        event.index_filter_data = Some(snapshot);
        Ok(())
    }

    fn before_delete(
        &self,
        original: &Record,
        event: &mut ChangeEvent,
        _ctx: &HookContext<'_>,
    ) -> Result<()> {
        if !self.indexes.has_indexes() {
            return Ok(());
        }
        let mut snapshot = IndexFilterSnapshot {
            old_record_exists: true,
            new_record_exists: false,
            ..Default::default()
        };
        if self.indexes.depends_on_record_type() {
            snapshot.old_record_type = original.record_type.map(|(id, _)| id);
        }
        for field in self.indexes.field_dependencies() {
            let old_value = Self::side_bytes(original, field)?;
            Self::add_if_changed(&mut snapshot, *field, old_value, None);
        }
        event.index_filter_data = Some(snapshot);
        Ok(())
    }
}
