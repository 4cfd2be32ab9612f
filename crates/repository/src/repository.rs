//! Record CRUD over the cell substrate
//!
//! Version assignment: create writes version 1; every successful update
//! writes `current + 1`, so the versions of one record form a contiguous
//! sequence starting at 1. The record-type reference is written at every
//! version, and point-in-time reads resolve both the type reference and
//! each versioned field through a greatest-version-at-or-below lookup.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use vellum_core::error::{Error, Result};
use vellum_core::event::{ChangeEvent, ChangeType};
use vellum_core::id::{IdGenerator, RecordId, SchemaId, UuidIdGenerator};
use vellum_core::record::{Record, RecordType, Scope};
use vellum_core::schema::SchemaRegistry;
use vellum_core::value::Value;
use vellum_rowlock::RowLocker;
use vellum_rowlog::{ProcessorNotifier, RowLog};
use vellum_storage::{CellStore, RowSnapshot, RowWrite};

use crate::columns;
use crate::encoding;
use crate::factory::{DefaultRecordFactory, RecordFactory};
use crate::hooks::{HookContext, RecordUpdateHook};

/// The versioned record store
pub struct Repository<C: CellStore> {
    store: Arc<C>,
    schema: Arc<dyn SchemaRegistry>,
    row_log: Arc<dyn RowLog>,
    notifier: Option<Arc<ProcessorNotifier>>,
    id_generator: Arc<dyn IdGenerator>,
    factory: Arc<dyn RecordFactory>,
    hooks: Vec<Arc<dyn RecordUpdateHook>>,
}

/// Builder for [`Repository`]
pub struct RepositoryBuilder<C: CellStore> {
    store: Arc<C>,
    schema: Arc<dyn SchemaRegistry>,
    row_log: Arc<dyn RowLog>,
    notifier: Option<Arc<ProcessorNotifier>>,
    id_generator: Arc<dyn IdGenerator>,
    factory: Arc<dyn RecordFactory>,
    hooks: Vec<Arc<dyn RecordUpdateHook>>,
}

impl<C: CellStore> RepositoryBuilder<C> {
    /// Start a builder over the required collaborators
    pub fn new(store: Arc<C>, schema: Arc<dyn SchemaRegistry>, row_log: Arc<dyn RowLog>) -> Self {
        Self {
            store,
            schema,
            row_log,
            notifier: None,
            id_generator: Arc::new(UuidIdGenerator),
            factory: Arc::new(DefaultRecordFactory),
            hooks: Vec::new(),
        }
    }

    /// Attach a debounced processor notifier
    pub fn notifier(mut self, notifier: Arc<ProcessorNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Override the record id generator
    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// Override the record factory
    pub fn record_factory(mut self, factory: Arc<dyn RecordFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Register an update hook; hooks run in registration order
    pub fn hook(mut self, hook: Arc<dyn RecordUpdateHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Finish the builder
    pub fn build(self) -> Repository<C> {
        Repository {
            store: self.store,
            schema: self.schema,
            row_log: self.row_log,
            notifier: self.notifier,
            id_generator: self.id_generator,
            factory: self.factory,
            hooks: self.hooks,
        }
    }
}

impl<C: CellStore> Repository<C> {
    /// Start building a repository
    pub fn builder(
        store: Arc<C>,
        schema: Arc<dyn SchemaRegistry>,
        row_log: Arc<dyn RowLog>,
    ) -> RepositoryBuilder<C> {
        RepositoryBuilder::new(store, schema, row_log)
    }

    /// The schema registry this repository resolves types through
    pub fn schema(&self) -> &Arc<dyn SchemaRegistry> {
        &self.schema
    }

    /// A fresh record from the configured factory
    pub fn new_record(&self, id: Option<RecordId>) -> Record {
        self.factory.new_record(id)
    }

    /// A row locker over this repository's lock cell
    ///
    /// Plain creates/updates are not serialized through the lock; callers
    /// needing strict mutual exclusion lock first and use the locker's
    /// lease-guarded write variants.
    pub fn row_locker(&self, lease_timeout: Duration) -> RowLocker<C> {
        RowLocker::new(
            Arc::clone(&self.store),
            columns::lock_column(),
            lease_timeout,
        )
    }

    /// Create a record at version 1
    ///
    /// The write itself is a single atomic row operation, but the
    /// existence checks are not covered by a row lock: two racing creates
    /// for the same id are not serialized here (callers wrap creates with
    /// the row locker when they need that guarantee).
    ///
    /// # Errors
    /// [`Error::InvalidRecord`] on an empty field set or missing record
    /// type, [`Error::RecordExists`] when the row exists,
    /// [`Error::RecordNotFound`] when a variant id's master record is
    /// absent.
    pub fn create(&self, record: Record) -> Result<Record> {
        let mut record = record;
        if record.fields.is_empty() {
            return Err(Error::InvalidRecord(
                "creating an empty record is not allowed".into(),
            ));
        }

        let id = match record.id.clone() {
            Some(id) => id,
            None => {
                let id = self.id_generator.new_record_id();
                record.id = Some(id.clone());
                id
            }
        };
        if let Some(master) = id.master_record_id() {
            if !self.store.row_exists(&master.to_bytes())? {
                return Err(Error::RecordNotFound(master));
            }
        }
        let row_key = id.to_bytes();
        if self.store.row_exists(&row_key)? {
            return Err(Error::RecordExists(id));
        }

        let (rt_id, rt_version) = record
            .record_type
            .ok_or_else(|| Error::InvalidRecord("record carries no record type".into()))?;
        let record_type = self.schema.record_type(&rt_id, Some(rt_version))?;
        self.check_mandatory_fields(&record_type, &record.fields, &BTreeSet::new())?;

        let mut event = ChangeEvent::new(ChangeType::Create);
        event.version_created = Some(1);
        event.updated_fields = record.fields.keys().copied().collect();
        event.attributes = record.attributes.clone();

        let ctx = HookContext {
            schema: self.schema.as_ref(),
        };
        for hook in &self.hooks {
            hook.before_create(&record, &mut event, &ctx)?;
        }

        let write = self.build_write(&record.fields, &BTreeSet::new(), 1, rt_id, rt_version)?;
        self.store.write(&row_key, write)?;
        record.version = Some(1);

        self.publish(&row_key, &event)?;
        Ok(record)
    }

    /// Read a record, optionally at a specific version or restricted to a
    /// field projection
    ///
    /// # Errors
    /// [`Error::RecordNotFound`] when the row is absent or the requested
    /// version exceeds the record's current version.
    pub fn read(
        &self,
        id: &RecordId,
        version: Option<u64>,
        field_ids: Option<&[SchemaId]>,
    ) -> Result<Record> {
        let row_key = id.to_bytes();
        let snapshot = self
            .store
            .read_row(&row_key)?
            .ok_or_else(|| Error::RecordNotFound(id.clone()))?;
        let current = self.current_version(&snapshot, id)?;
        if let Some(v) = version {
            if v == 0 || v > current {
                return Err(Error::RecordNotFound(id.clone()));
            }
        }
        let effective = version.unwrap_or(current);
        self.record_from_snapshot(id, &snapshot, effective, field_ids)
    }

    /// Read the latest version with all fields
    ///
    /// # Errors
    /// See [`Repository::read`].
    pub fn read_latest(&self, id: &RecordId) -> Result<Record> {
        self.read(id, None, None)
    }

    /// Update a record, assigning version `current + 1`
    ///
    /// Only fields whose value actually differs from the stored state are
    /// written and reported in the event's updated-field set; deletes
    /// write a tombstone marker so point-in-time reads see the deletion.
    ///
    /// # Errors
    /// [`Error::RecordNotFound`] when the record is absent,
    /// [`Error::InvalidRecord`] when neither fields nor field deletes are
    /// supplied (or a mandatory field would disappear).
    pub fn update(&self, record: Record) -> Result<Record> {
        let mut record = record;
        let id = record
            .id
            .clone()
            .ok_or_else(|| Error::InvalidRecord("update requires a record id".into()))?;
        let row_key = id.to_bytes();
        let snapshot = self
            .store
            .read_row(&row_key)?
            .ok_or_else(|| Error::RecordNotFound(id.clone()))?;
        if record.fields.is_empty() && record.fields_to_delete.is_empty() {
            return Err(Error::InvalidRecord("no fields to update or delete".into()));
        }

        let current = self.current_version(&snapshot, &id)?;
        let new_version = current + 1;
        let original = self.record_from_snapshot(&id, &snapshot, current, None)?;
        let (original_rt_id, original_rt_version) = original
            .record_type
            .ok_or_else(|| Error::Storage(format!("record {id} has no record type cells")))?;

        let (rt_id, rt_version) = record
            .record_type
            .unwrap_or((original_rt_id, original_rt_version));
        record.record_type = Some((rt_id, rt_version));
        let record_type = self.schema.record_type(&rt_id, Some(rt_version))?;

        // The delta: supplied fields that actually differ, plus supplied
        // deletes that actually hit an existing field.
        let mut changed: BTreeMap<SchemaId, Value> = BTreeMap::new();
        for (field_id, value) in &record.fields {
            if original.field(field_id) != Some(value) {
                changed.insert(*field_id, value.clone());
            }
        }
        let deleted: BTreeSet<SchemaId> = record
            .fields_to_delete
            .iter()
            .copied()
            .filter(|f| original.has_field(f))
            .collect();

        self.check_mandatory_after_update(&record_type, &record, &original)?;

        let mut event = ChangeEvent::new(ChangeType::Update);
        event.version_updated = Some(new_version);
        event.record_type_changed = rt_id != original_rt_id;
        event.updated_fields = changed.keys().chain(deleted.iter()).copied().collect();
        event.attributes = record.attributes.clone();

        let ctx = HookContext {
            schema: self.schema.as_ref(),
        };
        for hook in &self.hooks {
            hook.before_update(&record, &original, &mut event, &ctx)?;
        }

        let write = self.build_write(&changed, &deleted, new_version, rt_id, rt_version)?;
        self.store.write(&row_key, write)?;
        record.version = Some(new_version);

        self.publish(&row_key, &event)?;
        Ok(record)
    }

    /// Delete a record: unconditional row removal, no tombstone retained
    ///
    /// # Errors
    /// [`Error::RecordNotFound`] when the record is absent.
    pub fn delete(&self, id: &RecordId) -> Result<()> {
        let row_key = id.to_bytes();
        let snapshot = self
            .store
            .read_row(&row_key)?
            .ok_or_else(|| Error::RecordNotFound(id.clone()))?;
        let current = self.current_version(&snapshot, id)?;
        let original = self.record_from_snapshot(id, &snapshot, current, None)?;

        let mut event = ChangeEvent::new(ChangeType::Delete);
        let ctx = HookContext {
            schema: self.schema.as_ref(),
        };
        for hook in &self.hooks {
            hook.before_delete(&original, &mut event, &ctx)?;
        }

        self.store.delete_row(&row_key)?;
        self.publish(&row_key, &event)?;
        Ok(())
    }

    /// Request a reindex of the given vtags for an existing record
    ///
    /// Appends an Index-type event carrying the vtag set; no record state
    /// changes.
    ///
    /// # Errors
    /// [`Error::RecordNotFound`] when the record is absent.
    pub fn trigger_index(&self, id: &RecordId, vtags: BTreeSet<SchemaId>) -> Result<()> {
        let row_key = id.to_bytes();
        if !self.store.row_exists(&row_key)? {
            return Err(Error::RecordNotFound(id.clone()));
        }
        let mut event = ChangeEvent::new(ChangeType::Index);
        event.vtags_to_index = vtags;
        self.publish(&row_key, &event)
    }

    fn publish(&self, row_key: &[u8], event: &ChangeEvent) -> Result<()> {
        event.validate()?;
        self.row_log.append(row_key, event.to_json_bytes()?)?;
        if let Some(notifier) = &self.notifier {
            notifier.notify(self.row_log.id());
        }
        Ok(())
    }

    fn current_version(&self, snapshot: &RowSnapshot, id: &RecordId) -> Result<u64> {
        let cell = snapshot
            .latest(&columns::version_column())
            .ok_or_else(|| Error::Storage(format!("record {id} has no version cell")))?;
        encoding::decode_version(cell)
    }

    fn record_from_snapshot(
        &self,
        id: &RecordId,
        snapshot: &RowSnapshot,
        effective: u64,
        field_ids: Option<&[SchemaId]>,
    ) -> Result<Record> {
        let mut record = self.factory.new_record(Some(id.clone()));
        record.version = Some(effective);

        // The record-type reference active at the probed version: the
        // greatest stored version at or below it.
        let rt_id = snapshot
            .at_version(&columns::record_type_id_column(), effective)
            .map(SchemaId::from_slice)
            .transpose()?;
        let rt_version = snapshot
            .at_version(&columns::record_type_version_column(), effective)
            .map(encoding::decode_version)
            .transpose()?;
        if let (Some(rt_id), Some(rt_version)) = (rt_id, rt_version) {
            record.record_type = Some((rt_id, rt_version));
        }

        for (column, _) in snapshot.family_columns(columns::FAMILY_FIELDS_VERSIONED) {
            let Some(cell) = snapshot.at_version(column, effective) else {
                continue;
            };
            self.decode_field_into(&mut record, &column.qualifier, cell, field_ids)?;
        }
        for (column, _) in snapshot.family_columns(columns::FAMILY_FIELDS) {
            let Some(cell) = snapshot.latest(column) else {
                continue;
            };
            self.decode_field_into(&mut record, &column.qualifier, cell, field_ids)?;
        }

        Ok(record)
    }

    fn decode_field_into(
        &self,
        record: &mut Record,
        qualifier: &[u8],
        cell: &[u8],
        field_ids: Option<&[SchemaId]>,
    ) -> Result<()> {
        let field_id = SchemaId::from_slice(qualifier)?;
        if let Some(wanted) = field_ids {
            if !wanted.contains(&field_id) {
                return Ok(());
            }
        }
        let Some(value_bytes) = encoding::decode_marked(cell)? else {
            return Ok(());
        };
        // A field whose type is gone from the schema is skipped, not
        // fatal: the schema may have evolved past stored data.
        match self.schema.field_type_by_id(&field_id) {
            Ok(_) => {}
            Err(Error::FieldTypeNotFound(reference)) => {
                debug!(field = %reference, "skipping field with unresolvable type");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        record.fields.insert(field_id, Value::from_bytes(value_bytes)?);
        Ok(())
    }

    fn build_write(
        &self,
        fields: &BTreeMap<SchemaId, Value>,
        deletes: &BTreeSet<SchemaId>,
        version: u64,
        rt_id: SchemaId,
        rt_version: u64,
    ) -> Result<RowWrite> {
        let mut write = RowWrite::new()
            .put(columns::version_column(), encoding::encode_version(version))
            .put_versioned(
                columns::record_type_id_column(),
                version,
                rt_id.as_bytes().to_vec(),
            )
            .put_versioned(
                columns::record_type_version_column(),
                version,
                encoding::encode_version(rt_version),
            );

        for (field_id, value) in fields {
            let field_type = self.schema.field_type_by_id(field_id)?;
            let cell = encoding::encode_existing(&value.to_bytes()?);
            write = match field_type.scope {
                Scope::Versioned => {
                    write.put_versioned(columns::versioned_field_column(field_id), version, cell)
                }
                Scope::NonVersioned => write.put(columns::field_column(field_id), cell),
            };
        }
        for field_id in deletes {
            let field_type = self.schema.field_type_by_id(field_id)?;
            write = match field_type.scope {
                Scope::Versioned => write.put_versioned(
                    columns::versioned_field_column(field_id),
                    version,
                    encoding::tombstone(),
                ),
                Scope::NonVersioned => {
                    write.put(columns::field_column(field_id), encoding::tombstone())
                }
            };
        }
        Ok(write)
    }

    fn check_mandatory_fields(
        &self,
        record_type: &RecordType,
        fields: &BTreeMap<SchemaId, Value>,
        deletes: &BTreeSet<SchemaId>,
    ) -> Result<()> {
        for field_id in record_type.mandatory_fields() {
            if deletes.contains(field_id) || !fields.contains_key(field_id) {
                return Err(Error::InvalidRecord(format!(
                    "mandatory field {field_id} is missing"
                )));
            }
        }
        Ok(())
    }

    fn check_mandatory_after_update(
        &self,
        record_type: &RecordType,
        record: &Record,
        original: &Record,
    ) -> Result<()> {
        for field_id in record_type.mandatory_fields() {
            if record.fields_to_delete.contains(field_id) {
                return Err(Error::InvalidRecord(format!(
                    "mandatory field {field_id} cannot be deleted"
                )));
            }
            let present = record.has_field(field_id) || original.has_field(field_id);
            if !present {
                return Err(Error::InvalidRecord(format!(
                    "mandatory field {field_id} is missing"
                )));
            }
        }
        Ok(())
    }
}
