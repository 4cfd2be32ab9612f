//! End-to-end tests of the change-propagation pipeline
//!
//! These wire the full stack the way an embedding process would: memory
//! cell store, schema registry, row log with a debounced notifier, the
//! index-filter hook, an indexer registry and the dispatch engine — then
//! drive record mutations and observe what reaches the queue, the
//! notifier and the indexers.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use vellum::{
    CancelToken, ChangeEvent, ChangeType, Error, FieldType, FieldTypeEntry, IndexFilterHook,
    Indexer, IndexerError, IndexerRegistry, IndexesInfo, Link, ManualClock, MemoryCellStore,
    MemoryRowLog, MemorySchemaRegistry, ProcessorNotifier, ProcessorWaker, QName, Record,
    RecordFilter, RecordId, RecordType, Repository, RowLog, SchemaId, Scope, Subscription,
    SubscriptionKind, Value, ValueType, WakeError,
};
use vellum::DispatchEngine;

#[derive(Default)]
struct RecordingWaker {
    wakes: Mutex<Vec<String>>,
}

impl ProcessorWaker for RecordingWaker {
    fn wake(&self, row_log_id: &str) -> Result<(), WakeError> {
        self.wakes.lock().push(row_log_id.to_string());
        Ok(())
    }
}

struct RecordingIndexer {
    name: String,
    filter: RecordFilter,
    indexed: Mutex<Vec<(RecordId, BTreeSet<SchemaId>)>>,
}

impl Indexer for RecordingIndexer {
    fn name(&self) -> &str {
        &self.name
    }
    fn filter(&self) -> &RecordFilter {
        &self.filter
    }
    fn index(&self, record: &Record, vtags: &BTreeSet<SchemaId>) -> Result<(), IndexerError> {
        let id = record.id.clone().expect("dispatched records carry ids");
        self.indexed.lock().push((id, vtags.clone()));
        Ok(())
    }
    fn index_by_id(&self, id: &RecordId) -> Result<(), IndexerError> {
        self.indexed.lock().push((id.clone(), BTreeSet::new()));
        Ok(())
    }
}

struct Pipeline {
    repository: Arc<Repository<MemoryCellStore>>,
    row_log: Arc<MemoryRowLog>,
    waker: Arc<RecordingWaker>,
    clock: Arc<ManualClock>,
    registry: Arc<IndexerRegistry>,
    indexer: Arc<RecordingIndexer>,
    doc_type: SchemaId,
    note_type: SchemaId,
    status: SchemaId,
    title: SchemaId,
    see_also: SchemaId,
    live_vtag: SchemaId,
}

/// A "documents" pipeline: one indexer over records with status
/// "published", depending on the status field and the record type.
fn pipeline() -> Pipeline {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let schema = Arc::new(MemorySchemaRegistry::new());
    let status = SchemaId::new();
    let title = SchemaId::new();
    let see_also = SchemaId::new();
    let doc_type = SchemaId::new();
    let note_type = SchemaId::new();
    let live_vtag = SchemaId::new();

    schema.register_field_type(FieldType::new(
        status,
        QName::new("doc", "status"),
        ValueType::string(),
        Scope::Versioned,
    ));
    schema.register_field_type(FieldType::new(
        title,
        QName::new("doc", "title"),
        ValueType::string(),
        Scope::Versioned,
    ));
    schema.register_field_type(FieldType::new(
        see_also,
        QName::new("doc", "see-also"),
        ValueType::list_of(ValueType::link()),
        Scope::Versioned,
    ));
    let fields = vec![
        FieldTypeEntry::new(status, false),
        FieldTypeEntry::new(title, true),
        FieldTypeEntry::new(see_also, false),
    ];
    schema.register_record_type(RecordType::new(doc_type, 1, fields.clone()));
    schema.register_record_type(RecordType::new(note_type, 1, fields));

    let registry = Arc::new(IndexerRegistry::new());
    let indexer = Arc::new(RecordingIndexer {
        name: "published-docs".into(),
        filter: RecordFilter::match_all(BTreeSet::from([live_vtag]))
            .with_record_type(doc_type)
            .with_field_equals(status, Value::String("published".into())),
        indexed: Mutex::new(Vec::new()),
    });
    registry.register(Arc::clone(&indexer) as Arc<dyn Indexer>);

    let row_log = Arc::new(MemoryRowLog::new("records"));
    row_log.add_subscription(Subscription::new(
        "records",
        "indexer-feed",
        SubscriptionKind::Remote,
        10,
    ));

    let clock = ManualClock::at(1_000_000);
    let waker = Arc::new(RecordingWaker::default());
    let notifier = Arc::new(ProcessorNotifier::new(
        Arc::clone(&waker) as Arc<dyn ProcessorWaker>,
        Duration::from_millis(500),
        clock.clone(),
    ));

    let indexes_info = Arc::new(IndexesInfo::from_registry(&registry));
    let repository = Arc::new(
        Repository::builder(
            Arc::new(MemoryCellStore::new()),
            schema,
            Arc::clone(&row_log) as Arc<dyn RowLog>,
        )
        .notifier(notifier)
        .hook(Arc::new(IndexFilterHook::new(indexes_info)))
        .build(),
    );

    Pipeline {
        repository,
        row_log,
        waker,
        clock,
        registry,
        indexer,
        doc_type,
        note_type,
        status,
        title,
        see_also,
        live_vtag,
    }
}

fn document(p: &Pipeline, id: &str, title: &str, status: &str) -> Record {
    let mut record = Record::with_id(RecordId::new(id));
    record
        .set_record_type(p.doc_type, 1)
        .set_field(p.title, title)
        .set_field(p.status, status);
    record
}

fn events(p: &Pipeline) -> Vec<ChangeEvent> {
    p.row_log
        .next_messages("indexer-feed", usize::MAX)
        .unwrap()
        .iter()
        .map(|m| ChangeEvent::from_json_bytes(&m.payload).unwrap())
        .collect()
}

#[test]
fn test_create_update_delete_event_stream() {
    let p = pipeline();
    let id = RecordId::new("doc-1");

    // Create with status "x"-equivalent: version 1, CREATE event naming
    // the written fields.
    let created = p
        .repository
        .create(document(&p, "doc-1", "t", "draft"))
        .unwrap();
    assert_eq!(created.version, Some(1));

    // Update the status: version 2, UPDATE event with only that field.
    let mut update = Record::with_id(id.clone());
    update.set_field(p.status, "published");
    let updated = p.repository.update(update).unwrap();
    assert_eq!(updated.version, Some(2));

    // Delete: subsequent reads fail.
    p.repository.delete(&id).unwrap();
    assert!(matches!(
        p.repository.read_latest(&id),
        Err(Error::RecordNotFound(_))
    ));

    let stream = events(&p);
    assert_eq!(stream.len(), 3);

    assert_eq!(stream[0].change_type, ChangeType::Create);
    assert_eq!(stream[0].version_created, Some(1));
    assert!(stream[0].updated_fields.contains(&p.title));
    assert!(stream[0].updated_fields.contains(&p.status));

    assert_eq!(stream[1].change_type, ChangeType::Update);
    assert_eq!(stream[1].version_updated, Some(2));
    assert_eq!(
        stream[1].updated_fields,
        BTreeSet::from([p.status]),
        "only the changed field is reported"
    );

    assert_eq!(stream[2].change_type, ChangeType::Delete);
    assert!(stream[2].updated_fields.is_empty());
}

#[test]
fn test_filter_snapshot_carries_old_and_new_bytes() {
    let p = pipeline();
    let id = RecordId::new("doc-1");
    p.repository
        .create(document(&p, "doc-1", "t", "draft"))
        .unwrap();

    let mut update = Record::with_id(id);
    update.set_field(p.status, "published");
    p.repository.update(update).unwrap();

    let stream = events(&p);

    // The status field is a filter dependency, so the update's snapshot
    // carries its serialized before/after bytes.
    let snapshot = stream[1].index_filter_data.clone().unwrap();
    assert!(snapshot.old_record_exists);
    assert!(snapshot.new_record_exists);
    assert_eq!(snapshot.old_record_type, Some(p.doc_type));
    assert_eq!(snapshot.new_record_type, Some(p.doc_type));

    let changes = snapshot.field_changes.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field_id, p.status);
    assert_eq!(
        changes[0].old_value,
        Some(Value::String("draft".into()).to_bytes().unwrap())
    );
    assert_eq!(
        changes[0].new_value,
        Some(Value::String("published".into()).to_bytes().unwrap())
    );

    // The delete snapshot flips the existence flags.
    p.repository.delete(&RecordId::new("doc-1")).unwrap();
    let stream = events(&p);
    let snapshot = stream[2].index_filter_data.clone().unwrap();
    assert!(snapshot.old_record_exists);
    assert!(!snapshot.new_record_exists);
}

#[test]
fn test_events_survive_the_wire_roundtrip() {
    let p = pipeline();
    p.repository
        .create(document(&p, "doc-1", "t", "published"))
        .unwrap();

    for message in p.row_log.next_messages("indexer-feed", usize::MAX).unwrap() {
        let event = ChangeEvent::from_json_bytes(&message.payload).unwrap();
        assert_eq!(
            ChangeEvent::from_json_bytes(&event.to_json_bytes().unwrap()).unwrap(),
            event
        );
    }
}

#[test]
fn test_wire_shape_of_create_event() {
    let p = pipeline();
    p.repository
        .create(document(&p, "doc-1", "t", "draft"))
        .unwrap();

    let messages = p.row_log.next_messages("indexer-feed", usize::MAX).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&messages[0].payload).unwrap();
    let obj = json.as_object().unwrap();

    assert_eq!(obj["type"], serde_json::json!("CREATE"));
    assert_eq!(obj["versionCreated"], serde_json::json!(1));
    // Field presence is meaningful on the wire: nothing update- or
    // delete-shaped leaks into a create payload.
    assert!(!obj.contains_key("versionUpdated"));
    assert!(!obj.contains_key("recordTypeChanged"));
    assert!(!obj.contains_key("vtagsToIndex"));
    assert!(obj["updatedFields"].as_array().unwrap().len() == 2);
}

#[test]
fn test_notifier_debounces_write_bursts() {
    let p = pipeline();
    p.repository
        .create(document(&p, "doc-1", "t", "draft"))
        .unwrap();
    for i in 0..5 {
        let mut update = Record::with_id(RecordId::new("doc-1"));
        update.set_field(p.title, format!("t{i}"));
        p.repository.update(update).unwrap();
    }
    // Six writes inside one debounce window: one wake-up.
    assert_eq!(p.waker.wakes.lock().len(), 1);

    p.clock.advance(500);
    let mut update = Record::with_id(RecordId::new("doc-1"));
    update.set_field(p.title, "past-window");
    p.repository.update(update).unwrap();
    assert_eq!(p.waker.wakes.lock().len(), 2);
}

#[test]
fn test_dispatch_respects_inclusion_filter() {
    let p = pipeline();
    let engine = DispatchEngine::new(Arc::clone(&p.repository), Arc::clone(&p.registry));
    let cancel = CancelToken::new();

    // A draft document does not match the published-docs filter.
    p.repository
        .create(document(&p, "draft-doc", "t", "draft"))
        .unwrap();
    engine.index(&RecordId::new("draft-doc"), &cancel).unwrap();
    assert!(p.indexer.indexed.lock().is_empty());

    // A published document does, and arrives with the filter's vtags.
    p.repository
        .create(document(&p, "live-doc", "t", "published"))
        .unwrap();
    engine.index(&RecordId::new("live-doc"), &cancel).unwrap();
    let indexed = p.indexer.indexed.lock();
    assert_eq!(indexed.len(), 1);
    assert_eq!(indexed[0].0, RecordId::new("live-doc"));
    assert_eq!(indexed[0].1, BTreeSet::from([p.live_vtag]));

    // A record of another type is excluded even when published.
    drop(indexed);
    let mut note = Record::with_id(RecordId::new("note-1"));
    note.set_record_type(p.note_type, 1)
        .set_field(p.title, "n")
        .set_field(p.status, "published");
    p.repository.create(note).unwrap();
    engine.index(&RecordId::new("note-1"), &cancel).unwrap();
    assert_eq!(p.indexer.indexed.lock().len(), 1);
}

#[test]
fn test_point_in_time_schema_resolution() {
    let p = pipeline();
    let id = RecordId::new("doc-1");
    p.repository
        .create(document(&p, "doc-1", "v1", "draft"))
        .unwrap();

    let mut update = Record::with_id(id.clone());
    update.set_field(p.title, "v2");
    p.repository.update(update).unwrap();

    // Version 3 switches the record type.
    let mut retype = Record::with_id(id.clone());
    retype.set_record_type(p.note_type, 1);
    retype.set_field(p.title, "v3");
    p.repository.update(retype).unwrap();

    // Versions 1-2 still read under the old type reference.
    for v in [1u64, 2] {
        let record = p.repository.read(&id, Some(v), None).unwrap();
        assert_eq!(record.record_type, Some((p.doc_type, 1)));
    }
    let record = p.repository.read(&id, Some(3), None).unwrap();
    assert_eq!(record.record_type, Some((p.note_type, 1)));

    // The type switch is flagged on the event.
    let stream = events(&p);
    assert!(!stream[1].record_type_changed);
    assert!(stream[2].record_type_changed);
}

#[test]
fn test_row_log_consumption_and_gc() {
    let p = pipeline();
    p.repository
        .create(document(&p, "doc-1", "t", "draft"))
        .unwrap();
    p.repository
        .create(document(&p, "doc-2", "t", "draft"))
        .unwrap();

    let messages = p.row_log.next_messages("indexer-feed", usize::MAX).unwrap();
    assert_eq!(messages.len(), 2);

    // Nothing is reclaimed until the only subscription acks.
    assert_eq!(p.row_log.truncate_consumed(), 0);
    p.row_log.ack("indexer-feed", messages[0].seq).unwrap();
    assert_eq!(p.row_log.truncate_consumed(), 1);
    p.row_log.ack("indexer-feed", messages[1].seq).unwrap();
    assert_eq!(p.row_log.truncate_consumed(), 1);
    assert!(p.row_log.is_empty());
}

#[test]
fn test_link_extraction_from_loaded_record() {
    let p = pipeline();
    let mut record = document(&p, "doc-1", "t", "draft");
    record.set_field(
        p.see_also,
        Value::List(vec![
            Value::Link(Link::to("doc-2")),
            Value::Link(Link::to("doc-3")),
        ]),
    );
    p.repository.create(record).unwrap();

    let loaded = p.repository.read_latest(&RecordId::new("doc-1")).unwrap();
    let mut collector = vellum::VecLinkCollector::new();
    vellum::LinkExtractor::extract(&loaded, &mut collector, p.repository.schema().as_ref())
        .unwrap();

    let targets: BTreeSet<_> = collector
        .links()
        .iter()
        .map(|l| l.target.master().to_string())
        .collect();
    assert_eq!(
        targets,
        BTreeSet::from(["doc-2".to_string(), "doc-3".to_string()])
    );
    assert!(collector.links().iter().all(|l| l.field == p.see_also));
}
