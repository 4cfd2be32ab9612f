//! Vellum - versioned record store with change propagation
//!
//! Vellum layers a versioned record store over a shared atomic cell
//! substrate and keeps derived indexes consistent with record mutations
//! through a change-propagation pipeline:
//!
//! - a lease-based distributed row lock built purely from single-cell
//!   compare-and-swap
//! - a versioned record model emitting a precise, minimal delta per
//!   mutation, including the index-filter snapshot downstream consumers
//!   use to decide relevance without re-reading records
//! - a row log with ordered subscriptions and a debounced processor
//!   notifier, feeding an indexer registry/dispatch loop
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vellum::{MemoryCellStore, MemoryRowLog, MemorySchemaRegistry, Record, Repository, RowLog};
//!
//! let store = Arc::new(MemoryCellStore::new());
//! let schema = Arc::new(MemorySchemaRegistry::new());
//! let row_log = Arc::new(MemoryRowLog::new("records"));
//!
//! let repository = Repository::builder(store, schema, row_log.clone() as Arc<dyn RowLog>).build();
//! let created = repository.create(my_record)?;
//! ```

// Re-export the public API of the member crates.
pub use vellum_core::{
    BaseType, CancelToken, ChangeEvent, ChangeType, Clock, Error, FieldChange, FieldType,
    FieldTypeEntry, IdGenerator, IndexFilterSnapshot, Link, ManualClock, MemorySchemaRegistry,
    QName, Record, RecordId, RecordType, Result, SchemaId, SchemaRegistry, Scope, SystemClock,
    UuidIdGenerator, Value, ValueType, VersionMap,
};
pub use vellum_indexer::{
    CollectedLink, DispatchEngine, FailureCause, FailurePolicy, HashShardSelector, IndexCase,
    IndexFilterHook, Indexer, IndexerError, IndexerRegistry, IndexesInfo, LinkCollector,
    LinkExtractor, RecordFilter, ShardError, ShardSelector, VecLinkCollector,
};
pub use vellum_repository::{
    DefaultRecordFactory, HookContext, RecordFactory, RecordUpdateHook, Repository,
    RepositoryBuilder,
};
pub use vellum_rowlock::{BackoffPolicy, Permit, RowLock, RowLocker};
pub use vellum_rowlog::{
    LogMessage, MemoryRowLog, ProcessorNotifier, ProcessorWaker, RowLog, Subscription,
    SubscriptionKind, WakeError,
};
pub use vellum_storage::{CellOp, CellStore, Column, MemoryCellStore, RowSnapshot, RowWrite};
