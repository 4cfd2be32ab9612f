//! The indexer abstraction and its failure model
//!
//! One indexer maintains one index, identified by name. The concrete sink
//! (a search cluster, the link index, a test recorder) lives behind this
//! trait; dispatch only sees the name, the inclusion filter, and the two
//! indexing entry points.
//!
//! Heterogeneous failures — index client errors, shard selection, I/O,
//! repository reads — are wrapped into the single [`IndexerError::Failed`]
//! kind naming the failing indexer, so callers of dispatch handle exactly
//! one error shape.

use std::collections::BTreeSet;
use thiserror::Error;

use vellum_core::id::{RecordId, SchemaId};
use vellum_core::record::Record;

use crate::filter::RecordFilter;
use crate::shard::ShardError;

/// Underlying cause of one indexer's failure
#[derive(Debug, Error)]
pub enum FailureCause {
    /// The index client (remote sink) failed
    #[error("index client error: {0}")]
    Client(String),

    /// Shard selection failed
    #[error(transparent)]
    Shard(#[from] ShardError),

    /// I/O towards the sink failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Reading from the repository failed
    #[error("repository error: {0}")]
    Repository(#[from] vellum_core::error::Error),
}

/// Errors surfaced by indexer dispatch
#[derive(Debug, Error)]
pub enum IndexerError {
    /// One indexer failed; dispatch aborted or recorded it per policy
    #[error("indexer `{indexer}` failed: {cause}")]
    Failed {
        /// Name of the failing indexer
        indexer: String,
        /// What went wrong
        #[source]
        cause: FailureCause,
    },

    /// A requested indexer name is not registered
    #[error("no indexer registered under name `{0}`")]
    NotRegistered(String),

    /// Reading the record to dispatch failed
    #[error("failed to read record for indexing: {0}")]
    RecordRead(#[source] vellum_core::error::Error),

    /// Dispatch observed a cancellation request
    #[error("indexing interrupted")]
    Interrupted,

    /// Multiple indexers failed (collect-all failure policy)
    #[error("{} indexer(s) failed", .0.len())]
    Multiple(Vec<IndexerError>),
}

impl IndexerError {
    /// Wrap a cause as the failure of the named indexer
    pub fn failed(indexer: impl Into<String>, cause: impl Into<FailureCause>) -> Self {
        IndexerError::Failed {
            indexer: indexer.into(),
            cause: cause.into(),
        }
    }
}

/// One index maintainer, identified by its unique index name
pub trait Indexer: Send + Sync {
    /// Unique name of the index
    fn name(&self) -> &str;

    /// The inclusion predicate of this index
    fn filter(&self) -> &RecordFilter;

    /// Index a fully-loaded record for the given vtags
    ///
    /// # Errors
    /// Any failure is reported as this indexer's [`FailureCause`].
    fn index(&self, record: &Record, vtags: &BTreeSet<SchemaId>) -> Result<(), IndexerError>;

    /// Index a record by id, reading it as needed
    ///
    /// # Errors
    /// Any failure is reported as this indexer's [`FailureCause`].
    fn index_by_id(&self, id: &RecordId) -> Result<(), IndexerError>;
}
