//! Indexer dispatch
//!
//! Dispatch reads the full record once, then evaluates every registered
//! indexer's inclusion predicate against it, invoking the indexer with
//! the matched vtag set. Dispatch is synchronous and sequential; a
//! caller-level interrupt is observable at the record-read step and at
//! each indexer call boundary.
//!
//! The failure policy is explicit configuration:
//! [`FailurePolicy::Abort`] (the default) stops at the first failing
//! indexer and surfaces that single wrapped error;
//! [`FailurePolicy::CollectAll`] keeps dispatching and reports every
//! failure at the end.

use std::sync::Arc;
use tracing::debug;

use vellum_core::cancel::CancelToken;
use vellum_core::id::RecordId;
use vellum_repository::Repository;
use vellum_storage::CellStore;

use crate::indexer::{Indexer, IndexerError};
use crate::registry::IndexerRegistry;

/// How dispatch treats a failing indexer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the remaining indexers on the first failure
    #[default]
    Abort,
    /// Dispatch to every indexer, then report all failures together
    CollectAll,
}

/// Routes changed records to every matching indexer
pub struct DispatchEngine<C: CellStore> {
    repository: Arc<Repository<C>>,
    registry: Arc<IndexerRegistry>,
    policy: FailurePolicy,
}

impl<C: CellStore> DispatchEngine<C> {
    /// Create an engine with the default abort-on-first-error policy
    pub fn new(repository: Arc<Repository<C>>, registry: Arc<IndexerRegistry>) -> Self {
        Self {
            repository,
            registry,
            policy: FailurePolicy::default(),
        }
    }

    /// Override the failure policy
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Index a record on every registered indexer whose predicate matches
    ///
    /// # Errors
    /// [`IndexerError::RecordRead`] when the record cannot be read,
    /// [`IndexerError::Interrupted`] when the token is cancelled, and the
    /// wrapped failure(s) of the indexers per the configured policy.
    pub fn index(&self, id: &RecordId, cancel: &CancelToken) -> Result<(), IndexerError> {
        self.dispatch(id, self.registry.all(), cancel)
    }

    /// Index a record on an explicit subset of indexers, by name
    ///
    /// Fails fast — before reading the record — when any name is not
    /// registered.
    ///
    /// # Errors
    /// [`IndexerError::NotRegistered`] for an unknown name; otherwise as
    /// [`DispatchEngine::index`].
    pub fn index_on(
        &self,
        id: &RecordId,
        names: &[&str],
        cancel: &CancelToken,
    ) -> Result<(), IndexerError> {
        let mut indexers = Vec::with_capacity(names.len());
        for name in names {
            let indexer = self
                .registry
                .get(name)
                .ok_or_else(|| IndexerError::NotRegistered(name.to_string()))?;
            indexers.push(indexer);
        }
        self.dispatch(id, indexers, cancel)
    }

    fn dispatch(
        &self,
        id: &RecordId,
        indexers: Vec<Arc<dyn Indexer>>,
        cancel: &CancelToken,
    ) -> Result<(), IndexerError> {
        if cancel.is_cancelled() {
            return Err(IndexerError::Interrupted);
        }
        let record = self
            .repository
            .read_latest(id)
            .map_err(IndexerError::RecordRead)?;

        let mut failures = Vec::new();
        for indexer in indexers {
            if cancel.is_cancelled() {
                return Err(IndexerError::Interrupted);
            }
            let Some(case) = indexer.filter().index_case(&record) else {
                debug!(indexer = indexer.name(), record = %id, "filter excluded record");
                continue;
            };
            if let Err(e) = indexer.index(&record, &case.vtags) {
                match self.policy {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::CollectAll => failures.push(e),
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(IndexerError::Multiple(failures))
        }
    }
}
