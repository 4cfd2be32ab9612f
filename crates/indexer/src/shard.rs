//! Shard selection
//!
//! An index may span multiple shards; the selector maps a record id onto
//! the shard that should hold its documents. Selection failures are one
//! of the failure causes an indexer can surface during dispatch.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use vellum_core::id::RecordId;

/// Failure to select a shard for a record
#[derive(Debug, Error)]
#[error("shard selection failed: {0}")]
pub struct ShardError(
    /// Human-readable cause
    pub String,
);

/// Maps record ids onto index shards
pub trait ShardSelector: Send + Sync {
    /// The shard that should hold the record's index documents
    ///
    /// # Errors
    /// Returns an error when no shard can be determined.
    fn select(&self, id: &RecordId) -> Result<String, ShardError>;
}

/// Default selector: stable hash of the record id over a fixed shard list
#[derive(Debug, Clone)]
pub struct HashShardSelector {
    shards: Vec<String>,
}

impl HashShardSelector {
    /// Create a selector over the given shards
    pub fn new(shards: Vec<String>) -> Self {
        Self { shards }
    }
}

impl ShardSelector for HashShardSelector {
    fn select(&self, id: &RecordId) -> Result<String, ShardError> {
        if self.shards.is_empty() {
            return Err(ShardError("no shards configured".into()));
        }
        let mut hasher = DefaultHasher::new();
        id.to_bytes().hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        Ok(self.shards[index].clone())
    }
}
