//! Index maintenance for the Vellum record store
//!
//! This crate provides:
//! - The [`Indexer`] trait and its per-index [`RecordFilter`] inclusion
//!   predicate
//! - [`IndexerRegistry`]: an explicit name-to-indexer registry instance
//!   (constructed at startup and passed by reference — no process-wide
//!   singleton)
//! - [`DispatchEngine`]: routes a changed record to every indexer whose
//!   predicate matches
//! - [`IndexFilterHook`]: the record update hook that captures the
//!   index-filter snapshot on change events at write time
//! - [`LinkExtractor`]: walks a fully-loaded record and yields its
//!   outgoing link graph
//! - [`ShardSelector`]: maps a record id onto an index shard

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod filter;
pub mod filter_hook;
pub mod indexer;
pub mod indexes_info;
pub mod links;
pub mod registry;
pub mod shard;

pub use dispatch::{DispatchEngine, FailurePolicy};
pub use filter::{IndexCase, RecordFilter};
pub use filter_hook::IndexFilterHook;
pub use indexer::{FailureCause, Indexer, IndexerError};
pub use indexes_info::IndexesInfo;
pub use links::{CollectedLink, LinkCollector, LinkExtractor, VecLinkCollector};
pub use registry::IndexerRegistry;
pub use shard::{HashShardSelector, ShardError, ShardSelector};
