//! The versioned record store
//!
//! Records live one-per-row on the cell substrate, with a contiguous
//! version sequence starting at 1. Field values split across a versioned
//! family (history retained) and a single-slot family (latest only), with
//! the record-type reference versioned alongside so point-in-time reads
//! resolve the schema that was active at the probed version.
//!
//! Every mutation produces a change event, runs the registered update
//! hooks (which may enrich the event, e.g. with an index-filter
//! snapshot), appends the encoded event to the row log, and nudges the
//! debounced processor notifier.
//!
//! Plain reads and writes are deliberately not wrapped in the row lock;
//! callers that need strict serialization acquire a lock through
//! [`Repository::row_locker`] and use the lease-guarded write variants.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod columns;
pub mod encoding;
pub mod factory;
pub mod hooks;
pub mod repository;

pub use factory::{DefaultRecordFactory, RecordFactory};
pub use hooks::{HookContext, RecordUpdateHook};
pub use repository::{Repository, RepositoryBuilder};
