//! Error types for the Vellum record store
//!
//! One central error enum is used throughout the system, following the
//! propagation policy of the record store: structural and identity errors
//! (RecordNotFound, RecordExists, InvalidRecord) are raised immediately to
//! the caller; lock contention is a sentinel (`None`), never an error; and
//! notification failures are swallowed at the notifier.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.

use crate::id::{RecordId, SchemaId};
use thiserror::Error;

/// Result type alias for Vellum operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Vellum record store
#[derive(Debug, Error)]
pub enum Error {
    /// No record exists under the given id (or the requested version is
    /// beyond the record's current version)
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// A record already exists under the given id
    #[error("record already exists: {0}")]
    RecordExists(RecordId),

    /// Structural violation on the record itself (empty field set, missing
    /// mandatory field, missing record type, ...)
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A field type could not be resolved by the schema registry
    #[error("field type not found: {0}")]
    FieldTypeNotFound(String),

    /// A record type could not be resolved by the schema registry
    #[error("record type not found: {0}")]
    RecordTypeNotFound(SchemaId),

    /// A row log subscription id that is not registered
    #[error("unknown subscription: {0}")]
    UnknownSubscription(String),

    /// Serialization/deserialization error (field values, event payloads)
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Underlying cell store error
    #[error("storage error: {0}")]
    Storage(String),

    /// The operation observed a cancellation request
    #[error("operation interrupted")]
    Interrupted,
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
