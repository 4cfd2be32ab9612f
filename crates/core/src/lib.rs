//! Core types for the Vellum record store
//!
//! This crate defines the foundational model shared by every layer:
//! - Identifiers: SchemaId, QName, RecordId, Link
//! - Values: the Value enum and its declared ValueType shapes
//! - Records: Record, FieldType, RecordType and the Scope split between
//!   versioned and non-versioned fields
//! - Schema collaboration: the SchemaRegistry trait plus an in-memory
//!   implementation, and the point-in-time VersionMap lookup
//! - Change events: ChangeEvent, IndexFilterSnapshot and their wire codec
//! - Ambient seams: Clock (injectable time) and CancelToken (cooperative
//!   interruption)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod event;
pub mod id;
pub mod record;
pub mod schema;
pub mod time;
pub mod value;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use event::{ChangeEvent, ChangeType, FieldChange, IndexFilterSnapshot};
pub use id::{IdGenerator, Link, QName, RecordId, SchemaId, UuidIdGenerator};
pub use record::{FieldType, FieldTypeEntry, Record, RecordType, Scope};
pub use schema::{MemorySchemaRegistry, SchemaRegistry, VersionMap};
pub use time::{Clock, ManualClock, SystemClock};
pub use value::{BaseType, Value, ValueType};
