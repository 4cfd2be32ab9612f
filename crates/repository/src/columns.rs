//! Table layout of the record store
//!
//! One row per record, addressed by the record id's byte form. Families:
//!
//! - `sys`: single-slot system cells — the current version and the row
//!   lock cell
//! - `vsys`: versioned system cells — the record-type reference, written
//!   at every record version
//! - `vfields`: versioned field values, qualified by field-type id
//! - `fields`: single-slot (non-versioned) field values

use vellum_core::id::SchemaId;
use vellum_storage::Column;

/// Single-slot system family
pub const FAMILY_SYSTEM: &str = "sys";
/// Versioned system family
pub const FAMILY_SYSTEM_VERSIONED: &str = "vsys";
/// Versioned field family
pub const FAMILY_FIELDS_VERSIONED: &str = "vfields";
/// Non-versioned field family
pub const FAMILY_FIELDS: &str = "fields";

/// The current-version cell
pub fn version_column() -> Column {
    Column::new(FAMILY_SYSTEM, b"version".to_vec())
}

/// The row lock cell used by the row lock manager
pub fn lock_column() -> Column {
    Column::new(FAMILY_SYSTEM, b"lock".to_vec())
}

/// The versioned record-type id cell
pub fn record_type_id_column() -> Column {
    Column::new(FAMILY_SYSTEM_VERSIONED, b"rt_id".to_vec())
}

/// The versioned record-type version cell
pub fn record_type_version_column() -> Column {
    Column::new(FAMILY_SYSTEM_VERSIONED, b"rt_version".to_vec())
}

/// The versioned cell of a field
pub fn versioned_field_column(field: &SchemaId) -> Column {
    Column::new(FAMILY_FIELDS_VERSIONED, field.as_bytes().to_vec())
}

/// The single-slot cell of a non-versioned field
pub fn field_column(field: &SchemaId) -> Column {
    Column::new(FAMILY_FIELDS, field.as_bytes().to_vec())
}
