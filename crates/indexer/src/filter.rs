//! Index inclusion predicates
//!
//! A [`RecordFilter`] decides whether a record belongs in an index, based
//! on record type and/or one field-value equality. A match yields an
//! [`IndexCase`] naming the vtags the index should maintain for that
//! record. The model deliberately stays declarative — the dependency set
//! of all registered filters is what the filter-snapshot hook captures at
//! write time.

use std::collections::BTreeSet;

use vellum_core::id::SchemaId;
use vellum_core::record::Record;
use vellum_core::value::Value;

/// The outcome of a filter match: which vtags to index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCase {
    /// Version tags the index maintains for the matched record
    pub vtags: BTreeSet<SchemaId>,
}

/// Record-type plus field-value inclusion predicate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Restrict to records of these types; `None` matches every type
    pub record_types: Option<BTreeSet<SchemaId>>,
    /// Require one field to equal a value; `None` imposes no field rule
    pub field_equals: Option<(SchemaId, Value)>,
    /// Vtags reported on a match
    pub vtags: BTreeSet<SchemaId>,
}

impl RecordFilter {
    /// A filter matching every record
    pub fn match_all(vtags: BTreeSet<SchemaId>) -> Self {
        Self {
            record_types: None,
            field_equals: None,
            vtags,
        }
    }

    /// Restrict the filter to one record type
    pub fn with_record_type(mut self, record_type: SchemaId) -> Self {
        self.record_types
            .get_or_insert_with(BTreeSet::new)
            .insert(record_type);
        self
    }

    /// Require a field to equal a value
    pub fn with_field_equals(mut self, field: SchemaId, value: Value) -> Self {
        self.field_equals = Some((field, value));
        self
    }

    /// Evaluate the predicate against a fully-loaded record
    ///
    /// Returns the index case on a match, `None` otherwise.
    pub fn index_case(&self, record: &Record) -> Option<IndexCase> {
        if let Some(types) = &self.record_types {
            let (record_type, _) = record.record_type?;
            if !types.contains(&record_type) {
                return None;
            }
        }
        if let Some((field, expected)) = &self.field_equals {
            if record.field(field) != Some(expected) {
                return None;
            }
        }
        Some(IndexCase {
            vtags: self.vtags.clone(),
        })
    }

    /// Whether this filter's outcome depends on the record type
    pub fn depends_on_record_type(&self) -> bool {
        self.record_types.is_some()
    }

    /// The field ids this filter's outcome depends on
    pub fn field_dependencies(&self) -> impl Iterator<Item = &SchemaId> {
        self.field_equals.iter().map(|(field, _)| field)
    }
}
