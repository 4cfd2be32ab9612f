//! Link extraction
//!
//! Walks a fully-loaded record (all fields present, nested records
//! included) and yields the outgoing link graph as (target record id,
//! top-level field id) pairs. However deeply a link is nested through
//! lists and embedded records, it is attributed to the top-level field it
//! occurs under, and resolved against the *top-level* record id — never
//! an intermediate nested one.
//!
//! Fields whose declared type cannot be resolved are silently skipped:
//! the schema may have evolved past the stored data.

use tracing::debug;

use vellum_core::error::{Error, Result};
use vellum_core::id::{RecordId, SchemaId};
use vellum_core::record::Record;
use vellum_core::schema::SchemaRegistry;
use vellum_core::value::{BaseType, Value};

/// One extracted link occurrence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectedLink {
    /// The record the link points at, fully resolved
    pub target: RecordId,
    /// The top-level field the link occurs under
    pub field: SchemaId,
}

/// Sink for extracted links
pub trait LinkCollector {
    /// Receive one link occurrence
    fn collect(&mut self, target: RecordId, field: SchemaId);
}

/// Collector gathering links into a vector
#[derive(Debug, Default)]
pub struct VecLinkCollector {
    links: Vec<CollectedLink>,
}

impl VecLinkCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected links, in extraction order
    pub fn links(&self) -> &[CollectedLink] {
        &self.links
    }

    /// Consume the collector
    pub fn into_links(self) -> Vec<CollectedLink> {
        self.links
    }
}

impl LinkCollector for VecLinkCollector {
    fn collect(&mut self, target: RecordId, field: SchemaId) {
        self.links.push(CollectedLink { target, field });
    }
}

/// Extracts the outgoing links of fully-loaded records
pub struct LinkExtractor;

impl LinkExtractor {
    /// Extract all links of `record` into `collector`
    ///
    /// The record must carry its id and be fully loaded.
    ///
    /// # Errors
    /// [`Error::InvalidRecord`] when the record has no id or a
    /// link-declared field holds a non-link value shape.
    pub fn extract(
        record: &Record,
        collector: &mut dyn LinkCollector,
        schema: &dyn SchemaRegistry,
    ) -> Result<()> {
        let id = record.id.as_ref().ok_or_else(|| {
            Error::InvalidRecord("link extraction requires a record with an id".into())
        })?;
        for (field_id, value) in &record.fields {
            let field_type = match schema.field_type_by_id(field_id) {
                Ok(ft) => ft,
                Err(Error::FieldTypeNotFound(reference)) => {
                    // Nothing can be done with a field whose type is gone.
                    debug!(field = %reference, "skipping link extraction for unresolvable field");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match field_type.value_type.base_type() {
                BaseType::Link | BaseType::Record => {
                    Self::walk(value, collector, *field_id, id, schema)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Walk one value, keeping the top-level field and record context
    fn walk(
        value: &Value,
        collector: &mut dyn LinkCollector,
        ctx_field: SchemaId,
        ctx_record: &RecordId,
        schema: &dyn SchemaRegistry,
    ) -> Result<()> {
        match value {
            Value::List(items) => {
                for item in items {
                    Self::walk(item, collector, ctx_field, ctx_record, schema)?;
                }
                Ok(())
            }
            Value::Record(nested) => Self::walk_nested(nested, collector, ctx_field, ctx_record, schema),
            Value::Link(link) => {
                collector.collect(link.resolve(ctx_record), ctx_field);
                Ok(())
            }
            other => Err(Error::InvalidRecord(format!(
                "unexpected {} value under a link field",
                other.type_name()
            ))),
        }
    }

    /// Nested records keep the *top-level* field and record context: a
    /// link deep inside an embedded record still occurs, as far as the
    /// link graph is concerned, with the field of the top-level record.
    fn walk_nested(
        nested: &Record,
        collector: &mut dyn LinkCollector,
        ctx_field: SchemaId,
        ctx_record: &RecordId,
        schema: &dyn SchemaRegistry,
    ) -> Result<()> {
        for (field_id, value) in &nested.fields {
            let field_type = match schema.field_type_by_id(field_id) {
                Ok(ft) => ft,
                Err(Error::FieldTypeNotFound(reference)) => {
                    debug!(field = %reference, "skipping link extraction for unresolvable field");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match field_type.value_type.base_type() {
                BaseType::Link | BaseType::Record => {
                    Self::walk(value, collector, ctx_field, ctx_record, schema)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
