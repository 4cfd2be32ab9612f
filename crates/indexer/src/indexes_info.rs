//! Precomputed filter dependencies
//!
//! The filter-snapshot hook must know, at write time, which fields and
//! whether the record type can influence any index's inclusion decision.
//! [`IndexesInfo`] is that precomputed dependency set, derived from the
//! registered index configuration and handed to the hook at construction.

use std::collections::BTreeSet;

use vellum_core::id::SchemaId;

use crate::registry::IndexerRegistry;

/// Dependency summary over all configured indexes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexesInfo {
    index_count: usize,
    field_dependencies: BTreeSet<SchemaId>,
    depends_on_record_type: bool,
}

impl IndexesInfo {
    /// Build from explicit parts
    pub fn new(
        index_count: usize,
        field_dependencies: BTreeSet<SchemaId>,
        depends_on_record_type: bool,
    ) -> Self {
        Self {
            index_count,
            field_dependencies,
            depends_on_record_type,
        }
    }

    /// Derive the dependency set from a registry's current filters
    pub fn from_registry(registry: &IndexerRegistry) -> Self {
        let indexers = registry.all();
        let mut field_dependencies = BTreeSet::new();
        let mut depends_on_record_type = false;
        for indexer in &indexers {
            let filter = indexer.filter();
            depends_on_record_type |= filter.depends_on_record_type();
            field_dependencies.extend(filter.field_dependencies().copied());
        }
        Self {
            index_count: indexers.len(),
            field_dependencies,
            depends_on_record_type,
        }
    }

    /// Whether any index is configured at all
    pub fn has_indexes(&self) -> bool {
        self.index_count > 0
    }

    /// Fields that can influence some index's inclusion decision
    pub fn field_dependencies(&self) -> &BTreeSet<SchemaId> {
        &self.field_dependencies
    }

    /// Whether some index's inclusion decision depends on the record type
    pub fn depends_on_record_type(&self) -> bool {
        self.depends_on_record_type
    }
}
