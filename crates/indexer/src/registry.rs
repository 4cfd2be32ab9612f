//! The indexer registry
//!
//! Keeps track of all indexers of the hosting process, one per index,
//! identified by name. The registry is an explicit instance constructed
//! at startup and passed by reference to every component needing
//! dispatch; registering under an existing name replaces the previous
//! entry.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::indexer::Indexer;

/// Name-to-indexer registry
#[derive(Default)]
pub struct IndexerRegistry {
    indexers: RwLock<BTreeMap<String, Arc<dyn Indexer>>>,
}

impl IndexerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an indexer under its name; last registration wins
    pub fn register(&self, indexer: Arc<dyn Indexer>) {
        self.indexers
            .write()
            .insert(indexer.name().to_string(), indexer);
    }

    /// Remove the indexer registered under the name; returns whether one
    /// was registered
    pub fn unregister(&self, name: &str) -> bool {
        self.indexers.write().remove(name).is_some()
    }

    /// The indexer registered under the name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Indexer>> {
        self.indexers.read().get(name).cloned()
    }

    /// All registered indexers, in name order
    pub fn all(&self) -> Vec<Arc<dyn Indexer>> {
        self.indexers.read().values().cloned().collect()
    }

    /// Number of registered indexers
    pub fn len(&self) -> usize {
        self.indexers.read().len()
    }

    /// Whether no indexers are registered
    pub fn is_empty(&self) -> bool {
        self.indexers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RecordFilter;
    use std::collections::BTreeSet;
    use vellum_core::id::{RecordId, SchemaId};
    use vellum_core::record::Record;

    struct DummyIndexer {
        name: String,
        filter: RecordFilter,
    }

    impl DummyIndexer {
        fn named(name: &str) -> Arc<dyn Indexer> {
            Arc::new(Self {
                name: name.to_string(),
                filter: RecordFilter::match_all(BTreeSet::new()),
            })
        }
    }

    impl Indexer for DummyIndexer {
        fn name(&self) -> &str {
            &self.name
        }

        fn filter(&self) -> &RecordFilter {
            &self.filter
        }

        fn index(
            &self,
            _record: &Record,
            _vtags: &BTreeSet<SchemaId>,
        ) -> Result<(), crate::IndexerError> {
            Ok(())
        }

        fn index_by_id(&self, _id: &RecordId) -> Result<(), crate::IndexerError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = IndexerRegistry::new();
        assert!(registry.is_empty());
        registry.register(DummyIndexer::named("search"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("search").is_some());
        assert!(registry.get("links").is_none());
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = IndexerRegistry::new();
        let first = DummyIndexer::named("search");
        let second = DummyIndexer::named("search");
        registry.register(Arc::clone(&first));
        registry.register(Arc::clone(&second));

        assert_eq!(registry.len(), 1);
        let got = registry.get("search").unwrap();
        assert!(Arc::ptr_eq(&got, &second));
    }

    #[test]
    fn test_unregister() {
        let registry = IndexerRegistry::new();
        registry.register(DummyIndexer::named("search"));
        assert!(registry.unregister("search"));
        assert!(!registry.unregister("search"));
        assert!(registry.get("search").is_none());
    }

    #[test]
    fn test_all_is_name_ordered() {
        let registry = IndexerRegistry::new();
        registry.register(DummyIndexer::named("zeta"));
        registry.register(DummyIndexer::named("alpha"));
        let names: Vec<_> = registry.all().iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
