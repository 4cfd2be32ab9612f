//! Record instantiation
//!
//! The repository never decides the concrete record representation on its
//! own: an explicit factory is supplied by the caller at construction
//! time and used for every record the store materializes. Embedders that
//! pre-populate defaults (attributes, fixed fields) plug in here.

use vellum_core::id::RecordId;
use vellum_core::record::Record;

/// Factory for the records the repository materializes on reads
pub trait RecordFactory: Send + Sync {
    /// Create an empty record, with the given id when known
    fn new_record(&self, id: Option<RecordId>) -> Record;
}

/// Plain [`Record`] factory
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRecordFactory;

impl RecordFactory for DefaultRecordFactory {
    fn new_record(&self, id: Option<RecordId>) -> Record {
        match id {
            Some(id) => Record::with_id(id),
            None => Record::new(),
        }
    }
}
