//! Record update hooks
//!
//! Hooks run before the row write of every create/update/delete, with the
//! change event passed mutably so a hook can enrich it. This is how the
//! index-filter snapshot gets onto events without the record store
//! knowing anything about indexing: the indexing layer registers a hook
//! at repository construction time.

use vellum_core::error::Result;
use vellum_core::event::ChangeEvent;
use vellum_core::record::Record;
use vellum_core::schema::SchemaRegistry;

/// Collaborators exposed to hooks
pub struct HookContext<'a> {
    /// The schema registry of the repository
    pub schema: &'a dyn SchemaRegistry,
}

/// A registration point invoked before create/update/delete
///
/// All methods default to no-ops so a hook only implements the operations
/// it cares about. A hook error aborts the mutation before anything is
/// written.
pub trait RecordUpdateHook: Send + Sync {
    /// Invoked before a create is written
    ///
    /// # Errors
    /// An error aborts the create.
    fn before_create(
        &self,
        record: &Record,
        event: &mut ChangeEvent,
        ctx: &HookContext<'_>,
    ) -> Result<()> {
        let _ = (record, event, ctx);
        Ok(())
    }

    /// Invoked before an update is written
    ///
    /// `original` is the freshly-read state the update is applied on top
    /// of; `record` is the incoming partial state.
    ///
    /// # Errors
    /// An error aborts the update.
    fn before_update(
        &self,
        record: &Record,
        original: &Record,
        event: &mut ChangeEvent,
        ctx: &HookContext<'_>,
    ) -> Result<()> {
        let _ = (record, original, event, ctx);
        Ok(())
    }

    /// Invoked before a delete removes the row
    ///
    /// # Errors
    /// An error aborts the delete.
    fn before_delete(
        &self,
        original: &Record,
        event: &mut ChangeEvent,
        ctx: &HookContext<'_>,
    ) -> Result<()> {
        let _ = (original, event, ctx);
        Ok(())
    }
}
