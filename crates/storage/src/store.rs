//! The CellStore contract
//!
//! The record store consumes the substrate exclusively through this trait.
//! The substrate must provide:
//!
//! - linearizable single-cell compare-and-swap, visible across all
//!   processes sharing the store
//! - atomic multi-cell writes within one row (no cross-row atomicity)
//! - multi-version reads per cell
//!
//! Guarded writes (`checked_write`, `checked_delete_row`) condition an
//! entire row write on one guard cell's current value; the row lock
//! manager uses these to make lease-guarded mutations a single substrate
//! operation.

use std::collections::BTreeMap;
use std::collections::HashMap;

use vellum_core::error::Result;

use crate::cell::{Column, RowWrite};

/// Point-in-time copy of one row: all columns, all versions
///
/// Versioned cells map version number to value bytes; single-slot cells
/// hold exactly one entry. `at_version` resolves the value active at a
/// probe: the entry with the greatest version <= probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSnapshot {
    cells: HashMap<Column, BTreeMap<u64, Vec<u8>>>,
}

impl RowSnapshot {
    /// Build a snapshot from raw cell data
    pub fn new(cells: HashMap<Column, BTreeMap<u64, Vec<u8>>>) -> Self {
        Self { cells }
    }

    /// Latest value of a cell
    pub fn latest(&self, column: &Column) -> Option<&[u8]> {
        self.cells
            .get(column)
            .and_then(|versions| versions.iter().next_back())
            .map(|(_, v)| v.as_slice())
    }

    /// Value active at `probe`: greatest version <= probe
    pub fn at_version(&self, column: &Column, probe: u64) -> Option<&[u8]> {
        self.cells
            .get(column)
            .and_then(|versions| versions.range(..=probe).next_back())
            .map(|(_, v)| v.as_slice())
    }

    /// Full version history of a cell
    pub fn versions(&self, column: &Column) -> Option<&BTreeMap<u64, Vec<u8>>> {
        self.cells.get(column)
    }

    /// Iterate the columns of one family
    pub fn family_columns(
        &self,
        family: &str,
    ) -> impl Iterator<Item = (&Column, &BTreeMap<u64, Vec<u8>>)> {
        let family = family.to_string();
        self.cells
            .iter()
            .filter(move |(column, _)| column.family == family)
    }

    /// Whether the snapshot holds no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Atomic keyed cell store: the substrate under the record store
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (and, for shared backends, from multiple processes).
pub trait CellStore: Send + Sync {
    /// Read a full row; None when the row does not exist
    ///
    /// # Errors
    /// Returns an error if the substrate operation fails.
    fn read_row(&self, row: &[u8]) -> Result<Option<RowSnapshot>>;

    /// Latest value of one cell
    ///
    /// # Errors
    /// Returns an error if the substrate operation fails.
    fn get(&self, row: &[u8], column: &Column) -> Result<Option<Vec<u8>>>;

    /// Whether any cell exists for the row
    ///
    /// # Errors
    /// Returns an error if the substrate operation fails.
    fn row_exists(&self, row: &[u8]) -> Result<bool>;

    /// Apply a multi-cell write atomically
    ///
    /// # Errors
    /// Returns an error if the substrate operation fails.
    fn write(&self, row: &[u8], write: RowWrite) -> Result<()>;

    /// Apply a write only if the guard cell currently holds `expected`
    ///
    /// `expected = None` matches an absent or empty guard cell — a brand
    /// new row and an explicitly cleared cell are indistinguishable here.
    /// Returns whether the write was applied.
    ///
    /// # Errors
    /// Returns an error if the substrate operation fails.
    fn checked_write(
        &self,
        row: &[u8],
        guard: &Column,
        expected: Option<&[u8]>,
        write: RowWrite,
    ) -> Result<bool>;

    /// Atomic compare-and-swap on one cell
    ///
    /// `expected = None` matches absent-or-empty; `new = None` clears the
    /// cell. Returns whether the swap was applied.
    ///
    /// # Errors
    /// Returns an error if the substrate operation fails.
    fn compare_and_swap(
        &self,
        row: &[u8],
        column: &Column,
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> Result<bool>;

    /// Remove a row and all its cells
    ///
    /// # Errors
    /// Returns an error if the substrate operation fails.
    fn delete_row(&self, row: &[u8]) -> Result<()>;

    /// Remove a row only if the guard cell currently holds `expected`
    ///
    /// Returns whether the row was removed.
    ///
    /// # Errors
    /// Returns an error if the substrate operation fails.
    fn checked_delete_row(
        &self,
        row: &[u8],
        guard: &Column,
        expected: Option<&[u8]>,
    ) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(column: Column, versions: &[(u64, &[u8])]) -> RowSnapshot {
        let mut cells = HashMap::new();
        cells.insert(
            column,
            versions
                .iter()
                .map(|(v, bytes)| (*v, bytes.to_vec()))
                .collect(),
        );
        RowSnapshot::new(cells)
    }

    #[test]
    fn test_snapshot_latest_and_point_in_time() {
        let col = Column::new("vfields", b"f".to_vec());
        let snap = snapshot_with(col.clone(), &[(1, b"one"), (3, b"three")]);

        assert_eq!(snap.latest(&col), Some(b"three".as_slice()));
        assert_eq!(snap.at_version(&col, 1), Some(b"one".as_slice()));
        assert_eq!(snap.at_version(&col, 2), Some(b"one".as_slice()));
        assert_eq!(snap.at_version(&col, 3), Some(b"three".as_slice()));
        assert_eq!(snap.at_version(&col, 0), None);
    }

    #[test]
    fn test_snapshot_family_iteration() {
        let mut cells = HashMap::new();
        cells.insert(
            Column::new("fields", b"a".to_vec()),
            BTreeMap::from([(0u64, b"x".to_vec())]),
        );
        cells.insert(
            Column::new("vfields", b"b".to_vec()),
            BTreeMap::from([(1u64, b"y".to_vec())]),
        );
        let snap = RowSnapshot::new(cells);
        let fields: Vec<_> = snap.family_columns("fields").collect();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0.qualifier, b"a".to_vec());
    }
}
