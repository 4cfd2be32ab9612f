//! In-memory cell store
//!
//! A single `RwLock` over the row map: every write path takes the write
//! lock, so multi-cell writes are atomic and compare-and-swap is
//! linearizable by construction. This is the embedding/test substrate;
//! shared deployments put a networked implementation behind the same
//! trait.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::HashMap;

use vellum_core::error::Result;

use crate::cell::{CellOp, Column, RowWrite};
use crate::store::{CellStore, RowSnapshot};

type RowData = HashMap<Column, BTreeMap<u64, Vec<u8>>>;

/// Single-slot puts live at a fixed version key.
const SLOT: u64 = 0;

/// In-memory, linearizable cell store
#[derive(Debug, Default)]
pub struct MemoryCellStore {
    rows: RwLock<HashMap<Vec<u8>, RowData>>,
}

impl MemoryCellStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored
    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    fn apply(row: &mut RowData, write: RowWrite) {
        for op in write.ops() {
            match op {
                CellOp::Put { column, value } => {
                    let cell = row.entry(column.clone()).or_default();
                    cell.clear();
                    cell.insert(SLOT, value.clone());
                }
                CellOp::PutVersioned {
                    column,
                    version,
                    value,
                } => {
                    row.entry(column.clone())
                        .or_default()
                        .insert(*version, value.clone());
                }
                CellOp::Clear { column } => {
                    row.remove(column);
                }
            }
        }
    }

    fn guard_matches(row: Option<&RowData>, guard: &Column, expected: Option<&[u8]>) -> bool {
        let current = row
            .and_then(|cells| cells.get(guard))
            .and_then(|versions| versions.iter().next_back())
            .map(|(_, v)| v.as_slice());
        match expected {
            // Absent and empty are deliberately indistinguishable: the
            // substrate contract treats a cleared cell like a missing one.
            None => current.is_none() || current == Some(&[]),
            Some(e) => current == Some(e),
        }
    }
}

impl CellStore for MemoryCellStore {
    fn read_row(&self, row: &[u8]) -> Result<Option<RowSnapshot>> {
        let rows = self.rows.read();
        Ok(rows
            .get(row)
            .filter(|cells| !cells.is_empty())
            .map(|cells| RowSnapshot::new(cells.clone())))
    }

    fn get(&self, row: &[u8], column: &Column) -> Result<Option<Vec<u8>>> {
        let rows = self.rows.read();
        Ok(rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .and_then(|versions| versions.iter().next_back())
            .map(|(_, v)| v.clone()))
    }

    fn row_exists(&self, row: &[u8]) -> Result<bool> {
        let rows = self.rows.read();
        Ok(rows.get(row).is_some_and(|cells| !cells.is_empty()))
    }

    fn write(&self, row: &[u8], write: RowWrite) -> Result<()> {
        let mut rows = self.rows.write();
        let data = rows.entry(row.to_vec()).or_default();
        Self::apply(data, write);
        Ok(())
    }

    fn checked_write(
        &self,
        row: &[u8],
        guard: &Column,
        expected: Option<&[u8]>,
        write: RowWrite,
    ) -> Result<bool> {
        let mut rows = self.rows.write();
        if !Self::guard_matches(rows.get(row), guard, expected) {
            return Ok(false);
        }
        let data = rows.entry(row.to_vec()).or_default();
        Self::apply(data, write);
        Ok(true)
    }

    fn compare_and_swap(
        &self,
        row: &[u8],
        column: &Column,
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> Result<bool> {
        let mut rows = self.rows.write();
        if !Self::guard_matches(rows.get(row), column, expected) {
            return Ok(false);
        }
        match new {
            Some(value) => {
                let data = rows.entry(row.to_vec()).or_default();
                let cell = data.entry(column.clone()).or_default();
                cell.clear();
                cell.insert(SLOT, value);
            }
            None => {
                let emptied = match rows.get_mut(row) {
                    Some(data) => {
                        data.remove(column);
                        data.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    rows.remove(row);
                }
            }
        }
        Ok(true)
    }

    fn delete_row(&self, row: &[u8]) -> Result<()> {
        self.rows.write().remove(row);
        Ok(())
    }

    fn checked_delete_row(
        &self,
        row: &[u8],
        guard: &Column,
        expected: Option<&[u8]>,
    ) -> Result<bool> {
        let mut rows = self.rows.write();
        if !Self::guard_matches(rows.get(row), guard, expected) {
            return Ok(false);
        }
        rows.remove(row);
        Ok(true)
    }
}
