//! Atomic cell substrate for the Vellum record store
//!
//! This crate defines the [`CellStore`] contract the record store is built
//! on: a keyed store of (row, column) cells with multi-version reads, an
//! atomic multi-cell write per row, and a linearizable single-cell
//! compare-and-swap. Everything above this layer — row locks, versioned
//! records, change propagation — derives its correctness from the CAS
//! guarantee alone.
//!
//! [`MemoryCellStore`] is the in-process implementation: a single
//! `RwLock` over the row map makes every write and CAS trivially
//! linearizable. Networked backends implement the same trait.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod memory;
pub mod store;

pub use cell::{CellOp, Column, RowWrite};
pub use memory::MemoryCellStore;
pub use store::{CellStore, RowSnapshot};
