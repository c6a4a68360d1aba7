//! Storage engine module
//!
//! This module contains the storage engine components:
//! - Fixed-width row and schema codec
//! - File layout and I/O
//! - Persistent and materialized tables
//! - Sorted indexes

pub mod codec;
pub mod disk;
pub mod index;
pub mod table;

pub use disk::{DiskManager, ObjectKind};
pub use table::{materialize, MaterializedTable, PersistentTable, RowSource, Table};
