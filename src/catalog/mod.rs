//! Catalog module
//!
//! This module contains schema definitions and field types.

pub mod schema;
pub mod types;

pub use schema::{FieldDescriptor, TableInfo, TableSchema};
pub use types::FieldType;
