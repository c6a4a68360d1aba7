//! Error types for RowDB
//!
//! This module defines all error types used throughout the engine.

use thiserror::Error;

/// The main error type for RowDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Schema Errors ==========
    #[error("Schema error: table or index '{0}' not found")]
    SchemaNotFound(String),

    #[error("Schema error: table or index '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Schema error: {0}")]
    InvalidSchema(String),

    #[error("Schema error: invalid field type '{0}'")]
    InvalidFieldType(String),

    #[error("Schema error: field '{0}' not found in '{1}'")]
    FieldNotFound(String, String),

    #[error("Schema error: field '{0}' is ambiguous")]
    AmbiguousField(String),

    // ========== Encoding Errors ==========
    #[error("Encoding error: value of {length} bytes exceeds length {max} of field '{field}'")]
    EncodingOverflow {
        field: String,
        length: usize,
        max: usize,
    },

    #[error("Encoding error: invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },

    #[error("Encoding error: expected {expected} values, got {found}")]
    ValueCountMismatch { expected: usize, found: usize },

    // ========== Query Errors ==========
    #[error("Query error: unsupported operator '{0}'")]
    UnsupportedOperator(String),

    #[error("Parse error: {0}")]
    Parse(String),

    // ========== Storage Errors ==========
    #[error("Storage error: {0}")]
    Corrupted(String),

    #[error("Storage error: materialized table is full ({0} rows)")]
    CapacityExceeded(usize),

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    IoFailure(#[from] std::io::Error),
}

/// Result type alias for RowDB operations
pub type Result<T> = std::result::Result<T, Error>;
