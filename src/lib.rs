//! RowDB - A small file-backed relational engine written in Rust
//!
//! This library provides the core components:
//! - Line-oriented request protocol (parser, requests)
//! - Storage engine (fixed-width rows, schema files, sorted indexes)
//! - Query execution (planner, filters, nested-loop joins)
//! - Table catalog

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod sql;
pub mod storage;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use executor::{ExecutionEngine, QueryResult, ResultRows};
