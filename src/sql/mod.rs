//! Request layer
//!
//! Structured requests and the line-oriented text protocol that produces them.

pub mod ast;
pub mod parser;

pub use ast::{ConditionSpec, Conjunction, CreateIndex, CreateTable, Insert, Request, Select};
pub use parser::{parse_statement, StatementBuffer};
