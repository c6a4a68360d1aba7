//! Query execution module
//!
//! This module contains the query planner, the join machinery and the
//! execution engine.

pub mod executor;
pub mod join;
pub mod planner;
pub mod query;
pub mod result_set;

pub use executor::{ExecutionEngine, QueryResult, ResultRows, Row};
pub use planner::Planner;
pub use query::{Condition, Literal, Operator, Query, QueryField};
pub use result_set::{ResultSet, ResultSets};
