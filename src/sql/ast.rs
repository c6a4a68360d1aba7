//! Request types
//!
//! Structured requests consumed by the execution engine. The text
//! protocol parser produces them, but any front end can build them
//! directly.

use crate::catalog::FieldDescriptor;

/// A request to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// CREATE TABLE ... ADD ... END
    CreateTable(CreateTable),
    /// INSERT INTO
    Insert(Insert),
    /// SELECT ... FROM ... WHERE ... END
    Select(Select),
    /// CREATE INDEX ... USING ... FROM ... END
    CreateIndex(CreateIndex),
    /// SHOW table or index
    ShowTable(String),
    /// DELETE (accepted, does nothing)
    Delete,
    /// DROP (accepted, does nothing)
    Drop,
    /// QUIT
    Quit,
}

/// CREATE TABLE
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

/// INSERT INTO
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    /// One textual value per field, in field order
    pub values: Vec<String>,
}

/// SELECT
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    /// Output fields: `name`, `table.name` or `*`
    pub fields: Vec<String>,
    /// Tables or indexes to read
    pub tables: Vec<String>,
    pub conditions: Vec<ConditionSpec>,
}

impl Select {
    /// Start a select over `tables` returning `fields`
    pub fn new<F, T>(fields: F, tables: T) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            tables: tables.into_iter().map(Into::into).collect(),
            conditions: Vec::new(),
        }
    }

    /// Add a condition joined with AND (the first one reads as WHERE)
    pub fn and(mut self, lhs: impl Into<String>, op: impl Into<String>, rhs: impl Into<String>) -> Self {
        self.conditions
            .push(ConditionSpec::new(Conjunction::And, lhs, op, rhs));
        self
    }

    /// Add a condition joined with OR
    pub fn or(mut self, lhs: impl Into<String>, op: impl Into<String>, rhs: impl Into<String>) -> Self {
        self.conditions
            .push(ConditionSpec::new(Conjunction::Or, lhs, op, rhs));
        self
    }
}

/// How a condition combines with the conditions before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

/// An unresolved `lhs op rhs` condition
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSpec {
    pub lhs: String,
    pub op: String,
    pub rhs: String,
    pub conjunction: Conjunction,
}

impl ConditionSpec {
    pub fn new(
        conjunction: Conjunction,
        lhs: impl Into<String>,
        op: impl Into<String>,
        rhs: impl Into<String>,
    ) -> Self {
        Self {
            lhs: lhs.into(),
            op: op.into(),
            rhs: rhs.into(),
            conjunction,
        }
    }
}

/// CREATE INDEX
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub name: String,
    /// Projected columns; the first one is the sort key
    pub columns: Vec<String>,
    pub source_table: String,
}
