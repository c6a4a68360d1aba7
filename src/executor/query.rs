//! Resolved queries
//!
//! A [`Query`] is a `SELECT` whose names have all been resolved against
//! open tables: fields are `(table, column)` pairs and conditions hold
//! either constants or column references.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::sql::Conjunction;
use crate::storage::Table;

/// Position of a table in [`Query::tables`]
pub type TableId = usize;

/// A resolved output field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryField {
    pub table: TableId,
    pub name: String,
    pub col: usize,
}

/// One side of a condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Constant(String),
    Field { table: TableId, col: usize },
}

impl Literal {
    pub fn is_constant(&self) -> bool {
        matches!(self, Literal::Constant(_))
    }

    /// `(table, column)` of a field reference
    pub fn field(&self) -> Option<(TableId, usize)> {
        match self {
            Literal::Field { table, col } => Some((*table, *col)),
            Literal::Constant(_) => None,
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(Operator::Eq),
            other => Err(Error::UnsupportedOperator(other.to_string())),
        }
    }
}

/// A resolved condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub left: Literal,
    pub right: Literal,
    pub conjunction: Conjunction,
    pub operator: Operator,
}

impl Condition {
    /// Both sides reference columns of two different tables
    pub fn is_join(&self) -> bool {
        match (self.left.field(), self.right.field()) {
            (Some((a, _)), Some((b, _))) => a != b,
            _ => false,
        }
    }

    /// The single table a non-join condition reads, if any
    pub fn owner(&self) -> Option<TableId> {
        self.left
            .field()
            .or_else(|| self.right.field())
            .map(|(table, _)| table)
    }

    /// Evaluate against one row; `cell` decodes a referenced column
    pub fn matches<F>(&self, cell: &mut F) -> Result<bool>
    where
        F: FnMut(TableId, usize) -> Result<String>,
    {
        let left = resolve(&self.left, cell)?;
        let right = resolve(&self.right, cell)?;
        match self.operator {
            Operator::Eq => Ok(left == right),
        }
    }

    /// Rewrite column references through `map`
    pub fn remap<F>(&self, mut map: F) -> Result<Condition>
    where
        F: FnMut(TableId, usize) -> Result<(TableId, usize)>,
    {
        let mut remap_literal = |literal: &Literal| -> Result<Literal> {
            Ok(match literal {
                Literal::Constant(value) => Literal::Constant(value.clone()),
                Literal::Field { table, col } => {
                    let (table, col) = map(*table, *col)?;
                    Literal::Field { table, col }
                }
            })
        };
        Ok(Condition {
            left: remap_literal(&self.left)?,
            right: remap_literal(&self.right)?,
            conjunction: self.conjunction,
            operator: self.operator,
        })
    }
}

fn resolve<F>(literal: &Literal, cell: &mut F) -> Result<String>
where
    F: FnMut(TableId, usize) -> Result<String>,
{
    match literal {
        Literal::Constant(value) => Ok(value.clone()),
        Literal::Field { table, col } => cell(*table, *col),
    }
}

/// Fold condition results left to right, starting from `true`.
///
/// Each condition combines with the running result through its own
/// conjunction; there is no precedence grouping, so
/// `a OR b AND c` reads as `(a OR b) AND c`.
pub fn fold<'a, I, F>(conditions: I, mut cell: F) -> Result<bool>
where
    I: IntoIterator<Item = &'a Condition>,
    F: FnMut(TableId, usize) -> Result<String>,
{
    let mut acc = true;
    for condition in conditions {
        let result = condition.matches(&mut cell)?;
        acc = match condition.conjunction {
            Conjunction::And => acc && result,
            Conjunction::Or => acc || result,
        };
    }
    Ok(acc)
}

/// A `SELECT` resolved against open tables
#[derive(Debug)]
pub struct Query {
    pub tables: Vec<Table>,
    pub fields: Vec<QueryField>,
    pub conditions: Vec<Condition>,
}
