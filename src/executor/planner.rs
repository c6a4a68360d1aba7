//! Query Planner for RowDB
//!
//! This module opens the tables a `SELECT` names and resolves its field
//! names and conditions into a [`Query`].

use tracing::debug;

use super::query::{Condition, Literal, Query, QueryField, TableId};
use crate::error::{Error, Result};
use crate::sql::ast::{ConditionSpec, Select};
use crate::storage::{index, DiskManager, PersistentTable, RowSource, Table};

/// Open a table by name, falling back to an index of that name
pub fn open_table(disk: &DiskManager, name: &str) -> Result<Table> {
    match PersistentTable::open(disk, name) {
        Ok(table) => Ok(Table::Persistent(table)),
        Err(Error::SchemaNotFound(_)) => match index::load(disk, name) {
            Ok(index) => Ok(Table::Materialized(index)),
            Err(Error::SchemaNotFound(_)) => Err(Error::SchemaNotFound(name.to_string())),
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    }
}

/// Query planner
pub struct Planner<'a> {
    disk: &'a DiskManager,
}

impl<'a> Planner<'a> {
    /// Create a new planner
    pub fn new(disk: &'a DiskManager) -> Self {
        Self { disk }
    }

    /// Resolve a `SELECT` into a query over open tables
    pub fn plan(&self, select: &Select) -> Result<Query> {
        if select.tables.is_empty() {
            return Err(Error::Parse("SELECT needs at least one table".to_string()));
        }

        let mut tables = Vec::with_capacity(select.tables.len());
        for (i, name) in select.tables.iter().enumerate() {
            if select.tables[..i].contains(name) {
                return Err(Error::InvalidSchema(format!(
                    "table '{}' listed twice",
                    name
                )));
            }
            tables.push(open_table(self.disk, name)?);
        }

        let mut fields = Vec::new();
        for name in &select.fields {
            if name == "*" {
                for (table, t) in tables.iter().enumerate() {
                    for (col, field) in t.schema().fields.iter().enumerate() {
                        fields.push(QueryField {
                            table,
                            name: field.name.clone(),
                            col,
                        });
                    }
                }
                continue;
            }
            let (table, col) = resolve_field(&tables, name)?;
            fields.push(QueryField {
                table,
                name: tables[table].schema().fields[col].name.clone(),
                col,
            });
        }

        let conditions = select
            .conditions
            .iter()
            .map(|spec| resolve_condition(&tables, spec))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            tables = ?select.tables,
            fields = fields.len(),
            conditions = conditions.len(),
            "query planned"
        );

        Ok(Query {
            tables,
            fields,
            conditions,
        })
    }
}

fn resolve_condition(tables: &[Table], spec: &ConditionSpec) -> Result<Condition> {
    let operator = spec.op.parse()?;
    let mut left = resolve_literal(tables, &spec.lhs)?;
    let mut right = resolve_literal(tables, &spec.rhs)?;

    // Field references go first
    if left.is_constant() && !right.is_constant() {
        std::mem::swap(&mut left, &mut right);
    }

    Ok(Condition {
        left,
        right,
        conjunction: spec.conjunction,
        operator,
    })
}

/// A quoted string or a number is a constant; anything else names a field
fn resolve_literal(tables: &[Table], term: &str) -> Result<Literal> {
    if let Some(quoted) = term.strip_prefix('"') {
        let value = quoted.strip_suffix('"').unwrap_or(quoted);
        return Ok(Literal::Constant(value.to_string()));
    }
    if is_numeric(term) {
        return Ok(Literal::Constant(term.to_string()));
    }
    let (table, col) = resolve_field(tables, term)?;
    Ok(Literal::Field { table, col })
}

fn is_numeric(term: &str) -> bool {
    let digits = term.strip_prefix('-').unwrap_or(term);
    digits.chars().next().map_or(false, |c| c.is_ascii_digit())
}

/// Resolve `field` or `table.field` to `(table, column)`
pub fn resolve_field(tables: &[Table], name: &str) -> Result<(TableId, usize)> {
    if let Some((table_name, field)) = name.split_once('.') {
        let table = tables
            .iter()
            .position(|t| t.name() == table_name)
            .ok_or_else(|| Error::SchemaNotFound(table_name.to_string()))?;
        let col = tables[table].schema().field_index(field)?;
        return Ok((table, col));
    }

    let mut found = tables
        .iter()
        .enumerate()
        .filter_map(|(table, t)| t.schema().find_field(name).map(|col| (table, col)));
    match (found.next(), found.next()) {
        (Some(hit), None) => Ok(hit),
        (Some(_), Some(_)) => Err(Error::AmbiguousField(name.to_string())),
        (None, _) => Err(Error::FieldNotFound(
            name.to_string(),
            tables
                .iter()
                .map(|t| t.name().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )),
    }
}
