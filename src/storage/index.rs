//! Sorted indexes for RowDB
//!
//! An index is a materialized projection of some columns of a table,
//! sorted on its first column and stored as `<name>.index` /
//! `<name>.index.bin`. It is built once, loaded whole, and searched with a
//! binary search on column 0.
//!
//! Rows are ordered by the typed value of column 0: numeric order for
//! integers, byte order for char text. Equal keys keep the order of the
//! source table.

use std::cmp::Ordering;
use std::ops::Range;

use tracing::{debug, info};

use super::codec;
use super::disk::{DiskManager, ObjectKind};
use super::table::{MaterializedTable, RowSource};
use crate::catalog::{FieldType, TableSchema};
use crate::error::{Error, Result};

/// Project `columns` of every row of `source` and sort on the first one
pub fn build<S: RowSource + ?Sized>(
    name: &str,
    source: &mut S,
    columns: &[String],
) -> Result<MaterializedTable> {
    if columns.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "index '{}' needs at least one column",
            name
        )));
    }
    let cols = columns
        .iter()
        .map(|c| source.schema().field_index(c))
        .collect::<Result<Vec<_>>>()?;
    let fields = cols
        .iter()
        .map(|&c| source.schema().fields[c].clone())
        .collect();
    let schema = TableSchema::new(name, fields);
    schema.validate()?;

    let rows = source.row_count();
    let mut index = MaterializedTable::with_rows(schema, rows);
    for row in 0..rows {
        for (dest, &col) in cols.iter().enumerate() {
            let bytes = source.read_cell(row, col)?.into_owned();
            index.set_cell(row, dest, &bytes)?;
        }
    }

    let key = index.schema().fields[0].clone();
    let key_size = codec::field_size(&key);
    index.sort_rows_by(|a, b| {
        codec::compare_cells(&a[..key_size], &b[..key_size], key.field_type)
    })?;

    debug!(index = name, source = %source.name(), rows, "index built");
    Ok(index)
}

/// Write the schema record and the sorted rows
pub fn persist(disk: &DiskManager, index: &MaterializedTable) -> Result<()> {
    let schema = index.schema();
    disk.write_all_rows(&schema.name, ObjectKind::Index, index.as_bytes())?;
    disk.write_schema(schema, ObjectKind::Index)?;
    info!(index = %schema.name, rows = schema.row_count, "index persisted");
    Ok(())
}

/// Load a whole index into memory
pub fn load(disk: &DiskManager, name: &str) -> Result<MaterializedTable> {
    let schema = disk.read_schema(name, ObjectKind::Index)?;
    let len = schema
        .row_size()
        .checked_mul(schema.row_count)
        .ok_or_else(|| {
            Error::Corrupted(format!(
                "index '{}' declares {} rows",
                name, schema.row_count
            ))
        })?;
    let data = disk.read_all_rows(name, ObjectKind::Index, len)?;
    debug!(index = name, rows = schema.row_count, "index loaded");
    MaterializedTable::from_bytes(schema, data)
}

/// Rows whose column 0 equals `key`, as a range of row indexes.
///
/// An empty range means the key is not present. Duplicate keys are all
/// returned, in stored order.
pub fn lookup(index: &MaterializedTable, key: &str) -> Result<Range<usize>> {
    let field_type = match index.schema().fields.first() {
        Some(field) => field.field_type,
        None => return Ok(0..0),
    };
    // Equality is on display strings, so "010" or "+10" never matches 10
    if field_type == FieldType::Integer && !is_canonical_integer(key) {
        return Ok(0..0);
    }
    let rows = index.row_count();

    // First row not below the key
    let lower = partition_point(rows, |row| {
        Ok(codec::compare_key(index.cell(row, 0)?, key, field_type)? == Some(Ordering::Less))
    })?;
    // First row above the key
    let upper = partition_point(rows, |row| {
        Ok(matches!(
            codec::compare_key(index.cell(row, 0)?, key, field_type)?,
            Some(Ordering::Less | Ordering::Equal)
        ))
    })?;

    Ok(lower..upper.max(lower))
}

fn is_canonical_integer(key: &str) -> bool {
    key.parse::<i64>()
        .map_or(false, |parsed| parsed.to_string() == key)
}

/// Binary search for the first row where `pred` turns false
fn partition_point<F>(rows: usize, mut pred: F) -> Result<usize>
where
    F: FnMut(usize) -> Result<bool>,
{
    let (mut lo, mut hi) = (0, rows);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid)? {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}
