//! Table storage for RowDB
//!
//! Two kinds of table share one row layout: a persistent table backed by
//! its row store file, and a materialized table holding its rows in an
//! owned buffer. Both are read through [`RowSource`].

use std::borrow::Cow;
use std::fs::File;

use tracing::debug;

use super::codec;
use super::disk::{DiskManager, ObjectKind};
use crate::catalog::TableSchema;
use crate::error::{Error, Result};

/// Read access shared by every kind of table
pub trait RowSource {
    /// Table schema
    fn schema(&self) -> &TableSchema;

    /// Encoded bytes of one cell
    fn read_cell(&mut self, row: usize, col: usize) -> Result<Cow<'_, [u8]>>;

    /// Encoded bytes of one full row
    fn read_row(&mut self, row: usize) -> Result<Cow<'_, [u8]>>;

    /// Number of rows stored
    fn row_count(&self) -> usize {
        self.schema().row_count
    }

    /// Table name
    fn name(&self) -> &str {
        &self.schema().name
    }

    /// Display string of one cell
    fn decode_cell(&mut self, row: usize, col: usize) -> Result<String> {
        let field_type = self
            .schema()
            .fields
            .get(col)
            .map(|f| f.field_type)
            .ok_or_else(|| {
                Error::Corrupted(format!(
                    "column {} out of range in '{}'",
                    col,
                    self.schema().name
                ))
            })?;
        let bytes = self.read_cell(row, col)?;
        codec::decode(&bytes, field_type)
    }
}

/// A table persisted in `<name>.table` / `<name>.bin`
#[derive(Debug)]
pub struct PersistentTable {
    schema: TableSchema,
    file: File,
    disk: DiskManager,
}

impl PersistentTable {
    /// Create the schema record and an empty row store
    pub fn create(disk: &DiskManager, mut schema: TableSchema) -> Result<Self> {
        schema.validate()?;
        if disk.exists(&schema.name, ObjectKind::Table) || disk.exists(&schema.name, ObjectKind::Index)
        {
            return Err(Error::TableAlreadyExists(schema.name));
        }
        schema.row_count = 0;
        disk.write_schema(&schema, ObjectKind::Table)?;
        disk.write_all_rows(&schema.name, ObjectKind::Table, &[])?;
        let file = disk.open_rows(&schema.name, ObjectKind::Table)?;
        Ok(Self {
            schema,
            file,
            disk: disk.clone(),
        })
    }

    /// Open an existing table from disk
    pub fn open(disk: &DiskManager, name: &str) -> Result<Self> {
        let schema = disk.read_schema(name, ObjectKind::Table)?;
        let file = disk.open_rows(name, ObjectKind::Table)?;
        debug!(table = name, rows = schema.row_count, "table opened");
        Ok(Self {
            schema,
            file,
            disk: disk.clone(),
        })
    }

    /// Encode and append one row, then persist the new row count
    pub fn append(&mut self, values: &[String]) -> Result<usize> {
        let bytes = codec::encode_row(values, &self.schema.fields)?;
        let row = self.schema.row_count;
        self.disk
            .write_row(&mut self.file, &self.schema, row, &bytes)?;
        self.schema.row_count += 1;
        if let Err(e) = self.disk.write_schema(&self.schema, ObjectKind::Table) {
            self.schema.row_count -= 1;
            return Err(e);
        }
        Ok(row)
    }

    /// Release the row store handle
    pub fn close(self) {
        debug!(table = %self.schema.name, "table closed");
    }
}

impl RowSource for PersistentTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn read_cell(&mut self, row: usize, col: usize) -> Result<Cow<'_, [u8]>> {
        let bytes = self
            .disk
            .read_field(&mut self.file, &self.schema, row, col)?;
        Ok(Cow::Owned(bytes))
    }

    fn read_row(&mut self, row: usize) -> Result<Cow<'_, [u8]>> {
        let bytes = self.disk.read_row(&mut self.file, &self.schema, row)?;
        Ok(Cow::Owned(bytes))
    }
}

/// An owned in-memory table with a fixed row capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedTable {
    schema: TableSchema,
    data: Vec<u8>,
    capacity: usize,
}

impl MaterializedTable {
    /// Allocate room for `capacity` rows, none of them filled
    pub fn new(mut schema: TableSchema, capacity: usize) -> Self {
        schema.row_count = 0;
        let data = vec![0u8; schema.row_size() * capacity];
        Self {
            schema,
            data,
            capacity,
        }
    }

    /// Allocate `row_count` zeroed rows, ready for `set_cell`
    pub fn with_rows(schema: TableSchema, row_count: usize) -> Self {
        let mut table = Self::new(schema, row_count);
        table.schema.row_count = row_count;
        table
    }

    /// Wrap a buffer holding `schema.row_count` complete rows
    pub fn from_bytes(schema: TableSchema, data: Vec<u8>) -> Result<Self> {
        let expected = schema.row_size() * schema.row_count;
        if data.len() != expected {
            return Err(Error::Corrupted(format!(
                "'{}' needs {} bytes of rows, got {}",
                schema.name,
                expected,
                data.len()
            )));
        }
        let capacity = schema.row_count;
        Ok(Self {
            schema,
            data,
            capacity,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.schema.row_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Filled rows as one contiguous buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.schema.row_size() * self.schema.row_count]
    }

    /// Borrow one cell
    pub fn cell(&self, row: usize, col: usize) -> Result<&[u8]> {
        let range = self.cell_range(row, col)?;
        Ok(&self.data[range])
    }

    /// Borrow one row
    pub fn row(&self, row: usize) -> Result<&[u8]> {
        self.check_row(row)?;
        let start = codec::offset(&self.schema.fields, row, 0);
        Ok(&self.data[start..start + self.schema.row_size()])
    }

    /// Overwrite one cell; `bytes` must be exactly the field's encoded size
    pub fn set_cell(&mut self, row: usize, col: usize, bytes: &[u8]) -> Result<()> {
        let range = self.cell_range(row, col)?;
        if bytes.len() != range.len() {
            return Err(Error::Corrupted(format!(
                "cell ({}, {}) of '{}' is {} bytes, got {}",
                row,
                col,
                self.schema.name,
                range.len(),
                bytes.len()
            )));
        }
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Append one full row
    pub fn push_row(&mut self, bytes: &[u8]) -> Result<()> {
        if self.schema.row_count >= self.capacity {
            return Err(Error::CapacityExceeded(self.capacity));
        }
        if bytes.len() != self.schema.row_size() {
            return Err(Error::Corrupted(format!(
                "row for '{}' must be {} bytes, got {}",
                self.schema.name,
                self.schema.row_size(),
                bytes.len()
            )));
        }
        let start = codec::offset(&self.schema.fields, self.schema.row_count, 0);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.schema.row_count += 1;
        Ok(())
    }

    /// Append a row made of two rows laid side by side
    pub fn push_concat(&mut self, left: &[u8], right: &[u8]) -> Result<()> {
        let mut row = Vec::with_capacity(left.len() + right.len());
        row.extend_from_slice(left);
        row.extend_from_slice(right);
        self.push_row(&row)
    }

    /// Reorder filled rows by `compare`, keeping equal rows in place order
    pub fn sort_rows_by<F>(&mut self, mut compare: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<std::cmp::Ordering>,
    {
        let row_size = self.schema.row_size();
        let filled = self.as_bytes();
        let mut rows: Vec<&[u8]> = if row_size == 0 {
            Vec::new()
        } else {
            filled.chunks(row_size).collect()
        };

        let mut failure = None;
        rows.sort_by(|a, b| match compare(a, b) {
            Ok(ord) => ord,
            Err(e) => {
                failure.get_or_insert(e);
                std::cmp::Ordering::Equal
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let sorted: Vec<u8> = rows.concat();
        self.data[..sorted.len()].copy_from_slice(&sorted);
        Ok(())
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.schema.row_count {
            return Err(Error::Corrupted(format!(
                "row {} out of range in '{}' ({} rows)",
                row, self.schema.name, self.schema.row_count
            )));
        }
        Ok(())
    }

    fn cell_range(&self, row: usize, col: usize) -> Result<std::ops::Range<usize>> {
        self.check_row(row)?;
        let field = self.schema.fields.get(col).ok_or_else(|| {
            Error::Corrupted(format!(
                "column {} out of range in '{}'",
                col, self.schema.name
            ))
        })?;
        let start = codec::offset(&self.schema.fields, row, col);
        Ok(start..start + codec::field_size(field))
    }
}

impl RowSource for MaterializedTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn read_cell(&mut self, row: usize, col: usize) -> Result<Cow<'_, [u8]>> {
        self.cell(row, col).map(Cow::Borrowed)
    }

    fn read_row(&mut self, row: usize) -> Result<Cow<'_, [u8]>> {
        self.row(row).map(Cow::Borrowed)
    }
}

/// Copy the rows of `source` whose mask entry is true, keeping row order
pub fn materialize<S: RowSource + ?Sized>(source: &mut S, mask: &[bool]) -> Result<MaterializedTable> {
    let rows = source.row_count();
    if mask.len() != rows {
        return Err(Error::Corrupted(format!(
            "mask of {} entries for '{}' with {} rows",
            mask.len(),
            source.name(),
            rows
        )));
    }
    let included = mask.iter().filter(|&&keep| keep).count();
    let mut table = MaterializedTable::new(source.schema().clone(), included);
    for row in (0..rows).filter(|&r| mask[r]) {
        let bytes = source.read_row(row)?.into_owned();
        table.push_row(&bytes)?;
    }
    debug!(
        table = %table.schema.name,
        rows,
        included,
        "materialized"
    );
    Ok(table)
}

/// An open table of either kind
#[derive(Debug)]
pub enum Table {
    Persistent(PersistentTable),
    Materialized(MaterializedTable),
}

impl RowSource for Table {
    fn schema(&self) -> &TableSchema {
        match self {
            Table::Persistent(t) => t.schema(),
            Table::Materialized(t) => RowSource::schema(t),
        }
    }

    fn read_cell(&mut self, row: usize, col: usize) -> Result<Cow<'_, [u8]>> {
        match self {
            Table::Persistent(t) => t.read_cell(row, col),
            Table::Materialized(t) => t.read_cell(row, col),
        }
    }

    fn read_row(&mut self, row: usize) -> Result<Cow<'_, [u8]>> {
        match self {
            Table::Persistent(t) => t.read_row(row),
            Table::Materialized(t) => t.read_row(row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDescriptor;
    use crate::config::EngineConfig;
    use tempfile::TempDir;

    fn schema() -> TableSchema {
        TableSchema::new(
            "users",
            vec![FieldDescriptor::integer("id"), FieldDescriptor::char("name", 6)],
        )
    }

    fn values(id: i64, name: &str) -> Vec<String> {
        vec![id.to_string(), name.to_string()]
    }

    fn create_test_table() -> (TempDir, DiskManager, PersistentTable) {
        let dir = TempDir::new().unwrap();
        let disk = DiskManager::new(&EngineConfig::new().data_dir(dir.path()));
        let table = PersistentTable::create(&disk, schema()).unwrap();
        (dir, disk, table)
    }

    #[test]
    fn test_table_append() {
        let (_dir, _disk, mut table) = create_test_table();

        assert_eq!(table.append(&values(1, "alice")).unwrap(), 0);
        assert_eq!(table.append(&values(2, "bob")).unwrap(), 1);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.decode_cell(1, 1).unwrap(), "bob");
        assert_eq!(table.decode_cell(0, 0).unwrap(), "1");
    }

    #[test]
    fn test_table_reopen() {
        let (_dir, disk, mut table) = create_test_table();
        table.append(&values(7, "zed")).unwrap();
        let before = table.read_row(0).unwrap().into_owned();
        table.close();

        let mut reopened = PersistentTable::open(&disk, "users").unwrap();
        assert_eq!(reopened.row_count(), 1);
        assert_eq!(reopened.schema(), &{
            let mut s = schema();
            s.row_count = 1;
            s
        });
        assert_eq!(reopened.read_row(0).unwrap().into_owned(), before);
    }

    #[test]
    fn test_table_rejects_bad_rows() {
        let (_dir, _disk, mut table) = create_test_table();

        assert!(matches!(
            table.append(&values(1, "toolong")),
            Err(Error::EncodingOverflow { .. })
        ));
        assert!(matches!(
            table.append(&["1".to_string()]),
            Err(Error::ValueCountMismatch { .. })
        ));
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_table_already_exists() {
        let (_dir, disk, _table) = create_test_table();
        assert!(matches!(
            PersistentTable::create(&disk, schema()),
            Err(Error::TableAlreadyExists(_))
        ));
    }

    #[test]
    fn test_materialized_cells() {
        let mut table = MaterializedTable::with_rows(schema(), 2);
        let id = codec::encode("5", &schema().fields[0]).unwrap();
        let name = codec::encode("eve", &schema().fields[1]).unwrap();

        table.set_cell(1, 0, &id).unwrap();
        table.set_cell(1, 1, &name).unwrap();
        assert_eq!(table.decode_cell(1, 1).unwrap(), "eve");
        assert_eq!(table.decode_cell(1, 0).unwrap(), "5");
        assert_eq!(table.decode_cell(0, 0).unwrap(), "0");

        // A wrongly sized write never spills into the next field
        assert!(matches!(
            table.set_cell(1, 0, &name),
            Err(Error::Corrupted(_))
        ));
        assert!(matches!(
            table.set_cell(2, 0, &id),
            Err(Error::Corrupted(_))
        ));
        assert_eq!(table.decode_cell(1, 1).unwrap(), "eve");
    }

    #[test]
    fn test_materialized_capacity() {
        let mut table = MaterializedTable::new(schema(), 1);
        let row = codec::encode_row(&values(1, "a"), &schema().fields).unwrap();
        table.push_row(&row).unwrap();
        assert!(matches!(
            table.push_row(&row),
            Err(Error::CapacityExceeded(1))
        ));
    }

    #[test]
    fn test_materialize_with_mask() {
        let (_dir, _disk, mut table) = create_test_table();
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            table.append(&values(i as i64, name)).unwrap();
        }

        let filtered = materialize(&mut table, &[true, false, true, false]).unwrap();
        assert_eq!(filtered.row_count(), 2);
        assert_eq!(filtered.capacity(), 2);
        let mut filtered = filtered;
        assert_eq!(filtered.decode_cell(0, 1).unwrap(), "a");
        assert_eq!(filtered.decode_cell(1, 1).unwrap(), "c");

        assert!(materialize(&mut table, &[true]).is_err());
    }

    #[test]
    fn test_sort_rows() {
        let mut table = MaterializedTable::new(schema(), 3);
        for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
            let row = codec::encode_row(&values(id, name), &schema().fields).unwrap();
            table.push_row(&row).unwrap();
        }
        let id_field = schema().fields[0].clone();
        table
            .sort_rows_by(|a, b| codec::compare_cells(a, b, id_field.field_type))
            .unwrap();
        let names: Vec<String> = (0..3).map(|r| table.decode_cell(r, 1).unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
