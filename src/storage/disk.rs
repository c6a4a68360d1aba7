//! Disk manager for RowDB
//!
//! This module handles the two files behind every table and index: the
//! schema record (metadata store) and the raw row bytes (row store).

use crate::catalog::TableSchema;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::storage::codec;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What a pair of files stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Index,
}

impl ObjectKind {
    fn schema_suffix(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::Index => "index",
        }
    }

    fn rows_suffix(&self) -> &'static str {
        match self {
            ObjectKind::Table => "bin",
            ObjectKind::Index => "index.bin",
        }
    }
}

/// Disk manager
#[derive(Debug, Clone)]
pub struct DiskManager {
    /// Directory where data files are stored
    data_dir: PathBuf,
    /// Call `sync_data` after every write
    sync_writes: bool,
}

impl DiskManager {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            sync_writes: config.sync_writes,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the metadata store
    pub fn schema_path(&self, name: &str, kind: ObjectKind) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", name, kind.schema_suffix()))
    }

    /// Path of the row store
    pub fn rows_path(&self, name: &str, kind: ObjectKind) -> PathBuf {
        self.data_dir.join(format!("{}.{}", name, kind.rows_suffix()))
    }

    pub fn exists(&self, name: &str, kind: ObjectKind) -> bool {
        self.schema_path(name, kind).is_file()
    }

    /// Load a schema record
    pub fn read_schema(&self, name: &str, kind: ObjectKind) -> Result<TableSchema> {
        let path = self.schema_path(name, kind);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "schema not readable");
                return Err(Error::SchemaNotFound(name.to_string()));
            }
        };
        codec::decode_schema(&bytes)
    }

    /// Overwrite a schema record
    pub fn write_schema(&self, schema: &TableSchema, kind: ObjectKind) -> Result<()> {
        let path = self.schema_path(&schema.name, kind);
        let bytes = codec::encode_schema(schema)?;
        let mut file = File::create(&path)?;
        file.write_all(&bytes)?;
        self.finish_write(&mut file)?;
        debug!(
            name = %schema.name,
            rows = schema.row_count,
            "schema written"
        );
        Ok(())
    }

    /// Open a row store for reading and writing, creating it if missing
    pub fn open_rows(&self, name: &str, kind: ObjectKind) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(self.rows_path(name, kind))?;
        Ok(file)
    }

    /// Read one field of one row
    pub fn read_field(
        &self,
        file: &mut File,
        schema: &TableSchema,
        row: usize,
        col: usize,
    ) -> Result<Vec<u8>> {
        check_bounds(schema, row)?;
        let field = schema.fields.get(col).ok_or_else(|| {
            Error::Corrupted(format!("column {} out of range in '{}'", col, schema.name))
        })?;
        let mut buf = vec![0u8; codec::field_size(field)];
        file.seek(SeekFrom::Start(
            codec::offset(&schema.fields, row, col) as u64,
        ))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read one full row
    pub fn read_row(&self, file: &mut File, schema: &TableSchema, row: usize) -> Result<Vec<u8>> {
        check_bounds(schema, row)?;
        let mut buf = vec![0u8; schema.row_size()];
        file.seek(SeekFrom::Start(codec::offset(&schema.fields, row, 0) as u64))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Write one full row at `row`
    pub fn write_row(
        &self,
        file: &mut File,
        schema: &TableSchema,
        row: usize,
        bytes: &[u8],
    ) -> Result<()> {
        if bytes.len() != schema.row_size() {
            return Err(Error::Corrupted(format!(
                "row for '{}' must be {} bytes, got {}",
                schema.name,
                schema.row_size(),
                bytes.len()
            )));
        }
        file.seek(SeekFrom::Start(codec::offset(&schema.fields, row, 0) as u64))?;
        file.write_all(bytes)?;
        self.finish_write(file)?;
        Ok(())
    }

    /// Replace a whole row store
    pub fn write_all_rows(&self, name: &str, kind: ObjectKind, bytes: &[u8]) -> Result<()> {
        let mut file = File::create(self.rows_path(name, kind))?;
        file.write_all(bytes)?;
        self.finish_write(&mut file)?;
        Ok(())
    }

    /// Read the first `len` bytes of a row store
    pub fn read_all_rows(&self, name: &str, kind: ObjectKind, len: usize) -> Result<Vec<u8>> {
        let path = self.rows_path(name, kind);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::SchemaNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let on_disk = file.metadata()?.len() as usize;
        if on_disk < len {
            return Err(Error::Corrupted(format!(
                "row store of '{}' holds {} bytes, schema needs {}",
                name, on_disk, len
            )));
        }
        if on_disk > len {
            warn!(name, on_disk, expected = len, "row store longer than schema row count");
        }
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn finish_write(&self, file: &mut File) -> Result<()> {
        file.flush()?;
        if self.sync_writes {
            file.sync_data()?;
        }
        Ok(())
    }
}

fn check_bounds(schema: &TableSchema, row: usize) -> Result<()> {
    if row >= schema.row_count {
        return Err(Error::Corrupted(format!(
            "row {} out of range in '{}' ({} rows)",
            row, schema.name, schema.row_count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDescriptor;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DiskManager) {
        let dir = TempDir::new().unwrap();
        let disk = DiskManager::new(&EngineConfig::new().data_dir(dir.path()));
        (dir, disk)
    }

    fn schema() -> TableSchema {
        TableSchema::new(
            "pets",
            vec![FieldDescriptor::integer("id"), FieldDescriptor::char("name", 7)],
        )
    }

    #[test]
    fn test_file_names() {
        let (_dir, disk) = setup();
        assert!(disk
            .schema_path("t", ObjectKind::Table)
            .ends_with("t.table"));
        assert!(disk.rows_path("t", ObjectKind::Table).ends_with("t.bin"));
        assert!(disk
            .schema_path("i", ObjectKind::Index)
            .ends_with("i.index"));
        assert!(disk
            .rows_path("i", ObjectKind::Index)
            .ends_with("i.index.bin"));
    }

    #[test]
    fn test_schema_roundtrip() {
        let (_dir, disk) = setup();
        let mut schema = schema();
        schema.row_count = 3;
        disk.write_schema(&schema, ObjectKind::Table).unwrap();

        assert!(disk.exists("pets", ObjectKind::Table));
        assert!(!disk.exists("pets", ObjectKind::Index));
        assert_eq!(disk.read_schema("pets", ObjectKind::Table).unwrap(), schema);
    }

    #[test]
    fn test_missing_schema() {
        let (_dir, disk) = setup();
        assert!(matches!(
            disk.read_schema("ghost", ObjectKind::Table),
            Err(Error::SchemaNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_row_read_write() {
        let (_dir, disk) = setup();
        let mut schema = schema();
        let mut file = disk.open_rows("pets", ObjectKind::Table).unwrap();

        let rows = [["1", "rex"], ["2", "felix"]];
        for (i, values) in rows.iter().enumerate() {
            let values: Vec<String> = values.iter().map(|s| s.to_string()).collect();
            let bytes = codec::encode_row(&values, &schema.fields).unwrap();
            disk.write_row(&mut file, &schema, i, &bytes).unwrap();
            schema.row_count += 1;
        }

        let name = disk.read_field(&mut file, &schema, 1, 1).unwrap();
        assert_eq!(name.len(), 8);
        assert_eq!(
            codec::decode(&name, crate::catalog::FieldType::Char).unwrap(),
            "felix"
        );
        let row = disk.read_row(&mut file, &schema, 0).unwrap();
        assert_eq!(row.len(), schema.row_size());

        assert!(matches!(
            disk.read_field(&mut file, &schema, 2, 0),
            Err(Error::Corrupted(_))
        ));
        assert!(matches!(
            disk.write_row(&mut file, &schema, 2, &[0u8; 3]),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_synchronous_writes() {
        let dir = TempDir::new().unwrap();
        let disk = DiskManager::new(&EngineConfig::new().data_dir(dir.path()).sync_writes(true));
        let mut schema = schema();
        disk.write_schema(&schema, ObjectKind::Table).unwrap();

        let mut file = disk.open_rows("pets", ObjectKind::Table).unwrap();
        let values = vec!["3".to_string(), "tom".to_string()];
        let bytes = codec::encode_row(&values, &schema.fields).unwrap();
        disk.write_row(&mut file, &schema, 0, &bytes).unwrap();
        schema.row_count = 1;
        disk.write_schema(&schema, ObjectKind::Table).unwrap();
        drop(file);

        let on_disk = std::fs::read(disk.rows_path("pets", ObjectKind::Table)).unwrap();
        assert_eq!(on_disk, bytes);
        assert_eq!(disk.read_schema("pets", ObjectKind::Table).unwrap().row_count, 1);
    }

    #[test]
    fn test_short_row_store() {
        let (_dir, disk) = setup();
        disk.write_all_rows("idx", ObjectKind::Index, &[1, 2, 3])
            .unwrap();
        assert_eq!(
            disk.read_all_rows("idx", ObjectKind::Index, 3).unwrap(),
            vec![1, 2, 3]
        );
        assert!(matches!(
            disk.read_all_rows("idx", ObjectKind::Index, 4),
            Err(Error::Corrupted(_))
        ));
    }
}
