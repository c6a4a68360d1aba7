//! Row codec for RowDB
//!
//! Fixed-width field encoding, row layout arithmetic and the binary
//! schema record. `offset` is the only place row and column positions are
//! turned into byte positions; both the on-disk row store and the
//! in-memory row buffers address through it.

use std::cmp::Ordering;
use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::catalog::schema::{MAX_FIELD_LENGTH, MAX_TABLE_FIELDS};
use crate::catalog::types::INTEGER_SIZE;
use crate::catalog::{FieldDescriptor, FieldType, TableSchema};
use crate::error::{Error, Result};

/// Magic prefix of every schema record
pub const SCHEMA_MAGIC: &[u8; 4] = b"RDB1";

/// Encoded size of a single field
pub fn field_size(field: &FieldDescriptor) -> usize {
    field.field_type.encoded_size(field.declared_length)
}

/// Encoded size of a row made of `fields`
pub fn row_size(fields: &[FieldDescriptor]) -> usize {
    fields.iter().map(field_size).sum()
}

/// Byte offset of `(row, col)` in a buffer of rows laid out by `fields`
pub fn offset(fields: &[FieldDescriptor], row: usize, col: usize) -> usize {
    row * row_size(fields) + fields[..col].iter().map(field_size).sum::<usize>()
}

/// Encode a textual value into exactly `field_size(field)` bytes
pub fn encode(value: &str, field: &FieldDescriptor) -> Result<Vec<u8>> {
    match field.field_type {
        FieldType::Integer => {
            let parsed: i64 = value.trim().parse().map_err(|_| Error::InvalidValue {
                field: field.name.clone(),
                value: value.to_string(),
            })?;
            let mut buf = vec![0u8; INTEGER_SIZE];
            LittleEndian::write_i64(&mut buf, parsed);
            Ok(buf)
        }
        FieldType::Char => {
            let bytes = value.as_bytes();
            if bytes.len() > field.declared_length {
                return Err(Error::EncodingOverflow {
                    field: field.name.clone(),
                    length: bytes.len(),
                    max: field.declared_length,
                });
            }
            if bytes.contains(&0) {
                return Err(Error::InvalidValue {
                    field: field.name.clone(),
                    value: value.escape_default().to_string(),
                });
            }
            let mut buf = vec![0u8; field_size(field)];
            buf[..bytes.len()].copy_from_slice(bytes);
            Ok(buf)
        }
    }
}

/// Encode one full row from textual values
pub fn encode_row(values: &[String], fields: &[FieldDescriptor]) -> Result<Vec<u8>> {
    if values.len() != fields.len() {
        return Err(Error::ValueCountMismatch {
            expected: fields.len(),
            found: values.len(),
        });
    }
    let mut row = Vec::with_capacity(row_size(fields));
    for (value, field) in values.iter().zip(fields) {
        row.extend_from_slice(&encode(value, field)?);
    }
    Ok(row)
}

/// Decode a field into its display string
pub fn decode(bytes: &[u8], field_type: FieldType) -> Result<String> {
    match field_type {
        FieldType::Integer => Ok(decode_integer(bytes)?.to_string()),
        FieldType::Char => Ok(String::from_utf8_lossy(char_bytes(bytes)).into_owned()),
    }
}

fn decode_integer(bytes: &[u8]) -> Result<i64> {
    if bytes.len() < INTEGER_SIZE {
        return Err(Error::Corrupted(format!(
            "integer field needs {} bytes, got {}",
            INTEGER_SIZE,
            bytes.len()
        )));
    }
    Ok(LittleEndian::read_i64(&bytes[..INTEGER_SIZE]))
}

/// Text bytes of a char field, up to the terminator
fn char_bytes(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Typed ordering of two encoded cells of the same field type.
///
/// Integers compare numerically, char fields compare their text bytes.
pub fn compare_cells(a: &[u8], b: &[u8], field_type: FieldType) -> Result<Ordering> {
    match field_type {
        FieldType::Integer => Ok(decode_integer(a)?.cmp(&decode_integer(b)?)),
        FieldType::Char => Ok(char_bytes(a).cmp(char_bytes(b))),
    }
}

/// Typed ordering of an encoded cell against a textual key.
///
/// Returns `None` when the key cannot be a value of `field_type`.
pub fn compare_key(cell: &[u8], key: &str, field_type: FieldType) -> Result<Option<Ordering>> {
    match field_type {
        FieldType::Integer => match key.trim().parse::<i64>() {
            Ok(k) => Ok(Some(decode_integer(cell)?.cmp(&k))),
            Err(_) => Ok(None),
        },
        FieldType::Char => Ok(Some(char_bytes(cell).cmp(key.as_bytes()))),
    }
}

/// Serialize a schema into its fixed-layout record
pub fn encode_schema(schema: &TableSchema) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(SCHEMA_MAGIC);
    write_name(&mut buf, &schema.name)?;
    buf.write_u32::<LittleEndian>(schema.fields.len() as u32)?;
    for field in &schema.fields {
        write_name(&mut buf, &field.name)?;
        buf.write_u64::<LittleEndian>(field.declared_length as u64)?;
        buf.write_u32::<LittleEndian>(field.field_type.tag())?;
    }
    buf.write_u64::<LittleEndian>(schema.row_count as u64)?;
    Ok(buf)
}

/// Deserialize a schema record
pub fn decode_schema(bytes: &[u8]) -> Result<TableSchema> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic).map_err(truncated)?;
    if &magic != SCHEMA_MAGIC {
        return Err(Error::Corrupted("bad schema record magic".to_string()));
    }

    let name = read_name(&mut cursor)?;
    let field_count = cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    if field_count > MAX_TABLE_FIELDS {
        return Err(Error::Corrupted(format!(
            "schema record for '{}' declares {} fields",
            name, field_count
        )));
    }

    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let field_name = read_name(&mut cursor)?;
        let declared_length = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
        if declared_length > MAX_FIELD_LENGTH as u64 {
            return Err(Error::Corrupted(format!(
                "field '{}' of '{}' declares length {}",
                field_name, name, declared_length
            )));
        }
        let declared_length = declared_length as usize;
        let tag = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        let field_type = FieldType::from_tag(tag)?;
        fields.push(FieldDescriptor::new(field_name, field_type, declared_length));
    }
    let row_count = cursor.read_u64::<LittleEndian>().map_err(truncated)? as usize;

    Ok(TableSchema {
        name,
        fields,
        row_count,
    })
}

fn write_name(buf: &mut Vec<u8>, name: &str) -> Result<()> {
    buf.write_u16::<LittleEndian>(name.len() as u16)?;
    buf.extend_from_slice(name.as_bytes());
    Ok(())
}

fn read_name(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let len = cursor.read_u16::<LittleEndian>().map_err(truncated)? as usize;
    let mut bytes = vec![0u8; len];
    cursor.read_exact(&mut bytes).map_err(truncated)?;
    String::from_utf8(bytes).map_err(|e| Error::Corrupted(format!("schema name: {}", e)))
}

fn truncated(_: std::io::Error) -> Error {
    Error::Corrupted("schema record is truncated".to_string())
}
