//! Schema definitions for RowDB
//!
//! This module defines table schemas and field metadata.

use super::types::FieldType;
use crate::error::{Error, Result};
use crate::storage::codec;
use serde::{Deserialize, Serialize};

/// Longest table, index or field name in bytes
pub const MAX_NAME_LEN: usize = 31;
/// Most fields a table may declare
pub const MAX_TABLE_FIELDS: usize = 32;
/// Longest declared length of a char field
pub const MAX_FIELD_LENGTH: usize = 2048;

/// Field definition in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Declared length (meaningful for char fields)
    pub declared_length: usize,
    /// Field type
    pub field_type: FieldType,
}

impl FieldDescriptor {
    /// Create a new field descriptor
    pub fn new(name: impl Into<String>, field_type: FieldType, declared_length: usize) -> Self {
        Self {
            name: name.into(),
            declared_length,
            field_type,
        }
    }

    /// Shorthand for a char field
    pub fn char(name: impl Into<String>, declared_length: usize) -> Self {
        Self::new(name, FieldType::Char, declared_length)
    }

    /// Shorthand for an integer field
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer, 0)
    }
}

/// Table schema - the layout of every row in a table or index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Ordered fields; column index is the position here
    pub fields: Vec<FieldDescriptor>,
    /// Number of rows stored
    pub row_count: usize,
}

impl TableSchema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
            row_count: 0,
        }
    }

    /// Check names, field count and declared lengths
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.fields.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table '{}' has no fields",
                self.name
            )));
        }
        if self.fields.len() > MAX_TABLE_FIELDS {
            return Err(Error::InvalidSchema(format!(
                "table '{}' has {} fields, at most {} allowed",
                self.name,
                self.fields.len(),
                MAX_TABLE_FIELDS
            )));
        }
        for (i, field) in self.fields.iter().enumerate() {
            validate_name(&field.name)?;
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate field '{}' in '{}'",
                    field.name, self.name
                )));
            }
            if field.field_type == FieldType::Char
                && (field.declared_length == 0 || field.declared_length > MAX_FIELD_LENGTH)
            {
                return Err(Error::InvalidSchema(format!(
                    "char field '{}' must declare a length between 1 and {}",
                    field.name, MAX_FIELD_LENGTH
                )));
            }
        }
        Ok(())
    }

    /// Get column index by name
    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Get column index by name or fail with `FieldNotFound`
    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.find_field(name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string(), self.name.clone()))
    }

    /// Get number of fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Encoded size of one row
    pub fn row_size(&self) -> usize {
        codec::row_size(&self.fields)
    }

    /// Summary used by `SHOW`
    pub fn info(&self) -> TableInfo {
        TableInfo {
            name: self.name.clone(),
            row_size: self.row_size(),
            row_count: self.row_count,
            fields: self.fields.clone(),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidSchema(format!(
            "name '{}' must be 1 to {} bytes",
            name, MAX_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::InvalidSchema(format!(
            "name '{}' may only contain letters, digits and '_'",
            name
        )));
    }
    Ok(())
}

/// Table description returned by `SHOW`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub row_size: usize,
    pub row_count: usize,
    pub fields: Vec<FieldDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableSchema {
        TableSchema::new(
            "people",
            vec![
                FieldDescriptor::integer("id"),
                FieldDescriptor::char("name", 10),
                FieldDescriptor::integer("age"),
            ],
        )
    }

    #[test]
    fn test_schema_creation() {
        let schema = people();
        assert_eq!(schema.field_count(), 3);
        assert_eq!(schema.row_size(), 8 + 11 + 8);
        assert_eq!(schema.find_field("name"), Some(1));
        assert_eq!(schema.find_field("email"), None);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_field_not_found() {
        let schema = people();
        assert!(matches!(
            schema.field_index("email"),
            Err(Error::FieldNotFound(f, t)) if f == "email" && t == "people"
        ));
    }

    #[test]
    fn test_schema_limits() {
        let long_name = "x".repeat(MAX_NAME_LEN + 1);
        let schema = TableSchema::new(long_name, vec![FieldDescriptor::integer("id")]);
        assert!(matches!(schema.validate(), Err(Error::InvalidSchema(_))));

        let fields = (0..=MAX_TABLE_FIELDS)
            .map(|i| FieldDescriptor::integer(format!("f{}", i)))
            .collect();
        let schema = TableSchema::new("wide", fields);
        assert!(matches!(schema.validate(), Err(Error::InvalidSchema(_))));

        let schema = TableSchema::new(
            "big",
            vec![FieldDescriptor::char("blob", MAX_FIELD_LENGTH + 1)],
        );
        assert!(matches!(schema.validate(), Err(Error::InvalidSchema(_))));

        let schema = TableSchema::new(
            "dup",
            vec![FieldDescriptor::integer("id"), FieldDescriptor::integer("id")],
        );
        assert!(matches!(schema.validate(), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_table_info() {
        let mut schema = people();
        schema.row_count = 4;
        let info = schema.info();
        assert_eq!(info.name, "people");
        assert_eq!(info.row_size, 27);
        assert_eq!(info.row_count, 4);
        assert_eq!(info.fields.len(), 3);
    }
}
