//! Field types for RowDB
//!
//! This module defines the column types a table can store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Size in bytes of an encoded integer
pub const INTEGER_SIZE: usize = 8;

/// Column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Fixed maximum length text, stored NUL-terminated
    Char,
    /// 64-bit signed integer
    Integer,
}

impl FieldType {
    /// Tag written into the schema record
    pub fn tag(&self) -> u32 {
        match self {
            FieldType::Char => 0,
            FieldType::Integer => 1,
        }
    }

    /// Decode a tag read from a schema record
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            0 => Ok(FieldType::Char),
            1 => Ok(FieldType::Integer),
            other => Err(Error::InvalidFieldType(other.to_string())),
        }
    }

    /// Encoded size of a field of this type with the given declared length
    pub fn encoded_size(&self, declared_length: usize) -> usize {
        match self {
            // Room for the terminator
            FieldType::Char => declared_length + 1,
            FieldType::Integer => INTEGER_SIZE,
        }
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("char") {
            Ok(FieldType::Char)
        } else if s.eq_ignore_ascii_case("int") {
            Ok(FieldType::Integer)
        } else {
            Err(Error::InvalidFieldType(s.to_string()))
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Char => write!(f, "char"),
            FieldType::Integer => write!(f, "int"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_size() {
        assert_eq!(FieldType::Char.encoded_size(10), 11);
        assert_eq!(FieldType::Integer.encoded_size(10), 8);
        assert_eq!(FieldType::Integer.encoded_size(0), 8);
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(FieldType::from_tag(0).unwrap(), FieldType::Char);
        assert_eq!(FieldType::from_tag(1).unwrap(), FieldType::Integer);
        assert!(matches!(
            FieldType::from_tag(999),
            Err(Error::InvalidFieldType(_))
        ));
    }

    #[test]
    fn test_type_names() {
        assert_eq!("CHAR".parse::<FieldType>().unwrap(), FieldType::Char);
        assert_eq!("int".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert!("varchar".parse::<FieldType>().is_err());
        assert_eq!(FieldType::Integer.to_string(), "int");
    }
}
