//! `SqlType` definitions and the MySQL promotion rules used by type inference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SqlsemError;

/// SQL types known to the analyzer (MySQL dialect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SqlType {
    /// Type of the NULL literal.
    Null,
    /// TINYINT.
    Int8,
    /// SMALLINT.
    Int16,
    /// MEDIUMINT.
    Int24,
    /// INT.
    Int32,
    /// BIGINT.
    Int64,
    /// TINYINT UNSIGNED.
    Uint8,
    /// SMALLINT UNSIGNED.
    Uint16,
    /// MEDIUMINT UNSIGNED.
    Uint24,
    /// INT UNSIGNED.
    Uint32,
    /// BIGINT UNSIGNED.
    Uint64,
    /// FLOAT.
    Float32,
    /// DOUBLE.
    Float64,
    /// DECIMAL / NUMERIC.
    Decimal,
    /// YEAR.
    Year,
    /// DATE.
    Date,
    /// TIME.
    Time,
    /// DATETIME.
    Datetime,
    /// TIMESTAMP.
    Timestamp,
    /// CHAR.
    Char,
    /// VARCHAR.
    VarChar,
    /// TEXT family.
    Text,
    /// BINARY.
    Binary,
    /// VARBINARY.
    VarBinary,
    /// BLOB family.
    Blob,
    /// BIT.
    Bit,
    /// ENUM.
    Enum,
    /// SET.
    Set,
    /// JSON.
    Json,
}

impl SqlType {
    /// Returns the name of the type as used in SQL DDL.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Null => "NULL_TYPE",
            SqlType::Int8 => "INT8",
            SqlType::Int16 => "INT16",
            SqlType::Int24 => "INT24",
            SqlType::Int32 => "INT32",
            SqlType::Int64 => "INT64",
            SqlType::Uint8 => "UINT8",
            SqlType::Uint16 => "UINT16",
            SqlType::Uint24 => "UINT24",
            SqlType::Uint32 => "UINT32",
            SqlType::Uint64 => "UINT64",
            SqlType::Float32 => "FLOAT32",
            SqlType::Float64 => "FLOAT64",
            SqlType::Decimal => "DECIMAL",
            SqlType::Year => "YEAR",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Datetime => "DATETIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Char => "CHAR",
            SqlType::VarChar => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Binary => "BINARY",
            SqlType::VarBinary => "VARBINARY",
            SqlType::Blob => "BLOB",
            SqlType::Bit => "BIT",
            SqlType::Enum => "ENUM",
            SqlType::Set => "SET",
            SqlType::Json => "JSON",
        }
    }

    /// Returns whether this is a signed integer type.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            SqlType::Int8 | SqlType::Int16 | SqlType::Int24 | SqlType::Int32 | SqlType::Int64
        )
    }

    /// Returns whether this is an unsigned integer type.
    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            SqlType::Uint8 | SqlType::Uint16 | SqlType::Uint24 | SqlType::Uint32 | SqlType::Uint64
        )
    }

    /// Returns whether this is an integral type (including BIT and YEAR).
    #[must_use]
    pub fn is_integral(&self) -> bool {
        self.is_signed() || self.is_unsigned() || matches!(self, SqlType::Bit | SqlType::Year)
    }

    /// Returns whether this is a floating point type.
    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(self, SqlType::Float32 | SqlType::Float64)
    }

    /// Returns whether this type is numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_float() || *self == SqlType::Decimal
    }

    /// Returns whether values of this type are compared as text or bytes.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::VarChar
                | SqlType::Text
                | SqlType::Binary
                | SqlType::VarBinary
                | SqlType::Blob
                | SqlType::Enum
                | SqlType::Set
                | SqlType::Json
        )
    }

    /// Returns whether this is a temporal type.
    #[must_use]
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::Datetime | SqlType::Timestamp
        )
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SqlType {
    type Err = SqlsemError;

    /// Parses a DDL type name such as `int`, `bigint unsigned` or `varchar(255)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let unsigned = lowered.split_whitespace().any(|w| w == "unsigned");
        let base = lowered
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        let ty = match (base, unsigned) {
            ("tinyint", false) => SqlType::Int8,
            ("tinyint", true) => SqlType::Uint8,
            ("smallint", false) => SqlType::Int16,
            ("smallint", true) => SqlType::Uint16,
            ("mediumint", false) => SqlType::Int24,
            ("mediumint", true) => SqlType::Uint24,
            ("int" | "integer", false) => SqlType::Int32,
            ("int" | "integer", true) => SqlType::Uint32,
            ("bigint" | "int64", false) => SqlType::Int64,
            ("bigint", true) | ("uint64", _) => SqlType::Uint64,
            ("bool" | "boolean", _) => SqlType::Int8,
            ("float" | "float32", _) => SqlType::Float32,
            ("double" | "real" | "float64", _) => SqlType::Float64,
            ("decimal" | "numeric" | "dec", _) => SqlType::Decimal,
            ("year", _) => SqlType::Year,
            ("date", _) => SqlType::Date,
            ("time", _) => SqlType::Time,
            ("datetime", _) => SqlType::Datetime,
            ("timestamp", _) => SqlType::Timestamp,
            ("char", _) => SqlType::Char,
            ("varchar" | "string", _) => SqlType::VarChar,
            ("text" | "tinytext" | "mediumtext" | "longtext", _) => SqlType::Text,
            ("binary", _) => SqlType::Binary,
            ("varbinary", _) => SqlType::VarBinary,
            ("blob" | "tinyblob" | "mediumblob" | "longblob", _) => SqlType::Blob,
            ("bit", _) => SqlType::Bit,
            ("enum", _) => SqlType::Enum,
            ("set", _) => SqlType::Set,
            ("json", _) => SqlType::Json,
            _ => {
                return Err(SqlsemError::SchemaError(format!("unknown column type '{s}'")));
            }
        };
        Ok(ty)
    }
}

/// Result type of `+`, `-`, `*` and `%`.
#[must_use]
pub fn arithmetic_result(left: SqlType, right: SqlType) -> SqlType {
    if left == SqlType::Null || right == SqlType::Null {
        return SqlType::Null;
    }
    if is_approximate(left) || is_approximate(right) {
        SqlType::Float64
    } else if left == SqlType::Decimal || right == SqlType::Decimal {
        SqlType::Decimal
    } else if left.is_unsigned() || right.is_unsigned() {
        SqlType::Uint64
    } else {
        SqlType::Int64
    }
}

/// Result type of `/`.
#[must_use]
pub fn division_result(left: SqlType, right: SqlType) -> SqlType {
    if left == SqlType::Null || right == SqlType::Null {
        return SqlType::Null;
    }
    if is_approximate(left) || is_approximate(right) {
        SqlType::Float64
    } else {
        SqlType::Decimal
    }
}

/// Result type of `DIV`.
#[must_use]
pub fn integer_division_result(left: SqlType, right: SqlType) -> SqlType {
    if left == SqlType::Null || right == SqlType::Null {
        return SqlType::Null;
    }
    if left.is_unsigned() || right.is_unsigned() {
        SqlType::Uint64
    } else {
        SqlType::Int64
    }
}

// Strings and floats are evaluated as DOUBLE in arithmetic context.
fn is_approximate(ty: SqlType) -> bool {
    ty.is_float() || ty.is_textual()
}
