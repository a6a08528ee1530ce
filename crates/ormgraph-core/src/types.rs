//! SQL type descriptors carried by selectable mappings.

use serde::Serialize;

use crate::value::Value;

/// SQL data type of one selectable (column or formula).
///
/// This is the JDBC-level descriptor: it decides how a value is bound as a
/// parameter and extracted from a result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SqlType {
    // Integer types
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    // Fixed precision
    Decimal { precision: u8, scale: u8 },

    Boolean,

    // String types
    Char(u32),
    VarChar(u32),
    Text,

    // Binary types
    VarBinary(u32),
    Blob,

    // Date/time types
    Date,
    Time,
    Timestamp,
    TimestampTz,

    Uuid,
    Json,

    // Custom type name
    Custom(&'static str),
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Char(len) => format!("CHAR({})", len),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::VarBinary(len) => format!("VARBINARY({})", len),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::TimestampTz => "TIMESTAMPTZ".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Custom(name) => name.to_string(),
        }
    }

    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Real
                | SqlType::Double
                | SqlType::Decimal { .. }
        )
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(self, SqlType::Char(_) | SqlType::VarChar(_) | SqlType::Text)
    }

    /// Check if this type is a date/time type.
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::Timestamp | SqlType::TimestampTz
        )
    }

    /// Whether `value` can be bound to a column of this type.
    ///
    /// NULL binds to anything. Temporal, decimal and uuid values travel as
    /// text; custom types accept any value.
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            _ if matches!(self, SqlType::Custom(_)) => true,
            Value::Bool(_) => matches!(self, SqlType::Boolean),
            Value::BigInt(_) => self.is_numeric(),
            Value::Double(_) => {
                matches!(self, SqlType::Real | SqlType::Double | SqlType::Decimal { .. })
            }
            Value::Text(_) => {
                self.is_text()
                    || self.is_temporal()
                    || matches!(self, SqlType::Uuid | SqlType::Decimal { .. } | SqlType::Json)
            }
            Value::Bytes(_) => matches!(self, SqlType::VarBinary(_) | SqlType::Blob | SqlType::Uuid),
            Value::Json(_) => matches!(self, SqlType::Json),
        }
    }
}
