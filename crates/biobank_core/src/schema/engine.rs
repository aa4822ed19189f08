//! Per-engine physical types and value codec.
//!
//! # Responsibility
//! - Map each `LogicalType` to the column declaration of a storage engine.
//! - Encode logical values into physical values and decode them back.
//!
//! # Invariants
//! - `decode(encode(v)) == v` for every valid in-range value on both engines.
//! - Malformed or out-of-range physical values fail with `DecodeError`; they
//!   are never truncated or coerced.
//! - Call sites never build engine-specific literals themselves.

use super::{ColumnDef, LogicalType, ValidationError};
use chrono::NaiveDate;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Supported storage engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    /// Strongly typed relational engine with native boolean and date columns.
    MySql,
    /// Dynamically typed embedded engine; booleans as 0/1, dates as ISO text.
    Sqlite,
}

/// Engine-independent value of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
}

/// Value as held by a storage engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
    Date(NaiveDate),
}

impl Engine {
    pub fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses an engine name as accepted by settings and the CLI.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mysql" | "a" => Some(Self::MySql),
            "sqlite" | "b" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Physical column type for a logical type.
    pub fn column_type(self, logical: LogicalType) -> String {
        match (self, logical) {
            (Self::MySql, LogicalType::ShortString(max)) => format!("VARCHAR({max})"),
            (Self::MySql, LogicalType::LongText) => "TEXT".to_string(),
            (Self::MySql, LogicalType::Boolean) => "BOOLEAN".to_string(),
            (Self::MySql, LogicalType::Integer) => "INT".to_string(),
            (Self::MySql, LogicalType::Float) => "DOUBLE".to_string(),
            (Self::MySql, LogicalType::Date) => "DATE".to_string(),
            (Self::Sqlite, LogicalType::ShortString(_) | LogicalType::LongText) => {
                "TEXT".to_string()
            }
            (Self::Sqlite, LogicalType::Boolean | LogicalType::Integer) => "INTEGER".to_string(),
            (Self::Sqlite, LogicalType::Float) => "REAL".to_string(),
            (Self::Sqlite, LogicalType::Date) => "TEXT".to_string(),
        }
    }

    /// Quotes an identifier for this engine's dialect.
    pub fn quote(self, identifier: &str) -> String {
        match self {
            Self::MySql => format!("`{identifier}`"),
            Self::Sqlite => format!("\"{identifier}\""),
        }
    }

    /// Encodes a logical value for storage in `column`.
    ///
    /// Only the type is checked here; ranges and bounds belong to
    /// `schema::validate_value`.
    pub fn encode(
        self,
        table: &'static str,
        column: &'static ColumnDef,
        value: &FieldValue,
    ) -> Result<PhysicalValue, ValidationError> {
        if !column.logical.accepts(value) {
            return Err(ValidationError::TypeMismatch {
                table,
                column: column.name,
                expected: column.logical,
            });
        }

        let encoded = match value {
            FieldValue::Null => PhysicalValue::Null,
            FieldValue::Text(text) => PhysicalValue::Text(text.clone()),
            FieldValue::Integer(number) => PhysicalValue::Integer(*number),
            FieldValue::Float(number) => PhysicalValue::Real(*number),
            FieldValue::Boolean(flag) => match self {
                Self::MySql => PhysicalValue::Boolean(*flag),
                Self::Sqlite => PhysicalValue::Integer(i64::from(*flag)),
            },
            FieldValue::Date(date) => match self {
                Self::MySql => PhysicalValue::Date(*date),
                Self::Sqlite => PhysicalValue::Text(date.format(ISO_DATE_FORMAT).to_string()),
            },
        };
        Ok(encoded)
    }

    /// Decodes a stored value of `column` back to its logical value.
    pub fn decode(
        self,
        table: &'static str,
        column: &'static ColumnDef,
        value: PhysicalValue,
    ) -> Result<FieldValue, DecodeError> {
        let fail = |reason: DecodeReason| DecodeError {
            engine: Some(self),
            table,
            column: column.name,
            reason,
        };

        match (column.logical, value) {
            (_, PhysicalValue::Null) => Ok(FieldValue::Null),
            (LogicalType::ShortString(max), PhysicalValue::Text(text)) => {
                let length = text.chars().count();
                if length > usize::from(max) {
                    return Err(fail(DecodeReason::TooLong { max, length }));
                }
                Ok(FieldValue::Text(text))
            }
            (LogicalType::LongText, PhysicalValue::Text(text)) => Ok(FieldValue::Text(text)),
            (LogicalType::Integer, PhysicalValue::Integer(number)) => {
                if i32::try_from(number).is_err() {
                    return Err(fail(DecodeReason::IntegerOutOfRange(number)));
                }
                Ok(FieldValue::Integer(number))
            }
            (LogicalType::Float, PhysicalValue::Real(number)) => Ok(FieldValue::Float(number)),
            (LogicalType::Float, PhysicalValue::Integer(number)) => {
                Ok(FieldValue::Float(number as f64))
            }
            (LogicalType::Boolean, PhysicalValue::Boolean(flag)) if self == Self::MySql => {
                Ok(FieldValue::Boolean(flag))
            }
            (LogicalType::Boolean, PhysicalValue::Integer(number)) => match number {
                0 => Ok(FieldValue::Boolean(false)),
                1 => Ok(FieldValue::Boolean(true)),
                other => Err(fail(DecodeReason::InvalidBoolean(other))),
            },
            (LogicalType::Date, PhysicalValue::Date(date)) if self == Self::MySql => {
                Ok(FieldValue::Date(date))
            }
            (LogicalType::Date, PhysicalValue::Text(text)) if self == Self::Sqlite => {
                parse_iso_date(&text)
                    .map(FieldValue::Date)
                    .ok_or_else(|| fail(DecodeReason::InvalidDate(text)))
            }
            (logical, other) => Err(fail(DecodeReason::StorageClass {
                expected: logical,
                found: other.class_name(),
            })),
        }
    }
}

impl PhysicalValue {
    fn class_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
        }
    }
}

impl From<Value> for PhysicalValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(number) => Self::Integer(number),
            Value::Real(number) => Self::Real(number),
            Value::Text(text) => Self::Text(text),
            Value::Blob(bytes) => Self::Blob(bytes),
        }
    }
}

impl From<PhysicalValue> for Value {
    fn from(value: PhysicalValue) -> Self {
        match value {
            PhysicalValue::Null => Value::Null,
            PhysicalValue::Integer(number) => Value::Integer(number),
            PhysicalValue::Real(number) => Value::Real(number),
            PhysicalValue::Text(text) => Value::Text(text),
            PhysicalValue::Blob(bytes) => Value::Blob(bytes),
            PhysicalValue::Boolean(flag) => Value::Integer(i64::from(flag)),
            PhysicalValue::Date(date) => Value::Text(date.format(ISO_DATE_FORMAT).to_string()),
        }
    }
}

/// Strict `YYYY-MM-DD` parsing; the text must re-format to itself.
fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(text, ISO_DATE_FORMAT).ok()?;
    if date.format(ISO_DATE_FORMAT).to_string() == text {
        Some(date)
    } else {
        None
    }
}

macro_rules! impl_field_value_from {
    ($($source:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$source> for FieldValue {
                fn from(value: $source) -> Self {
                    Self::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

impl_field_value_from! {
    String => Text,
    bool => Boolean,
    i32 => Integer as i64,
    i64 => Integer,
    f64 => Float,
    NaiveDate => Date,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<uuid::Uuid> for FieldValue {
    fn from(value: uuid::Uuid) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Why a stored value could not be mapped back to its logical type.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeReason {
    StorageClass {
        expected: LogicalType,
        found: &'static str,
    },
    InvalidBoolean(i64),
    InvalidDate(String),
    IntegerOutOfRange(i64),
    TooLong {
        max: u16,
        length: usize,
    },
    /// A record field received a value of another logical type.
    LogicalMismatch {
        found: &'static str,
    },
    UnexpectedNull,
    InvalidIdentifier(String),
    /// Text outside the column's closed set of choices.
    UnknownChoice(String),
}

/// Stored value cannot be losslessly mapped to its logical type.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    /// Engine whose physical value failed; `None` for logical row conversion.
    pub engine: Option<Engine>,
    pub table: &'static str,
    pub column: &'static str,
    pub reason: DecodeReason,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot decode {}.{}", self.table, self.column)?;
        if let Some(engine) = self.engine {
            write!(f, " from {}", engine.name())?;
        }
        f.write_str(": ")?;
        match &self.reason {
            DecodeReason::StorageClass { expected, found } => {
                write!(f, "expected {} storage, found {found}", expected.name())
            }
            DecodeReason::InvalidBoolean(value) => write!(f, "`{value}` is not 0 or 1"),
            DecodeReason::InvalidDate(value) => write!(f, "`{value}` is not an ISO-8601 date"),
            DecodeReason::IntegerOutOfRange(value) => {
                write!(f, "`{value}` does not fit a 32-bit integer")
            }
            DecodeReason::TooLong { max, length } => {
                write!(f, "{length} characters exceed the bound of {max}")
            }
            DecodeReason::LogicalMismatch { found } => write!(f, "unexpected {found} value"),
            DecodeReason::UnexpectedNull => write!(f, "unexpected null"),
            DecodeReason::InvalidIdentifier(value) => {
                write!(f, "`{value}` is not a valid identifier")
            }
            DecodeReason::UnknownChoice(value) => write!(f, "`{value}` is not a known choice"),
        }
    }
}

impl Error for DecodeError {}
