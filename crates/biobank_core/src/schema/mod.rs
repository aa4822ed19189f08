//! Engine-neutral table definitions and boundary validation.
//!
//! # Responsibility
//! - Describe every persisted table as static data (`TableDef`).
//! - Own the logical type system shared by both storage engines.
//! - Validate logical values against column rules before any write.
//!
//! # Invariants
//! - Column names are lower_snake_case and identical on every engine.
//! - Only primary keys and required foreign keys are non-nullable.
//! - Bounded strings and fractional ranges are enforced here, never assumed
//!   from storage.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod ddl;
pub mod engine;
pub mod graph;

pub use engine::{DecodeError, Engine, FieldValue, PhysicalValue};

/// Logical column type, independent of any storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    /// Text with a maximum length in characters.
    ShortString(u16),
    /// Unbounded text.
    LongText,
    Boolean,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Float,
    /// Calendar date without time zone.
    Date,
}

impl LogicalType {
    /// Returns whether a logical value can be stored in a column of this type.
    ///
    /// `Null` is accepted by every type; nullability is checked separately.
    pub fn accepts(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (_, FieldValue::Null)
                | (Self::ShortString(_) | Self::LongText, FieldValue::Text(_))
                | (Self::Boolean, FieldValue::Boolean(_))
                | (Self::Integer, FieldValue::Integer(_))
                | (Self::Float, FieldValue::Float(_))
                | (Self::Date, FieldValue::Date(_))
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ShortString(_) => "short-string",
            Self::LongText => "long-text",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "floating-point",
            Self::Date => "calendar-date",
        }
    }
}

/// Domain range enforced at the application boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bounds {
    Unbounded,
    /// Ratio in `[0, 1]` (viability, confluence).
    Fraction,
    /// Counts, weeks and sizes.
    NonNegative,
}

/// One persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub logical: LogicalType,
    pub nullable: bool,
    pub bounds: Bounds,
    /// Closed set of accepted text values; empty means any value.
    pub choices: &'static [&'static str],
}

/// How the primary key of a table is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Caller-supplied business identifier (NHC, biobank code).
    Natural,
    /// Generated once at record construction.
    Generated,
    /// Reuses the identifier of the base row (trial subtypes).
    Shared,
}

/// Single-parent edge from a child table to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub columns: &'static [&'static str],
    pub parent_table: &'static str,
    pub parent_columns: &'static [&'static str],
    pub required: bool,
}

impl ForeignKeyDef {
    /// Child column that references the parent's primary key.
    pub fn key_column(&self, parent_key: &str) -> &'static str {
        self.parent_columns
            .iter()
            .position(|column| *column == parent_key)
            .map_or(self.columns[0], |index| self.columns[index])
    }
}

/// Constant column that tags a subtype row with its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discriminator {
    pub column: &'static str,
    pub value: &'static str,
}

/// Cross-field rule checked on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCheck {
    /// `later` must not precede `earlier` when both are set.
    NotBefore {
        earlier: &'static str,
        later: &'static str,
    },
}

/// Static description of one entity table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableDef {
    pub name: &'static str,
    /// Human readable entity name used in errors and logs.
    pub entity: &'static str,
    pub key: &'static str,
    pub key_kind: KeyKind,
    pub columns: &'static [ColumnDef],
    pub foreign_keys: &'static [ForeignKeyDef],
    pub unique: &'static [&'static [&'static str]],
    pub discriminator: Option<Discriminator>,
    pub checks: &'static [RowCheck],
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Every physical column name, including a subtype discriminator.
    pub fn physical_column_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.columns.iter().map(|column| column.name).collect();
        if let Some(discriminator) = self.discriminator {
            names.push(discriminator.column);
        }
        names
    }

    /// Validates one full row given in column order.
    pub fn validate_row(&self, values: &[FieldValue]) -> Result<(), ValidationError> {
        if values.len() != self.columns.len() {
            return Err(ValidationError::ColumnCount {
                table: self.name,
                expected: self.columns.len(),
                actual: values.len(),
            });
        }

        for (column, value) in self.columns.iter().zip(values) {
            validate_value(self.name, column, value)?;
        }

        if self.key_kind == KeyKind::Natural {
            let index = self.column_index(self.key).unwrap_or(0);
            if let FieldValue::Text(key) = &values[index] {
                validate_natural_key(self.key, key)?;
            }
        }

        for check in self.checks {
            match *check {
                RowCheck::NotBefore { earlier, later } => {
                    let first = self.column_index(earlier).map(|index| &values[index]);
                    let second = self.column_index(later).map(|index| &values[index]);
                    if let (Some(FieldValue::Date(first)), Some(FieldValue::Date(second))) =
                        (first, second)
                    {
                        if second < first {
                            return Err(ValidationError::DateOrder {
                                table: self.name,
                                earlier,
                                later,
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Validates one logical value against its column declaration.
pub fn validate_value(
    table: &'static str,
    column: &'static ColumnDef,
    value: &FieldValue,
) -> Result<(), ValidationError> {
    if !column.logical.accepts(value) {
        return Err(ValidationError::TypeMismatch {
            table,
            column: column.name,
            expected: column.logical,
        });
    }

    match value {
        FieldValue::Null if !column.nullable => Err(ValidationError::Required {
            table,
            column: column.name,
        }),
        FieldValue::Text(text) => {
            if let LogicalType::ShortString(max) = column.logical {
                let actual = text.chars().count();
                if actual > usize::from(max) {
                    return Err(ValidationError::TooLong {
                        table,
                        column: column.name,
                        max,
                        actual,
                    });
                }
            }
            if !column.choices.is_empty() && !column.choices.contains(&text.as_str()) {
                return Err(ValidationError::NotAChoice {
                    table,
                    column: column.name,
                    value: text.clone(),
                });
            }
            Ok(())
        }
        FieldValue::Float(number) => check_bounds(table, column, *number),
        FieldValue::Integer(number) => {
            if i32::try_from(*number).is_err() {
                return Err(ValidationError::OutOfRange {
                    table,
                    column: column.name,
                    value: *number as f64,
                    bounds: column.bounds,
                });
            }
            check_bounds(table, column, *number as f64)
        }
        _ => Ok(()),
    }
}

fn check_bounds(
    table: &'static str,
    column: &'static ColumnDef,
    value: f64,
) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite {
            table,
            column: column.name,
        });
    }

    let in_range = match column.bounds {
        Bounds::Unbounded => true,
        Bounds::Fraction => (0.0..=1.0).contains(&value),
        Bounds::NonNegative => value >= 0.0,
    };

    if in_range {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            table,
            column: column.name,
            value,
            bounds: column.bounds,
        })
    }
}

fn validate_natural_key(column: &'static str, key: &str) -> Result<(), ValidationError> {
    if key.trim().is_empty() || key.trim() != key || key.chars().any(char::is_control) {
        return Err(ValidationError::InvalidNaturalKey {
            column,
            value: key.to_string(),
        });
    }
    Ok(())
}

/// Boundary validation failure; nothing was written.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Required {
        table: &'static str,
        column: &'static str,
    },
    TypeMismatch {
        table: &'static str,
        column: &'static str,
        expected: LogicalType,
    },
    TooLong {
        table: &'static str,
        column: &'static str,
        max: u16,
        actual: usize,
    },
    OutOfRange {
        table: &'static str,
        column: &'static str,
        value: f64,
        bounds: Bounds,
    },
    NotFinite {
        table: &'static str,
        column: &'static str,
    },
    NotAChoice {
        table: &'static str,
        column: &'static str,
        value: String,
    },
    InvalidNaturalKey {
        column: &'static str,
        value: String,
    },
    DateOrder {
        table: &'static str,
        earlier: &'static str,
        later: &'static str,
    },
    UnknownColumn {
        table: &'static str,
        column: String,
    },
    ImmutableColumn {
        table: &'static str,
        column: &'static str,
    },
    ColumnCount {
        table: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required { table, column } => write!(f, "{table}.{column} is required"),
            Self::TypeMismatch {
                table,
                column,
                expected,
            } => write!(f, "{table}.{column} expects a {} value", expected.name()),
            Self::TooLong {
                table,
                column,
                max,
                actual,
            } => write!(
                f,
                "{table}.{column} accepts at most {max} characters, got {actual}"
            ),
            Self::OutOfRange {
                table,
                column,
                value,
                bounds,
            } => write!(f, "{table}.{column} value {value} is outside {bounds:?} range"),
            Self::NotFinite { table, column } => {
                write!(f, "{table}.{column} must be a finite number")
            }
            Self::NotAChoice {
                table,
                column,
                value,
            } => write!(f, "{table}.{column} does not accept `{value}`"),
            Self::InvalidNaturalKey { column, value } => {
                write!(f, "invalid natural key `{value}` for {column}")
            }
            Self::DateOrder {
                table,
                earlier,
                later,
            } => write!(f, "{table}.{later} must not be earlier than {table}.{earlier}"),
            Self::UnknownColumn { table, column } => {
                write!(f, "table {table} has no column `{column}`")
            }
            Self::ImmutableColumn { table, column } => {
                write!(f, "{table}.{column} cannot be changed after creation")
            }
            Self::ColumnCount {
                table,
                expected,
                actual,
            } => write!(f, "{table} row has {actual} values, expected {expected}"),
        }
    }
}

impl Error for ValidationError {}
