//! Entity catalog for the biobank domain.
//!
//! # Responsibility
//! - Define one typed record per persisted table.
//! - Bind every record to its static `TableDef` through the `Entity` trait.
//! - Convert records to and from engine-neutral `FieldValue` rows.
//!
//! # Invariants
//! - Struct field order equals column order in the table definition.
//! - Generated identifiers are assigned at construction and never change.
//! - Records carry no storage details; engines are chosen by repositories.

use crate::schema::engine::DecodeReason;
use crate::schema::{DecodeError, FieldValue, TableDef, ValidationError};
use chrono::NaiveDate;
use uuid::Uuid;

/// Declares an entity struct together with its column list and `Entity` impl.
///
/// Column names are the field names unless overridden with `@ "name"`. Each
/// field names its logical type and, optionally, a `Bounds` variant in
/// brackets.
macro_rules! entity {
    (
        table $table:ident, key $key:ident: $key_ty:ty;
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field:ident: $field_ty:ty
                    = $logical:ident $(($len:literal))? $([$bounds:ident])? $(@ $column:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $field_ty,
            )*
        }

        impl $name {
            /// Column definitions in struct field order.
            pub const COLUMNS: &'static [$crate::schema::ColumnDef] = &[
                $(
                    $crate::schema::ColumnDef {
                        name: entity!(@column $field $($column)?),
                        logical: $crate::schema::LogicalType::$logical $(($len))?,
                        nullable: <$field_ty as $crate::model::FieldType>::NULLABLE,
                        bounds: entity!(@bounds $($bounds)?),
                        choices: <$field_ty as $crate::model::FieldType>::CHOICES,
                    },
                )*
            ];
        }

        impl $crate::model::Entity for $name {
            type Key = $key_ty;

            fn table() -> &'static $crate::schema::TableDef {
                &$table
            }

            fn key(&self) -> Self::Key {
                self.$key.clone()
            }

            fn to_fields(&self) -> Vec<$crate::schema::FieldValue> {
                vec![$($crate::model::FieldType::to_field(&self.$field)),*]
            }

            fn from_fields(
                values: Vec<$crate::schema::FieldValue>,
            ) -> Result<Self, $crate::schema::DecodeError> {
                let mut values = values.into_iter();
                Ok(Self {
                    $(
                        $field: $crate::model::take_field(
                            &$table,
                            entity!(@column $field $($column)?),
                            &mut values,
                        )?,
                    )*
                })
            }
        }
    };
    (@column $field:ident) => {
        stringify!($field)
    };
    (@column $field:ident $column:literal) => {
        $column
    };
    (@bounds) => {
        $crate::schema::Bounds::Unbounded
    };
    (@bounds $bounds:ident) => {
        $crate::schema::Bounds::$bounds
    };
}

pub mod biomodel;
pub mod catalog;
pub mod id;
pub mod lc;
pub mod patient;
pub mod pdx;
pub mod trial;
pub mod trial_records;

/// A persisted record bound to one table definition.
pub trait Entity: Sized {
    /// Primary key type (natural `String` or generated `Uuid`).
    type Key: FieldType + Clone + PartialEq + std::fmt::Display;

    fn table() -> &'static TableDef;

    fn key(&self) -> Self::Key;

    /// Field values in column order.
    fn to_fields(&self) -> Vec<FieldValue>;

    /// Builds a record from field values in column order.
    fn from_fields(values: Vec<FieldValue>) -> Result<Self, DecodeError>;

    /// Boundary validation of the whole record.
    fn validate(&self) -> Result<(), ValidationError> {
        Self::table().validate_row(&self.to_fields())
    }
}

/// Rust type that maps onto one logical column.
pub trait FieldType: Sized {
    const NULLABLE: bool = false;
    const CHOICES: &'static [&'static str] = &[];

    fn to_field(&self) -> FieldValue;

    fn from_field(value: FieldValue) -> Result<Self, DecodeReason>;
}

impl FieldType for String {
    fn to_field(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_field(value: FieldValue) -> Result<Self, DecodeReason> {
        match value {
            FieldValue::Text(text) => Ok(text),
            other => Err(mismatch(&other)),
        }
    }
}

impl FieldType for bool {
    fn to_field(&self) -> FieldValue {
        FieldValue::Boolean(*self)
    }

    fn from_field(value: FieldValue) -> Result<Self, DecodeReason> {
        match value {
            FieldValue::Boolean(flag) => Ok(flag),
            other => Err(mismatch(&other)),
        }
    }
}

impl FieldType for i32 {
    fn to_field(&self) -> FieldValue {
        FieldValue::Integer(i64::from(*self))
    }

    fn from_field(value: FieldValue) -> Result<Self, DecodeReason> {
        match value {
            FieldValue::Integer(number) => {
                i32::try_from(number).map_err(|_| DecodeReason::IntegerOutOfRange(number))
            }
            other => Err(mismatch(&other)),
        }
    }
}

impl FieldType for f64 {
    fn to_field(&self) -> FieldValue {
        FieldValue::Float(*self)
    }

    fn from_field(value: FieldValue) -> Result<Self, DecodeReason> {
        match value {
            FieldValue::Float(number) => Ok(number),
            other => Err(mismatch(&other)),
        }
    }
}

impl FieldType for NaiveDate {
    fn to_field(&self) -> FieldValue {
        FieldValue::Date(*self)
    }

    fn from_field(value: FieldValue) -> Result<Self, DecodeReason> {
        match value {
            FieldValue::Date(date) => Ok(date),
            other => Err(mismatch(&other)),
        }
    }
}

impl FieldType for Uuid {
    fn to_field(&self) -> FieldValue {
        FieldValue::Text(self.to_string())
    }

    fn from_field(value: FieldValue) -> Result<Self, DecodeReason> {
        match value {
            FieldValue::Text(text) => {
                Uuid::parse_str(&text).map_err(|_| DecodeReason::InvalidIdentifier(text))
            }
            other => Err(mismatch(&other)),
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const NULLABLE: bool = true;
    const CHOICES: &'static [&'static str] = T::CHOICES;

    fn to_field(&self) -> FieldValue {
        self.as_ref().map_or(FieldValue::Null, T::to_field)
    }

    fn from_field(value: FieldValue) -> Result<Self, DecodeReason> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field(other).map(Some),
        }
    }
}

fn mismatch(value: &FieldValue) -> DecodeReason {
    let found = match value {
        FieldValue::Null => return DecodeReason::UnexpectedNull,
        FieldValue::Text(_) => "text",
        FieldValue::Boolean(_) => "boolean",
        FieldValue::Integer(_) => "integer",
        FieldValue::Float(_) => "real",
        FieldValue::Date(_) => "date",
    };
    DecodeReason::LogicalMismatch { found }
}

/// Converts the next logical value of a row, attaching table/column context.
pub fn take_field<T: FieldType>(
    table: &'static TableDef,
    column: &'static str,
    values: &mut std::vec::IntoIter<FieldValue>,
) -> Result<T, DecodeError> {
    let value = values.next().unwrap_or(FieldValue::Null);
    T::from_field(value).map_err(|reason| DecodeError {
        engine: None,
        table: table.name,
        column,
        reason,
    })
}
