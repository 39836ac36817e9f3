//! Driver-neutral SQL values.
//!
//! Every parameter bound to a statement and every cell read back from a result set
//! passes through [`Value`]. Backends translate it to and from their wire types, which
//! keeps mapping checks and materialization independent of the driver in use.

use crate::shape::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Scalar types understood by the mapping layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Decimal,
    Bool,
    Uuid,
    DateTime,
    DateTimeUtc,
    Date,
    String,
    Bytes,
}

impl SqlType {
    /// Name of the Rust type a field of this SQL type is declared with.
    pub fn rust_name(self) -> &'static str {
        match self {
            SqlType::TinyInt => "u8",
            SqlType::SmallInt => "i16",
            SqlType::Int => "i32",
            SqlType::BigInt => "i64",
            SqlType::Real => "f32",
            SqlType::Double => "f64",
            SqlType::Decimal => "Decimal",
            SqlType::Bool => "bool",
            SqlType::Uuid => "Uuid",
            SqlType::DateTime => "NaiveDateTime",
            SqlType::DateTimeUtc => "DateTime<Utc>",
            SqlType::Date => "NaiveDate",
            SqlType::String => "String",
            SqlType::Bytes => "Vec<u8>",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rust_name())
    }
}

/// A single SQL value.
///
/// `Null` keeps the declared type so backends can bind a typed NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null(SqlType),
    TinyInt(u8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Decimal(Decimal),
    Bool(bool),
    Uuid(Uuid),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Date(NaiveDate),
    String(String),
    Bytes(Vec<u8>),
    /// Structured parameter: a homogeneous list bound as one parameter
    /// (a Postgres array, e.g. `WHERE id = ANY(@ids)`).
    Array(SqlType, Vec<Value>),
}

impl Value {
    /// Build an array parameter from a list of values.
    pub fn array<T: ToValue>(items: impl IntoIterator<Item = T>) -> Value {
        Value::Array(T::SQL_TYPE, items.into_iter().map(|v| v.to_value()).collect())
    }

    /// The SQL type of this value (element type for arrays).
    pub fn sql_type(&self) -> SqlType {
        match self {
            Value::Null(ty) | Value::Array(ty, _) => *ty,
            Value::TinyInt(_) => SqlType::TinyInt,
            Value::SmallInt(_) => SqlType::SmallInt,
            Value::Int(_) => SqlType::Int,
            Value::BigInt(_) => SqlType::BigInt,
            Value::Real(_) => SqlType::Real,
            Value::Double(_) => SqlType::Double,
            Value::Decimal(_) => SqlType::Decimal,
            Value::Bool(_) => SqlType::Bool,
            Value::Uuid(_) => SqlType::Uuid,
            Value::DateTime(_) => SqlType::DateTime,
            Value::DateTimeUtc(_) => SqlType::DateTimeUtc,
            Value::Date(_) => SqlType::Date,
            Value::String(_) => SqlType::String,
            Value::Bytes(_) => SqlType::Bytes,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(..))
    }

    fn describe(&self) -> String {
        match self {
            Value::Null(ty) => format!("NULL ({ty})"),
            Value::Array(ty, _) => format!("array of {ty}"),
            other => other.sql_type().rust_name().to_string(),
        }
    }
}

/// Conversion failure between a [`Value`] and a Rust type.
#[derive(Debug, Clone, Error)]
#[error("cannot convert {found} to {expected}")]
pub struct ValueError {
    expected: String,
    found: String,
}

impl ValueError {
    pub fn mismatch(expected: FieldType, found: &Value) -> Self {
        Self {
            expected: expected.rust_name(),
            found: found.describe(),
        }
    }

    pub fn new(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Rust types that can be bound as a parameter.
pub trait ToValue {
    /// Declared type used for NULLs and array elements.
    const SQL_TYPE: SqlType;

    fn to_value(&self) -> Value;
}

/// Rust types that can be read from a result cell.
///
/// `FIELD_TYPE` is what the mapping check compares against the provider type of the
/// column the field is read from.
pub trait FromValue: Sized {
    const FIELD_TYPE: FieldType;

    fn from_value(value: &Value) -> Result<Self, ValueError>;
}

macro_rules! impl_value {
    ($ty:ty => $variant:ident $(, $widen:ident)*) => {
        impl ToValue for $ty {
            const SQL_TYPE: SqlType = SqlType::$variant;

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }
        }

        impl FromValue for $ty {
            const FIELD_TYPE: FieldType = FieldType::new(SqlType::$variant);

            fn from_value(value: &Value) -> Result<Self, ValueError> {
                match value {
                    Value::$variant(v) => Ok(v.clone()),
                    $(Value::$widen(v) => Ok(<$ty>::from(*v)),)*
                    other => Err(ValueError::mismatch(<Self as FromValue>::FIELD_TYPE, other)),
                }
            }
        }
    };
}

impl_value!(u8 => TinyInt);
impl_value!(i16 => SmallInt, TinyInt);
impl_value!(i32 => Int, TinyInt, SmallInt);
impl_value!(i64 => BigInt, TinyInt, SmallInt, Int);
impl_value!(f32 => Real);
impl_value!(f64 => Double, Real);
impl_value!(Decimal => Decimal);
impl_value!(bool => Bool);
impl_value!(Uuid => Uuid);
impl_value!(NaiveDateTime => DateTime);
impl_value!(DateTime<Utc> => DateTimeUtc);
impl_value!(NaiveDate => Date);
impl_value!(String => String);
impl_value!(Vec<u8> => Bytes);

impl ToValue for str {
    const SQL_TYPE: SqlType = SqlType::String;

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for [u8] {
    const SQL_TYPE: SqlType = SqlType::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    const SQL_TYPE: SqlType = T::SQL_TYPE;

    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null(T::SQL_TYPE),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE.nullable();

    fn from_value(value: &Value) -> Result<Self, ValueError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
