//! Result rows, column descriptions and row mapping.

use crate::error::{DbError, DbResult};
use crate::mapping::{self, MappingError};
use crate::resolve;
use crate::shape::{FieldType, Shape, ShapeKind};
use crate::value::{FromValue, SqlType, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Driver-reported description of one result column.
///
/// Produced by a connection's schema-only probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    /// Mapped scalar type; `None` when the provider type has no Rust counterpart.
    pub sql_type: Option<SqlType>,
    /// Provider type name as the server reports it (`int4`, `nvarchar`, ...).
    pub provider_type: String,
    pub allow_null: bool,
    pub is_key: bool,
    pub is_auto_increment: bool,
    /// Computed / generated column, never written.
    pub is_read_only: bool,
}

impl ColumnDesc {
    /// A non-nullable column of a mapped type.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type: Some(sql_type),
            provider_type: sql_type.rust_name().to_string(),
            allow_null: false,
            is_key: false,
            is_auto_increment: false,
            is_read_only: false,
        }
    }

    /// A column whose provider type cannot be mapped.
    pub fn unsupported(name: impl Into<String>, provider_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: None,
            provider_type: provider_type.into(),
            allow_null: true,
            is_key: false,
            is_auto_increment: false,
            is_read_only: false,
        }
    }

    pub fn provider_type(mut self, provider_type: impl Into<String>) -> Self {
        self.provider_type = provider_type.into();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.allow_null = true;
        self
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }
}

/// Schema of a result set, one entry per column in ordinal order.
pub type ResultSchema = Vec<ColumnDesc>;

/// A materialized result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Rows of one result set share their column list.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of the first column with this name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    /// Decode column `idx`.
    pub fn try_get<T: FromValue>(&self, idx: usize) -> DbResult<T> {
        let value = self
            .values
            .get(idx)
            .ok_or_else(|| DbError::decode(idx.to_string(), "column index out of range"))?;
        let column = self.columns.get(idx).map_or("", String::as_str);
        T::from_value(value).map_err(|e| DbError::decode(column, e.to_string()))
    }

    /// Column descriptions inferred from this row's values.
    pub(crate) fn describe(&self) -> Vec<ColumnDesc> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(name, value)| {
                let column = ColumnDesc::new(name.as_str(), value.sql_type());
                if value.is_null() { column.nullable() } else { column }
            })
            .collect()
    }

    /// Decode the first column named `name`.
    pub fn try_get_by_name<T: FromValue>(&self, name: &str) -> DbResult<T> {
        let value = self
            .value(name)
            .ok_or_else(|| DbError::decode(name, "column not found"))?;
        T::from_value(value).map_err(|e| DbError::decode(name, e.to_string()))
    }
}

/// Column index bound to each field of a record shape, computed once per result set.
#[derive(Debug, Clone, Default)]
pub struct FieldSlots {
    slots: Vec<Option<usize>>,
}

impl FieldSlots {
    /// Bind the columns of `first`, the first row of a result set, to the fields of `shape`.
    ///
    /// Columns without a field are skipped; the first column bound to a field wins.
    pub fn new(shape: &Shape, first: &Row, underscores: bool) -> DbResult<Self> {
        let mut slots = vec![None; shape.fields().len()];
        if let ShapeKind::Record(_) = shape.kind() {
            for (col, name) in first.columns().iter().enumerate() {
                let found = resolve::resolve(shape, name, underscores).map_err(|e| {
                    let skeleton = mapping::skeleton(&first.describe(), underscores);
                    MappingError::ambiguous(shape, &e, skeleton)
                })?;
                if let Some(field) = found {
                    slots[field].get_or_insert(col);
                }
            }
        }
        Ok(Self { slots })
    }

    /// Decode field `field` from `row`.
    ///
    /// A field without a column reads as NULL, so `Option` fields become `None`.
    pub fn decode<T: FromValue>(&self, row: &Row, field: usize, name: &str) -> DbResult<T> {
        match self.slots.get(field).copied().flatten() {
            Some(col) => row.try_get(col),
            None => T::from_value(&Value::Null(T::FIELD_TYPE.sql))
                .map_err(|_| DbError::decode(name, "no result column for field")),
        }
    }
}

/// Types a result row can be read into.
///
/// Implemented by `#[derive(FromRow)]` for records and built in for scalars, where the
/// whole row is its first column.
pub trait FromRow: Sized + 'static {
    fn shape() -> Shape;

    fn from_row(row: &Row, slots: &FieldSlots) -> DbResult<Self>;
}

/// Read the single column of a scalar row.
pub fn scalar_from_row<T: FromValue>(row: &Row) -> DbResult<T> {
    if row.is_empty() {
        return Err(DbError::decode("0", "row has no columns"));
    }
    row.try_get(0)
}

macro_rules! impl_scalar_row {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromRow for $ty {
                fn shape() -> Shape {
                    Shape::scalar::<Self>(<Self as FromValue>::FIELD_TYPE)
                }

                fn from_row(row: &Row, _slots: &FieldSlots) -> DbResult<Self> {
                    scalar_from_row(row)
                }
            }
        )*
    };
}

impl_scalar_row!(
    u8,
    i16,
    i32,
    i64,
    f32,
    f64,
    Decimal,
    bool,
    Uuid,
    NaiveDateTime,
    DateTime<Utc>,
    NaiveDate,
    String,
    Vec<u8>,
);

impl<T: FromValue + 'static> FromRow for Option<T> {
    fn shape() -> Shape {
        Shape::scalar::<Self>(<T as FromValue>::FIELD_TYPE.nullable())
    }

    fn from_row(row: &Row, _slots: &FieldSlots) -> DbResult<Self> {
        scalar_from_row(row)
    }
}

/// Field type a column would need to be declared with (`Option<_>` when nullable).
pub(crate) fn column_field_type(column: &ColumnDesc) -> Option<FieldType> {
    let ty = FieldType::new(column.sql_type?);
    Some(if column.allow_null { ty.nullable() } else { ty })
}

/// Convert a row set into `T`s.
pub fn materialize<T: FromRow>(rows: &[Row], underscores: bool) -> DbResult<Vec<T>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let slots = FieldSlots::new(&T::shape(), first, underscores)?;
    rows.iter().map(|row| T::from_row(row, &slots)).collect()
}
