//! Destination shapes: the statically known field set of a type rows are read into.
//!
//! Shapes are produced by `#[derive(FromRow)]` (records) or by the built-in scalar
//! impls, so no runtime reflection is needed to validate or materialize a result.

use crate::value::SqlType;
use std::any::TypeId;

/// Declared type of a destination field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    /// Underlying scalar (for enums, the integer representation).
    pub sql: SqlType,
    /// `Option<T>`.
    pub nullable: bool,
    /// Rust name of the enum, for integer-backed enums.
    pub enum_name: Option<&'static str>,
}

impl FieldType {
    pub const fn new(sql: SqlType) -> Self {
        Self {
            sql,
            nullable: false,
            enum_name: None,
        }
    }

    /// An integer-backed enum stored as `repr`.
    pub const fn enumeration(repr: SqlType, name: &'static str) -> Self {
        Self {
            sql: repr,
            nullable: false,
            enum_name: Some(name),
        }
    }

    /// The `Option<_>` wrapping of this type.
    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    /// The type with the `Option<_>` wrapper removed.
    pub const fn unwrapped(self) -> Self {
        Self {
            nullable: false,
            ..self
        }
    }

    pub fn is_enum(&self) -> bool {
        self.enum_name.is_some()
    }

    /// Rust spelling of the type, e.g. `Option<i32>`.
    pub fn rust_name(&self) -> String {
        let base = self.enum_name.unwrap_or(self.sql.rust_name());
        if self.nullable {
            format!("Option<{base}>")
        } else {
            base.to_string()
        }
    }
}

/// One bindable field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Column / parameter name the field binds to.
    pub name: &'static str,
    pub ty: FieldType,
    /// Declared `#[orm(read_only)]`: never written by generated INSERT/UPDATE.
    pub read_only: bool,
}

impl Field {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            read_only: false,
        }
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// How rows map onto the destination type.
#[derive(Debug, Clone, Copy)]
pub enum ShapeKind {
    /// The whole row is one value (first and only column).
    Scalar(FieldType),
    /// One field per column.
    Record(&'static [Field]),
}

/// Descriptor of a destination type.
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    type_id: TypeId,
    type_name: &'static str,
    kind: ShapeKind,
}

impl Shape {
    pub fn scalar<T: 'static>(ty: FieldType) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind: ShapeKind::Scalar(ty),
        }
    }

    pub fn record<T: 'static>(fields: &'static [Field]) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind: ShapeKind::Record(fields),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name, as shown in mapping diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, ShapeKind::Scalar(_))
    }

    /// Record fields; empty for scalar shapes.
    pub fn fields(&self) -> &'static [Field] {
        match self.kind {
            ShapeKind::Record(fields) => fields,
            ShapeKind::Scalar(_) => &[],
        }
    }
}
