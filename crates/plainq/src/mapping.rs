//! Mapping check: proves a result schema fits a destination shape.
//!
//! The check compares the schema reported by a schema-only probe with the static
//! [`Shape`] of the destination type. Every failure carries a ready-to-paste field list
//! for the destination type, generated from the result columns:
//!
//! ```text
//! Type of field 'post_id' does not match. Field type is 'i64' in destination and `i32` in query. You can copy list of fields to destination type my_app::PostInfo:
//!     pub post_id: i32,
//!     pub text: Option<String>,
//! ```
//!
//! Checking is off unless enabled, either for a whole [`Db`](crate::Db) through
//! [`DbConfig`](crate::DbConfig) or for one async call tree with [`with_mapping_check`].

use crate::dialect::Dialect;
use crate::resolve::{self, AmbiguousField};
use crate::row::{ColumnDesc, column_field_type};
use crate::shape::{FieldType, Shape, ShapeKind};
use heck::ToSnakeCase;
use std::fmt;
use std::future::Future;

tokio::task_local! {
    static MAPPING_CHECK: bool;
}

/// Run `fut` with mapping checks forced on or off.
///
/// The setting is seen by everything `fut` awaits, and by nothing else: sibling tasks
/// and tasks spawned from inside `fut` keep their own setting.
pub async fn with_mapping_check<F: Future>(enabled: bool, fut: F) -> F::Output {
    MAPPING_CHECK.scope(enabled, fut).await
}

/// The call-scoped setting, if one is active.
pub fn mapping_check_override() -> Option<bool> {
    MAPPING_CHECK.try_with(|enabled| *enabled).ok()
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingErrorKind {
    /// Destination declares no fields for a non-empty result (or a scalar query has none).
    FieldCount,
    /// More than one column for a scalar destination.
    TooManyFields,
    FieldNotFound,
    TypeMismatch,
    NullabilityMismatch,
    AmbiguousField,
}

/// A result schema that does not fit its destination type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingError {
    kind: MappingErrorKind,
    message: String,
    type_name: &'static str,
    skeleton: String,
}

impl MappingError {
    fn new(kind: MappingErrorKind, message: String, shape: &Shape, skeleton: String) -> Self {
        Self {
            kind,
            message,
            type_name: shape.type_name(),
            skeleton,
        }
    }

    pub(crate) fn ambiguous(shape: &Shape, err: &AmbiguousField, skeleton: String) -> Self {
        Self::new(MappingErrorKind::AmbiguousField, err.to_string(), shape, skeleton)
    }

    pub fn kind(&self) -> MappingErrorKind {
        self.kind
    }

    /// The one-line diagnosis, without the field list.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Full path of the destination type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Field declarations matching the result, one line per column.
    pub fn skeleton(&self) -> &str {
        &self.skeleton
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skeleton.is_empty() {
            return f.write_str(&self.message);
        }
        write!(
            f,
            "{} You can copy list of fields to destination type {}:\n{}",
            self.message, self.type_name, self.skeleton
        )
    }
}

impl std::error::Error for MappingError {}

/// Check `schema` against `shape`.
///
/// Every result column must bind to a field; fields without a column are allowed.
pub fn check(
    schema: &[ColumnDesc],
    shape: &Shape,
    dialect: &dyn Dialect,
    underscores: bool,
) -> Result<(), MappingError> {
    let checker = Checker {
        schema,
        shape,
        dialect,
        underscores,
    };
    let result = checker.run();
    if let Err(e) = &result {
        tracing::debug!(
            target: "plainq.mapping",
            destination = shape.type_name(),
            kind = ?e.kind(),
            "mapping check failed: {}",
            e.message()
        );
    }
    result
}

struct Checker<'a> {
    schema: &'a [ColumnDesc],
    shape: &'a Shape,
    dialect: &'a dyn Dialect,
    underscores: bool,
}

impl Checker<'_> {
    fn run(&self) -> Result<(), MappingError> {
        match self.shape.kind() {
            ShapeKind::Scalar(ty) => {
                let [column] = self.schema else {
                    return Err(self.scalar_count_error());
                };
                self.check_type(column, ty)
            }
            ShapeKind::Record(fields) => {
                if fields.is_empty() && !self.schema.is_empty() {
                    return Err(self.fail(
                        MappingErrorKind::FieldCount,
                        format!(
                            "Count of fields does not match. Destination type has 0 fields and query has {} fields.",
                            self.schema.len()
                        ),
                    ));
                }
                for column in self.schema {
                    let found = resolve::resolve(self.shape, &column.name, self.underscores)
                        .map_err(|e| {
                            MappingError::ambiguous(self.shape, &e, self.skeleton())
                        })?;
                    let Some(idx) = found else {
                        return Err(self.fail(
                            MappingErrorKind::FieldNotFound,
                            format!(
                                "Field '{}' not found in destination type.",
                                self.field_name(&column.name)
                            ),
                        ));
                    };
                    self.check_type(column, fields[idx].ty)?;
                }
                Ok(())
            }
        }
    }

    fn scalar_count_error(&self) -> MappingError {
        if self.schema.is_empty() {
            self.fail(MappingErrorKind::FieldCount, "Query has no fields.".to_string())
        } else {
            self.fail(
                MappingErrorKind::TooManyFields,
                format!(
                    "Count of fields is greater than one. Query has {} fields.",
                    self.schema.len()
                ),
            )
        }
    }

    fn check_type(&self, column: &ColumnDesc, field: FieldType) -> Result<(), MappingError> {
        let same_type = column.sql_type == Some(field.sql);
        let ok = if column.allow_null {
            same_type && (field.nullable || !self.dialect.nullability_check_applies())
        } else {
            same_type && !field.nullable
        };
        if ok {
            return Ok(());
        }

        let kind = if same_type {
            MappingErrorKind::NullabilityMismatch
        } else {
            MappingErrorKind::TypeMismatch
        };
        Err(self.fail(
            kind,
            format!(
                "Type of field '{}' does not match. Field type is '{}' in destination and `{}` in query.",
                self.field_name(&column.name),
                field.rust_name(),
                query_type_name(column)
            ),
        ))
    }

    fn fail(&self, kind: MappingErrorKind, message: String) -> MappingError {
        MappingError::new(kind, message, self.shape, self.skeleton())
    }

    fn field_name(&self, column: &str) -> String {
        field_name(column, self.underscores)
    }

    fn skeleton(&self) -> String {
        skeleton(self.schema, self.underscores)
    }
}

fn field_name(column: &str, underscores: bool) -> String {
    if underscores {
        column.to_snake_case()
    } else {
        column.to_string()
    }
}

/// Field list for `schema`, one `pub name: Type,` line per column.
pub(crate) fn skeleton(schema: &[ColumnDesc], underscores: bool) -> String {
    schema
        .iter()
        .map(|column| {
            let name = field_name(&column.name, underscores);
            match column_field_type(column) {
                Some(ty) => format!("    pub {name}: {},", ty.rust_name()),
                None => format!(
                    "    // {name}: unsupported provider type '{}'",
                    column.provider_type
                ),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn query_type_name(column: &ColumnDesc) -> String {
    match column_field_type(column) {
        Some(ty) => ty.rust_name(),
        None => column.provider_type.clone(),
    }
}
