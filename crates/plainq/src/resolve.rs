//! Column-to-field resolution.
//!
//! A result column binds to the destination field with exactly the same name; when
//! underscore matching is enabled a column such as `first_name` also binds to a field
//! named `FirstName` (underscores dropped on both sides, ASCII case ignored).
//! Lookups are memoized process-wide per (type, column, mode).

use crate::shape::Shape;
use dashmap::DashMap;
use std::any::TypeId;
use std::fmt;
use std::sync::LazyLock;

type FieldKey = (TypeId, bool, String);

static FIELD_CACHE: LazyLock<DashMap<FieldKey, Option<usize>>> = LazyLock::new(DashMap::new);

/// More than one destination field matches a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousField {
    pub column: String,
    pub fields: Vec<&'static str>,
}

impl fmt::Display for AmbiguousField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field '{}' matches more than one field in destination type ({}).",
            self.column,
            self.fields.join(", ")
        )
    }
}

/// Index of the field of `shape` that `column` binds to.
///
/// Ambiguous matches are reported and never cached.
pub fn resolve(
    shape: &Shape,
    column: &str,
    underscores: bool,
) -> Result<Option<usize>, AmbiguousField> {
    let key = (shape.type_id(), underscores, column.to_string());
    if let Some(hit) = FIELD_CACHE.get(&key) {
        return Ok(*hit);
    }

    let found = find(shape, column, underscores)?;
    FIELD_CACHE.entry(key).or_insert(found);
    Ok(found)
}

fn find(shape: &Shape, column: &str, underscores: bool) -> Result<Option<usize>, AmbiguousField> {
    let fields = shape.fields();

    let exact: Vec<usize> = (0..fields.len())
        .filter(|&i| fields[i].name == column)
        .collect();
    if let Some(found) = unique(column, &exact, shape)? {
        return Ok(Some(found));
    }
    if !underscores {
        return Ok(None);
    }

    let wanted = strip_underscores(column);
    let loose: Vec<usize> = (0..fields.len())
        .filter(|&i| strip_underscores(fields[i].name).eq_ignore_ascii_case(&wanted))
        .collect();
    unique(column, &loose, shape)
}

fn unique(column: &str, matches: &[usize], shape: &Shape) -> Result<Option<usize>, AmbiguousField> {
    match matches {
        [] => Ok(None),
        [one] => Ok(Some(*one)),
        many => Err(AmbiguousField {
            column: column.to_string(),
            fields: many.iter().map(|&i| shape.fields()[i].name).collect(),
        }),
    }
}

fn strip_underscores(name: &str) -> String {
    name.chars().filter(|&c| c != '_').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Field, FieldType};
    use crate::value::SqlType;

    struct Person;
    static PERSON: &[Field] = &[
        Field::new("PersonId", FieldType::new(SqlType::Int)),
        Field::new("FirstName", FieldType::new(SqlType::String)),
    ];

    struct Clash;
    static CLASH: &[Field] = &[
        Field::new("first_name", FieldType::new(SqlType::String)),
        Field::new("FirstName", FieldType::new(SqlType::String)),
    ];

    struct Twice;
    static TWICE: &[Field] = &[
        Field::new("Id", FieldType::new(SqlType::Int)),
        Field::new("Id", FieldType::new(SqlType::Int)),
    ];

    #[test]
    fn exact_match_first() {
        let shape = Shape::record::<Person>(PERSON);
        assert_eq!(resolve(&shape, "FirstName", false), Ok(Some(1)));
        assert_eq!(resolve(&shape, "firstname", false), Ok(None));
    }

    #[test]
    fn underscore_insensitive_when_enabled() {
        let shape = Shape::record::<Person>(PERSON);
        assert_eq!(resolve(&shape, "first_name", true), Ok(Some(1)));
        assert_eq!(resolve(&shape, "person_id", true), Ok(Some(0)));
        assert_eq!(resolve(&shape, "first_name", false), Ok(None));
    }

    #[test]
    fn ambiguous_loose_match_fails_loudly() {
        let shape = Shape::record::<Clash>(CLASH);
        // Exact match still disambiguates.
        assert_eq!(resolve(&shape, "first_name", true), Ok(Some(0)));
        let err = resolve(&shape, "FIRST_NAME", true).unwrap_err();
        assert_eq!(err.fields, vec!["first_name", "FirstName"]);
        // Not cached: a second call reports again.
        assert!(resolve(&shape, "FIRST_NAME", true).is_err());
    }

    #[test]
    fn ambiguous_exact_match_fails_loudly() {
        let shape = Shape::record::<Twice>(TWICE);
        for underscores in [false, true] {
            let err = resolve(&shape, "Id", underscores).unwrap_err();
            assert_eq!(err.column, "Id");
            assert_eq!(err.fields, vec!["Id", "Id"]);
        }
        assert!(resolve(&shape, "Id", false).is_err());
    }
}
