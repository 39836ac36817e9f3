//! Generated INSERT / UPDATE / DELETE / get-by-key statements.
//!
//! Statements are built from the table's introspected columns, restricted to the
//! columns that bind to a field of the record type. Identity and computed columns,
//! and fields declared `#[orm(read_only)]`, are never written.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::mapping::{self, MappingError};
use crate::params::ToParams;
use crate::resolve;
use crate::row::{ColumnDesc, FromRow};
use crate::shape::{Field, Shape};

/// A record stored in one table.
///
/// Derived with `#[derive(Model)]`; the table is `#[orm(table = "...")]`, or the type
/// name with an `s` appended.
pub trait Model: FromRow + ToParams {
    fn table() -> TableName;
}

/// Where a model is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableName {
    /// Declared with `#[orm(table = "...", schema = "...")]`; quoted when rendered.
    Declared {
        schema: Option<&'static str>,
        name: &'static str,
    },
    /// Derived from the type name; rendered verbatim.
    Default(&'static str),
}

impl TableName {
    pub fn render(&self, dialect: &dyn Dialect) -> String {
        match self {
            TableName::Declared {
                schema: Some(schema),
                name,
            } => format!("{}.{}", dialect.quote_ident(schema), dialect.quote_ident(name)),
            TableName::Declared { schema: None, name } => dialect.quote_ident(name),
            TableName::Default(name) => (*name).to_string(),
        }
    }
}

/// Statement text generator for one table and record type.
#[derive(Debug)]
pub struct Statements<'a> {
    table: String,
    columns: &'a [ColumnDesc],
    shape: Shape,
    dialect: &'a dyn Dialect,
    underscores: bool,
}

/// A table column together with the field it binds to.
struct BoundColumn<'a> {
    column: &'a ColumnDesc,
    field: Option<&'static Field>,
    param: &'a str,
}

impl BoundColumn<'_> {
    fn writable(&self) -> bool {
        self.field.is_some_and(|f| !f.read_only)
            && !self.column.is_auto_increment
            && !self.column.is_read_only
    }
}

impl<'a> Statements<'a> {
    pub fn new(
        table: String,
        columns: &'a [ColumnDesc],
        shape: Shape,
        dialect: &'a dyn Dialect,
        underscores: bool,
    ) -> Self {
        Self {
            table,
            columns,
            shape,
            dialect,
            underscores,
        }
    }

    /// Generator for model `R`.
    pub fn for_model<R: Model>(
        columns: &'a [ColumnDesc],
        dialect: &'a dyn Dialect,
        underscores: bool,
    ) -> Self {
        Self::new(R::table().render(dialect), columns, R::shape(), dialect, underscores)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `INSERT ... ` returning the identity column.
    pub fn insert_returning_key(&self) -> DbResult<String> {
        let bound = self.bind_columns()?;
        let key = bound
            .iter()
            .find(|b| b.column.is_auto_increment)
            .ok_or_else(|| DbError::AutoIncrementNotFound {
                table: self.table.clone(),
            })?;
        let (columns, values) = self.insert_lists(&bound)?;
        Ok(self.dialect.insert_returning_key(
            &self.table,
            &columns,
            &values,
            &self.dialect.quote_ident(&key.column.name),
        ))
    }

    /// `INSERT INTO {table} ({cols}) VALUES ({vals})`
    pub fn insert(&self) -> DbResult<String> {
        let bound = self.bind_columns()?;
        let (columns, values) = self.insert_lists(&bound)?;
        Ok(format!("INSERT INTO {} ({columns}) VALUES ({values})", self.table))
    }

    /// `UPDATE {table} SET {col}=@{param}, ... WHERE {key}=@{param} AND ...`
    pub fn update(&self) -> DbResult<String> {
        let bound = self.bind_columns()?;
        let set: Vec<String> = bound
            .iter()
            .filter(|b| !b.column.is_key && b.writable())
            .map(|b| self.assignment(b))
            .collect();
        if set.is_empty() {
            return Err(DbError::validation(format!(
                "No writable columns to update in table '{}'.",
                self.table
            )));
        }
        let filter = self.key_filter(&bound)?;
        Ok(format!(
            "UPDATE {} SET {} WHERE {filter}",
            self.table,
            set.join(", ")
        ))
    }

    /// `DELETE FROM {table} WHERE {key}=@{param} AND ...`
    pub fn delete(&self) -> DbResult<String> {
        let bound = self.bind_columns()?;
        let filter = self.key_filter(&bound)?;
        Ok(format!("DELETE FROM {} WHERE {filter}", self.table))
    }

    /// `SELECT {cols} FROM {table} WHERE {key}=@{param} AND ...`
    pub fn get_by_key(&self) -> DbResult<String> {
        let bound = self.bind_columns()?;
        let select: Vec<String> = bound
            .iter()
            .filter(|b| b.field.is_some())
            .map(|b| self.dialect.quote_ident(&b.column.name))
            .collect();
        if select.is_empty() {
            return Err(DbError::validation(format!(
                "No columns of table '{}' bind to {}.",
                self.table,
                self.shape.type_name()
            )));
        }
        let filter = self.key_filter(&bound)?;
        Ok(format!(
            "SELECT {} FROM {} WHERE {filter}",
            select.join(", "),
            self.table
        ))
    }

    fn bind_columns(&self) -> DbResult<Vec<BoundColumn<'a>>> {
        self.columns
            .iter()
            .map(|column| {
                let found = resolve::resolve(&self.shape, &column.name, self.underscores)
                    .map_err(|e| {
                        let skeleton = mapping::skeleton(self.columns, self.underscores);
                        MappingError::ambiguous(&self.shape, &e, skeleton)
                    })?;
                let field = found.map(|idx| &self.shape.fields()[idx]);
                Ok(BoundColumn {
                    column,
                    field,
                    param: field.map_or(column.name.as_str(), |f| f.name),
                })
            })
            .collect()
    }

    fn insert_lists(&self, bound: &[BoundColumn<'_>]) -> DbResult<(String, String)> {
        let writable: Vec<&BoundColumn<'_>> = bound.iter().filter(|b| b.writable()).collect();
        if writable.is_empty() {
            return Err(DbError::validation(format!(
                "No writable columns to insert into table '{}'.",
                self.table
            )));
        }
        let columns = writable
            .iter()
            .map(|b| self.dialect.quote_ident(&b.column.name))
            .collect::<Vec<_>>()
            .join(", ");
        let values = writable
            .iter()
            .map(|b| format!("@{}", b.param))
            .collect::<Vec<_>>()
            .join(", ");
        Ok((columns, values))
    }

    fn key_filter(&self, bound: &[BoundColumn<'_>]) -> DbResult<String> {
        let keys: Vec<String> = bound
            .iter()
            .filter(|b| b.column.is_key)
            .map(|b| self.assignment(b))
            .collect();
        if keys.is_empty() {
            return Err(DbError::NoKeyColumns {
                table: self.table.clone(),
            });
        }
        Ok(keys.join(" AND "))
    }

    fn assignment(&self, b: &BoundColumn<'_>) -> String {
        format!("{}=@{}", self.dialect.quote_ident(&b.column.name), b.param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{POSTGRES, SQL_SERVER};
    use crate::mapping::MappingErrorKind;
    use crate::shape::FieldType;
    use crate::value::SqlType;

    struct Post;
    static POST: &[Field] = &[
        Field::new("PostId", FieldType::new(SqlType::Int)),
        Field::new("Text", FieldType::new(SqlType::String).nullable()),
        Field::new("CreationDate", FieldType::new(SqlType::DateTime)),
        Field::new("Views", FieldType::new(SqlType::Int)).read_only(),
    ];

    fn columns() -> Vec<ColumnDesc> {
        vec![
            ColumnDesc::new("PostId", SqlType::Int).key().auto_increment(),
            ColumnDesc::new("Text", SqlType::String).nullable(),
            ColumnDesc::new("CreationDate", SqlType::DateTime),
            ColumnDesc::new("Views", SqlType::Int),
            ColumnDesc::new("Archived", SqlType::Bool),
        ]
    }

    fn statements<'a>(cols: &'a [ColumnDesc], dialect: &'a dyn Dialect) -> Statements<'a> {
        Statements::new("Posts".into(), cols, Shape::record::<Post>(POST), dialect, false)
    }

    #[test]
    fn insert_returning_key_per_dialect() {
        let cols = columns();
        assert_eq!(
            statements(&cols, &SQL_SERVER).insert_returning_key().unwrap(),
            "INSERT INTO Posts ([Text], [CreationDate]) OUTPUT inserted.[PostId] VALUES (@Text, @CreationDate)"
        );
        assert_eq!(
            statements(&cols, &POSTGRES).insert_returning_key().unwrap(),
            "INSERT INTO Posts (\"Text\", \"CreationDate\") VALUES (@Text, @CreationDate) RETURNING \"PostId\""
        );
    }

    #[test]
    fn insert_skips_identity_and_read_only() {
        let cols = columns();
        assert_eq!(
            statements(&cols, &SQL_SERVER).insert().unwrap(),
            "INSERT INTO Posts ([Text], [CreationDate]) VALUES (@Text, @CreationDate)"
        );
    }

    #[test]
    fn update_delete_and_get_filter_on_keys() {
        let cols = columns();
        let s = statements(&cols, &SQL_SERVER);
        assert_eq!(
            s.update().unwrap(),
            "UPDATE Posts SET [Text]=@Text, [CreationDate]=@CreationDate WHERE [PostId]=@PostId"
        );
        assert_eq!(s.delete().unwrap(), "DELETE FROM Posts WHERE [PostId]=@PostId");
        assert_eq!(
            s.get_by_key().unwrap(),
            "SELECT [PostId], [Text], [CreationDate], [Views] FROM Posts WHERE [PostId]=@PostId"
        );
    }

    #[test]
    fn ambiguous_columns_carry_the_field_list() {
        struct Twice;
        static TWICE: &[Field] = &[
            Field::new("PostId", FieldType::new(SqlType::Int)),
            Field::new("PostId", FieldType::new(SqlType::Int)),
        ];
        let cols = columns();
        let shape = Shape::record::<Twice>(TWICE);
        let s = Statements::new("Posts".into(), &cols, shape, &SQL_SERVER, false);
        let err = s.update().unwrap_err();
        let mapping = err.as_mapping().unwrap();
        assert_eq!(mapping.kind(), MappingErrorKind::AmbiguousField);
        assert!(
            mapping
                .skeleton()
                .starts_with("    pub PostId: i32,\n    pub Text: Option<String>,"),
            "{err}"
        );
    }

    #[test]
    fn composite_keys_join_with_and() {
        let cols = vec![
            ColumnDesc::new("PostId", SqlType::Int).key(),
            ColumnDesc::new("Text", SqlType::String).key(),
            ColumnDesc::new("CreationDate", SqlType::DateTime),
        ];
        let s = statements(&cols, &POSTGRES);
        assert_eq!(
            s.delete().unwrap(),
            "DELETE FROM Posts WHERE \"PostId\"=@PostId AND \"Text\"=@Text"
        );
    }

    #[test]
    fn missing_identity_and_keys_are_errors() {
        let cols = vec![
            ColumnDesc::new("Text", SqlType::String),
            ColumnDesc::new("CreationDate", SqlType::DateTime),
        ];
        let s = statements(&cols, &SQL_SERVER);
        assert_eq!(
            s.insert_returning_key().unwrap_err().to_string(),
            "Auto increment column not found in table 'Posts'."
        );
        assert!(matches!(s.update(), Err(DbError::NoKeyColumns { .. })));
        assert!(matches!(s.delete(), Err(DbError::NoKeyColumns { .. })));
        assert!(matches!(s.get_by_key(), Err(DbError::NoKeyColumns { .. })));
    }

    #[test]
    fn params_use_field_names_with_underscore_matching() {
        struct Person;
        static PERSON: &[Field] = &[
            Field::new("PersonId", FieldType::new(SqlType::Int)),
            Field::new("FirstName", FieldType::new(SqlType::String)),
        ];
        let cols = vec![
            ColumnDesc::new("person_id", SqlType::Int).key(),
            ColumnDesc::new("first_name", SqlType::String),
        ];
        let shape = Shape::record::<Person>(PERSON);
        let s = Statements::new("people".into(), &cols, shape, &POSTGRES, true);
        assert_eq!(
            s.update().unwrap(),
            "UPDATE people SET \"first_name\"=@FirstName WHERE \"person_id\"=@PersonId"
        );
    }

    #[test]
    fn table_names_render_per_dialect() {
        let declared = TableName::Declared {
            schema: Some("blog"),
            name: "Posts",
        };
        assert_eq!(declared.render(&SQL_SERVER), "[blog].[Posts]");
        assert_eq!(declared.render(&POSTGRES), "\"blog\".\"Posts\"");
        assert_eq!(TableName::Default("Posts").render(&POSTGRES), "Posts");
    }
}
