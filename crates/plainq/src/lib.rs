//! # plainq
//!
//! Plain SQL with typed results, for Postgres and SQL Server.
//!
//! ## Features
//!
//! - **SQL explicit**: queries are text fragments with named `@parameters`
//! - **Typed materialization**: Row → Struct via the `FromRow` trait
//! - **Mapping checks**: a schema-only probe compares a query's result columns with the
//!   destination type and reports mismatches together with a paste-ready field list
//! - **Generated CRUD**: insert / update / delete / get-by-key from introspected columns
//! - **Dialects**: `OUTPUT inserted.x` vs `RETURNING x`, `[x]` vs `"x"` quoting
//!
//! ## Fragments
//!
//! ```ignore
//! use plainq::{params, query_with};
//!
//! let mut q = query_with("SELECT * FROM Posts WHERE Author = @author", params! { "author" => 3 });
//! let mut filter = q.sub_query();
//! filter.append_with(" AND Views > @views", params! { "views" => 100 });
//! q.append(filter.text());
//!
//! let posts: Vec<Post> = q.to_list(&mut db).await?;
//! ```
//!
//! ## CRUD
//!
//! ```ignore
//! #[derive(plainq::Model)]
//! struct Post {
//!     #[orm(column = "PostId")]
//!     id: i32,
//!     #[orm(column = "Text")]
//!     text: Option<String>,
//! }
//!
//! let id: i32 = db.insert_returning_key::<i32, _>(&post).await?;
//! ```

pub mod bind;
pub mod config;
pub mod connection;
pub mod crud;
pub mod db;
pub mod dialect;
pub mod error;
pub mod introspect;
pub mod mapping;
pub mod params;
pub mod query;
pub mod resolve;
pub mod row;
pub mod shape;
pub mod value;

#[cfg(feature = "postgres")]
pub mod pg;

#[cfg(feature = "mssql")]
pub mod mssql;

pub use bind::Bound;
pub use config::DbConfig;
pub use connection::{Connection, OpenScope};
pub use crud::{Model, Statements, TableName};
pub use db::Db;
pub use dialect::Dialect;
pub use error::{DbError, DbResult};
pub use introspect::{ColumnCache, TableKey};
pub use mapping::{MappingError, MappingErrorKind, with_mapping_check};
pub use params::{Params, ToParams};
pub use query::{Query, query, query_with};
pub use row::{ColumnDesc, FieldSlots, FromRow, ResultSchema, Row, materialize, scalar_from_row};
pub use shape::{Field, FieldType, Shape, ShapeKind};
pub use value::{FromValue, SqlType, ToValue, Value, ValueError};

#[cfg(feature = "postgres")]
pub use pg::PgConnection;

#[cfg(feature = "mssql")]
pub use mssql::MssqlConnection;

#[cfg(feature = "derive")]
pub use plainq_derive::{FromRow, IntEnum, Model, ToParams};
