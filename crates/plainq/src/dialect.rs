//! Backend-specific SQL rendering.
//!
//! A [`Dialect`] is a stateless strategy: identifier quoting, positional placeholder
//! syntax, the generated-key insert statement shape, and whether source nullability
//! must match non-`Option` destination fields exactly.

use crate::error::{DbError, DbResult};
use std::fmt;

/// SQL rendering strategy for one backend.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Short backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Quote an identifier (`[name]` or `"name"`), escaping the closing quote.
    fn quote_ident(&self, name: &str) -> String;

    /// Positional placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Whether a nullable source column must map to an `Option<T>` field.
    ///
    /// Postgres reports every view column (and every expression) as nullable, so the
    /// check would reject correct destination types there.
    fn nullability_check_applies(&self) -> bool;

    /// Whether `[...]` delimits a quoted identifier (rather than an array subscript).
    fn bracket_identifiers(&self) -> bool {
        false
    }

    /// Whether `E'...'` escape strings and `$tag$...$tag$` bodies are literals.
    fn postgres_literals(&self) -> bool {
        false
    }

    /// `INSERT` that returns the generated key column.
    fn insert_returning_key(&self, table: &str, columns: &str, values: &str, key: &str) -> String;
}

/// PostgreSQL: `"ident"`, `$n`, `RETURNING`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

/// SQL Server: `[ident]`, `@Pn`, `OUTPUT inserted.`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer;

pub static POSTGRES: Postgres = Postgres;
pub static SQL_SERVER: SqlServer = SqlServer;

/// Driver identity reported by the tokio-postgres backend.
pub const POSTGRES_DRIVER: &str = "tokio-postgres";
/// Driver identity reported by the tiberius backend.
pub const SQL_SERVER_DRIVER: &str = "tiberius";

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn nullability_check_applies(&self) -> bool {
        false
    }

    fn postgres_literals(&self) -> bool {
        true
    }

    fn insert_returning_key(&self, table: &str, columns: &str, values: &str, key: &str) -> String {
        format!("INSERT INTO {table} ({columns}) VALUES ({values}) RETURNING {key}")
    }
}

impl Dialect for SqlServer {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@P{index}")
    }

    fn nullability_check_applies(&self) -> bool {
        true
    }

    fn bracket_identifiers(&self) -> bool {
        true
    }

    fn insert_returning_key(&self, table: &str, columns: &str, values: &str, key: &str) -> String {
        format!("INSERT INTO {table} ({columns}) OUTPUT inserted.{key} VALUES ({values})")
    }
}

/// Select the dialect for a connection's driver identity.
pub fn for_driver(driver: &str) -> DbResult<&'static dyn Dialect> {
    match driver {
        POSTGRES_DRIVER => Ok(&POSTGRES),
        SQL_SERVER_DRIVER => Ok(&SQL_SERVER),
        other => Err(DbError::UnknownConnectionType(other.to_string())),
    }
}
