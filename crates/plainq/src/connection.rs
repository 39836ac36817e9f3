//! The database connection boundary.
//!
//! [`Connection`] is everything the mapping layer needs from a driver: open/close,
//! a schema-only probe, and statement execution with positional [`Value`]s. The
//! built-in backends are [`PgConnection`](crate::PgConnection) and
//! [`MssqlConnection`](crate::MssqlConnection).

use crate::error::DbResult;
use crate::row::{ResultSchema, Row};
use crate::value::Value;
use std::future::Future;

/// A single database connection.
///
/// Methods take `&mut self`: a connection is never used by two operations at once.
pub trait Connection: Send {
    /// Driver identity used to select the SQL dialect.
    fn driver(&self) -> &str;

    /// String identifying the target database (schema cache key).
    fn identity(&self) -> &str;

    fn is_open(&self) -> bool;

    fn open(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    fn close(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Describe the result columns of `sql` without returning rows.
    fn describe(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<ResultSchema>> + Send;

    /// Execute a row-returning statement.
    fn query(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<Vec<Row>>> + Send;

    /// Execute a statement and return the affected row count.
    fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<u64>> + Send;
}

/// Opens a closed connection for the duration of one operation.
///
/// Closing happens in [`OpenScope::exit`]. A scope dropped before `exit` runs leaves
/// the connection open; [`Db`](crate::Db) closes such a connection at its next operation.
///
/// ```ignore
/// let scope = OpenScope::enter(conn).await?;
/// let result = work(conn).await;
/// scope.exit(conn, result).await
/// ```
#[must_use = "a scope must be exited to restore the connection state"]
#[derive(Debug)]
pub struct OpenScope {
    opened: bool,
}

impl OpenScope {
    /// Open `conn` if it is closed.
    pub async fn enter<C: Connection>(conn: &mut C) -> DbResult<Self> {
        if conn.is_open() {
            return Ok(Self { opened: false });
        }
        conn.open().await?;
        Ok(Self { opened: true })
    }

    /// Close `conn` again if [`OpenScope::enter`] opened it, then return `result`.
    ///
    /// An error from `result` takes precedence over a close error.
    pub async fn exit<C: Connection, T>(self, conn: &mut C, result: DbResult<T>) -> DbResult<T> {
        if !self.opened {
            return result;
        }
        let closed = conn.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Whether this scope opened the connection.
    pub fn opened(&self) -> bool {
        self.opened
    }
}
