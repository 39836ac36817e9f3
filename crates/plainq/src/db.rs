//! The connection wrapper every operation runs through.

use crate::bind::Bound;
use crate::config::DbConfig;
use crate::connection::{Connection, OpenScope};
use crate::crud::{Model, Statements};
use crate::dialect::{self, Dialect};
use crate::error::{DbError, DbResult};
use crate::introspect::ColumnCache;
use crate::mapping;
use crate::params::ToParams;
use crate::query::{Query, query_with};
use crate::row::{ColumnDesc, FromRow, materialize};
use std::sync::Arc;

/// A connection together with its dialect and mapping configuration.
///
/// # Example
///
/// ```ignore
/// use plainq::{Db, DbConfig, PgConnection, params, query_with};
///
/// let conn = PgConnection::from_url(&database_url)?;
/// let mut db = Db::with_config(conn, DbConfig::from_env()?)?;
///
/// let id: i32 = db.insert_returning_key::<i32, _>(&post).await?;
/// let post: Post = db.get_by_key::<Post>(params! { "PostId" => id }).await?;
/// ```
#[derive(Debug)]
pub struct Db<C> {
    conn: C,
    config: DbConfig,
    dialect: &'static dyn Dialect,
    // Set while an operation's scope holds a connection it opened.
    scope_opened: bool,
}

impl<C: Connection> Db<C> {
    /// Wrap a connection with the default configuration.
    ///
    /// Fails with [`DbError::UnknownConnectionType`] when the driver has no dialect.
    pub fn new(conn: C) -> DbResult<Self> {
        Self::with_config(conn, DbConfig::default())
    }

    pub fn with_config(conn: C, config: DbConfig) -> DbResult<Self> {
        let dialect = dialect::for_driver(conn.driver())?;
        Ok(Self {
            conn,
            config,
            dialect,
            scope_opened: false,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Introspected columns of `R`'s table (cached process-wide).
    pub async fn columns<R: Model>(&mut self) -> DbResult<Arc<[ColumnDesc]>> {
        let table = R::table().render(self.dialect);
        ColumnCache::global()
            .columns(&mut self.conn, &table, &R::shape(), self.dialect, &self.config)
            .await
    }

    /// Insert `record` and return the generated identity value.
    pub async fn insert_returning_key<K: FromRow, R: Model>(&mut self, record: &R) -> DbResult<K> {
        let scope = self.enter().await?;
        let result = async {
            let columns = self.columns::<R>().await?;
            let sql = self.statements::<R>(&columns).insert_returning_key()?;
            let bound = query_with(sql, record).bind(self.dialect);
            let keys: Vec<K> = self.fetch_bound(&bound).await?;
            single_row(keys)
        }
        .await;
        self.exit(scope, result).await
    }

    /// Insert `record`; returns the affected row count.
    pub async fn insert<R: Model>(&mut self, record: &R) -> DbResult<u64> {
        let scope = self.enter().await?;
        let result = async {
            let columns = self.columns::<R>().await?;
            let sql = self.statements::<R>(&columns).insert()?;
            let bound = query_with(sql, record).bind(self.dialect);
            self.execute_bound(&bound).await
        }
        .await;
        self.exit(scope, result).await
    }

    /// Update the row with `record`'s key; returns the affected row count.
    pub async fn update<R: Model>(&mut self, record: &R) -> DbResult<u64> {
        let scope = self.enter().await?;
        let result = async {
            let columns = self.columns::<R>().await?;
            let sql = self.statements::<R>(&columns).update()?;
            let bound = query_with(sql, record).bind(self.dialect);
            self.execute_bound(&bound).await
        }
        .await;
        self.exit(scope, result).await
    }

    /// Delete the `R` row whose key columns match `key`.
    pub async fn delete<R: Model>(&mut self, key: impl ToParams) -> DbResult<u64> {
        let scope = self.enter().await?;
        let result = async {
            let columns = self.columns::<R>().await?;
            let sql = self.statements::<R>(&columns).delete()?;
            let bound = query_with(sql, key).bind(self.dialect);
            self.execute_bound(&bound).await
        }
        .await;
        self.exit(scope, result).await
    }

    /// Read the `R` row whose key columns match `key`.
    pub async fn get_by_key<R: Model>(&mut self, key: impl ToParams) -> DbResult<R> {
        let scope = self.enter().await?;
        let result = async {
            let columns = self.columns::<R>().await?;
            let sql = self.statements::<R>(&columns).get_by_key()?;
            let bound = query_with(sql, key).bind(self.dialect);
            let rows: Vec<R> = self.fetch_bound(&bound).await?;
            single_row(rows)
        }
        .await;
        self.exit(scope, result).await
    }

    fn statements<'a, R: Model>(&self, columns: &'a [ColumnDesc]) -> Statements<'a> {
        Statements::for_model::<R>(columns, self.dialect, self.config.match_names_with_underscores)
    }

    /// Run a row-returning query, checking its result schema first when enabled.
    pub(crate) async fn fetch<T: FromRow>(&mut self, query: &Query) -> DbResult<Vec<T>> {
        let bound = query.bind(self.dialect);
        let scope = self.enter().await?;
        let result = self.fetch_bound::<T>(&bound).await;
        self.exit(scope, result).await
    }

    pub(crate) async fn execute(&mut self, query: &Query) -> DbResult<u64> {
        let bound = query.bind(self.dialect);
        let scope = self.enter().await?;
        let result = self.execute_bound(&bound).await;
        self.exit(scope, result).await
    }

    /// Open the connection for one operation if it is closed.
    ///
    /// An operation dropped before it finished leaves open a connection its scope
    /// opened; the next operation closes it first so the closed state is restored.
    async fn enter(&mut self) -> DbResult<OpenScope> {
        if std::mem::take(&mut self.scope_opened) && self.conn.is_open() {
            tracing::debug!(
                target: "plainq.sql",
                "closing connection left open by a dropped operation"
            );
            self.conn.close().await?;
        }
        let scope = OpenScope::enter(&mut self.conn).await?;
        self.scope_opened = scope.opened();
        Ok(scope)
    }

    async fn exit<T>(&mut self, scope: OpenScope, result: DbResult<T>) -> DbResult<T> {
        self.scope_opened = false;
        scope.exit(&mut self.conn, result).await
    }

    async fn execute_bound(&mut self, bound: &Bound) -> DbResult<u64> {
        tracing::debug!(
            target: "plainq.sql",
            dialect = self.dialect.name(),
            sql = %bound.sql,
            params = bound.values.len(),
            "execute"
        );
        self.conn.execute(&bound.sql, &bound.values).await
    }

    async fn fetch_bound<T: FromRow>(&mut self, bound: &Bound) -> DbResult<Vec<T>> {
        let underscores = self.config.match_names_with_underscores;
        if self.config.mapping_check_enabled() {
            self.check_query::<T>(bound, underscores).await?;
        }
        tracing::debug!(
            target: "plainq.sql",
            dialect = self.dialect.name(),
            sql = %bound.sql,
            params = bound.values.len(),
            "query"
        );
        let rows = self.conn.query(&bound.sql, &bound.values).await?;
        materialize(&rows, underscores)
    }

    async fn check_query<T: FromRow>(&mut self, bound: &Bound, underscores: bool) -> DbResult<()> {
        let shape = T::shape();
        let cache = ColumnCache::global();
        if cache.query_checked(self.conn.identity(), &bound.sql, &shape, underscores) {
            return Ok(());
        }
        tracing::debug!(target: "plainq.schema", sql = %bound.sql, "describing result schema");
        let schema = self.conn.describe(&bound.sql, &bound.values).await?;
        mapping::check(&schema, &shape, self.dialect, underscores)?;
        cache.mark_query_checked(self.conn.identity(), &bound.sql, &shape, underscores);
        Ok(())
    }
}

fn single_row<T>(rows: Vec<T>) -> DbResult<T> {
    let got = rows.len();
    let mut rows = rows.into_iter();
    match (rows.next(), got) {
        (Some(row), 1) => Ok(row),
        (None, _) => Err(DbError::not_found("Expected 1 row, got 0")),
        _ => Err(DbError::too_many_rows(1, got)),
    }
}
