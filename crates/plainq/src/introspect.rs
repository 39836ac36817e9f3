//! Table schema discovery.
//!
//! Column metadata (key, identity, nullability) comes from a schema-only
//! `SELECT * FROM <table>` probe and is cached for the life of the process, keyed by
//! table and connection identity so two databases with the same table names never
//! share an entry. Only successful probes are cached.

use crate::config::DbConfig;
use crate::connection::{Connection, OpenScope};
use crate::dialect::Dialect;
use crate::error::DbResult;
use crate::mapping;
use crate::row::ColumnDesc;
use crate::shape::Shape;
use dashmap::{DashMap, DashSet};
use std::any::TypeId;
use std::sync::{Arc, LazyLock};

/// Cache key for a table's columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub table: String,
    pub identity: String,
}

impl TableKey {
    pub fn new(table: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            identity: identity.into(),
        }
    }
}

/// A statement text whose result already passed the mapping check for a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CheckedQuery {
    identity: String,
    sql: String,
    type_id: TypeId,
    underscores: bool,
}

/// Process-wide schema cache.
#[derive(Debug, Default)]
pub struct ColumnCache {
    tables: DashMap<TableKey, Arc<[ColumnDesc]>>,
    checked: DashSet<CheckedQuery>,
}

static GLOBAL: LazyLock<ColumnCache> = LazyLock::new(ColumnCache::default);

impl ColumnCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every [`Db`](crate::Db).
    pub fn global() -> &'static ColumnCache {
        &GLOBAL
    }

    /// Cached columns of `table`, if probed before.
    pub fn get(&self, table: &str, identity: &str) -> Option<Arc<[ColumnDesc]>> {
        self.tables
            .get(&TableKey::new(table, identity))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Columns of `table` on `conn`, probing the database on first use.
    ///
    /// When mapping checks are enabled the columns are checked against `shape`, on the
    /// first probe and on every cache hit.
    pub async fn columns<C: Connection>(
        &self,
        conn: &mut C,
        table: &str,
        shape: &Shape,
        dialect: &dyn Dialect,
        config: &DbConfig,
    ) -> DbResult<Arc<[ColumnDesc]>> {
        let key = TableKey::new(table, conn.identity());
        let check = config.mapping_check_enabled();
        let underscores = config.match_names_with_underscores;

        if let Some(hit) = self.tables.get(&key).map(|e| Arc::clone(e.value())) {
            tracing::trace!(target: "plainq.schema", table, "schema cache hit");
            if check {
                mapping::check(&hit, shape, dialect, underscores)?;
            }
            return Ok(hit);
        }

        let probe = format!("SELECT * FROM {table}");
        tracing::debug!(target: "plainq.schema", table, sql = %probe, "probing table schema");
        let scope = OpenScope::enter(conn).await?;
        let described = conn.describe(&probe, &[]).await;
        let schema = scope.exit(conn, described).await?;

        if check {
            mapping::check(&schema, shape, dialect, underscores)?;
        }

        let columns: Arc<[ColumnDesc]> = schema.into();
        let cached = Arc::clone(self.tables.entry(key).or_insert(columns).value());
        tracing::debug!(
            target: "plainq.schema",
            table,
            columns = cached.len(),
            "cached table schema"
        );
        Ok(cached)
    }

    /// Whether `sql` was already checked against `shape` on this database.
    pub(crate) fn query_checked(
        &self,
        identity: &str,
        sql: &str,
        shape: &Shape,
        underscores: bool,
    ) -> bool {
        self.checked.contains(&CheckedQuery {
            identity: identity.to_string(),
            sql: sql.to_string(),
            type_id: shape.type_id(),
            underscores,
        })
    }

    pub(crate) fn mark_query_checked(
        &self,
        identity: &str,
        sql: &str,
        shape: &Shape,
        underscores: bool,
    ) {
        self.checked.insert(CheckedQuery {
            identity: identity.to_string(),
            sql: sql.to_string(),
            type_id: shape.type_id(),
            underscores,
        });
    }
}
