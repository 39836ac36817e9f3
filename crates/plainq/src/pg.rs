//! PostgreSQL backend over `tokio-postgres`.
//!
//! Statements are prepared with declared parameter types so typed NULLs bind. The
//! schema-only probe prepares the statement and looks up nullability, primary-key,
//! identity/serial and generated flags for every column that comes from a table.

use crate::connection::Connection;
use crate::dialect::POSTGRES_DRIVER;
use crate::error::{DbError, DbResult};
use crate::row::{ColumnDesc, ResultSchema, Row};
use crate::value::{SqlType, Value};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_postgres::types::{IsNull, ToSql, Type};
use tokio_postgres::{Client, Config, NoTls, Statement};
use uuid::Uuid;

const COLUMN_FLAGS_SQL: &str = "\
SELECT c.rel, c.num, a.attnotnull, \
       (a.attidentity <> '' OR COALESCE(pg_get_expr(d.adbin, d.adrelid) LIKE 'nextval(%', false)) AS auto, \
       a.attgenerated <> '' AS generated, \
       EXISTS (SELECT 1 FROM pg_index i \
               WHERE i.indrelid = a.attrelid AND i.indisprimary AND a.attnum = ANY(i.indkey)) AS is_key \
FROM unnest($1::oid[], $2::int2[]) AS c(rel, num) \
JOIN pg_attribute a ON a.attrelid = c.rel AND a.attnum = c.num \
LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum";

/// A PostgreSQL connection.
///
/// Created closed; [`Connection::open`] connects and spawns the connection driver task.
pub struct PgConnection {
    config: Config,
    identity: String,
    client: Option<Client>,
    driver: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("identity", &self.identity)
            .field("open", &self.is_open())
            .finish()
    }
}

impl PgConnection {
    /// `identity` distinguishes databases in the schema cache.
    pub fn new(config: Config, identity: impl Into<String>) -> Self {
        Self {
            config,
            identity: identity.into(),
            client: None,
            driver: None,
        }
    }

    /// Parse a `postgres://` URL or key-value connection string.
    pub fn from_url(url: &str) -> DbResult<Self> {
        let config: Config = url.parse()?;
        Ok(Self::new(config, url))
    }

    fn client(&self) -> DbResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| DbError::Other("Postgres connection is closed".to_string()))
    }

    async fn prepare(&self, sql: &str, params: &[Value]) -> DbResult<Statement> {
        let types: Vec<Type> = params.iter().map(param_type).collect();
        Ok(self.client()?.prepare_typed(sql, &types).await?)
    }

    async fn column_flags(&self, stmt: &Statement) -> DbResult<HashMap<(u32, i16), ColumnFlags>> {
        let (rels, nums): (Vec<u32>, Vec<i16>) = stmt
            .columns()
            .iter()
            .filter_map(|c| Some((c.table_oid()?, c.column_id()?)))
            .unzip();
        if rels.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = self
            .client()?
            .query(COLUMN_FLAGS_SQL, &[&rels, &nums])
            .await?;
        rows.iter()
            .map(|r| {
                let flags = ColumnFlags {
                    not_null: r.try_get("attnotnull")?,
                    auto: r.try_get("auto")?,
                    generated: r.try_get("generated")?,
                    key: r.try_get("is_key")?,
                };
                Ok(((r.try_get("rel")?, r.try_get("num")?), flags))
            })
            .collect::<Result<_, tokio_postgres::Error>>()
            .map_err(DbError::from)
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnFlags {
    not_null: bool,
    auto: bool,
    generated: bool,
    key: bool,
}

impl Connection for PgConnection {
    fn driver(&self) -> &str {
        POSTGRES_DRIVER
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn is_open(&self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    async fn open(&mut self) -> DbResult<()> {
        let (client, connection) = self.config.connect(NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target: "plainq.sql", error = %e, "postgres connection error");
            }
        });
        self.client = Some(client);
        self.driver = Some(driver);
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        self.client = None;
        if let Some(driver) = self.driver.take() {
            driver
                .await
                .map_err(|e| DbError::Other(format!("postgres connection task failed: {e}")))?;
        }
        Ok(())
    }

    async fn describe(&mut self, sql: &str, params: &[Value]) -> DbResult<ResultSchema> {
        let stmt = self.prepare(sql, params).await?;
        let flags = self.column_flags(&stmt).await?;
        Ok(stmt
            .columns()
            .iter()
            .map(|c| {
                let found = c
                    .table_oid()
                    .zip(c.column_id())
                    .and_then(|k| flags.get(&k).copied());
                ColumnDesc {
                    name: c.name().to_string(),
                    sql_type: sql_type_of(c.type_()),
                    provider_type: c.type_().name().to_string(),
                    allow_null: found.is_none_or(|f| !f.not_null),
                    is_key: found.is_some_and(|f| f.key),
                    is_auto_increment: found.is_some_and(|f| f.auto),
                    is_read_only: found.is_some_and(|f| f.generated),
                }
            })
            .collect())
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let stmt = self.prepare(sql, params).await?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|v| v as _).collect();
        let rows = self.client()?.query(&stmt, &refs).await?;
        let columns: Arc<[String]> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        rows.iter()
            .map(|r| {
                let values = stmt
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, c)| read_value(r, idx, c.name(), c.type_()))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(Row::new(Arc::clone(&columns), values))
            })
            .collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let stmt = self.prepare(sql, params).await?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|v| v as _).collect();
        Ok(self.client()?.execute(&stmt, &refs).await?)
    }
}

/// Mapped scalar type of a Postgres column type.
pub fn sql_type_of(ty: &Type) -> Option<SqlType> {
    Some(match *ty {
        Type::INT2 => SqlType::SmallInt,
        Type::INT4 => SqlType::Int,
        Type::INT8 => SqlType::BigInt,
        Type::FLOAT4 => SqlType::Real,
        Type::FLOAT8 => SqlType::Double,
        Type::NUMERIC => SqlType::Decimal,
        Type::BOOL => SqlType::Bool,
        Type::UUID => SqlType::Uuid,
        Type::TIMESTAMP => SqlType::DateTime,
        Type::TIMESTAMPTZ => SqlType::DateTimeUtc,
        Type::DATE => SqlType::Date,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => SqlType::String,
        Type::BYTEA => SqlType::Bytes,
        _ => return None,
    })
}

fn scalar_type(ty: SqlType) -> Type {
    match ty {
        SqlType::TinyInt | SqlType::SmallInt => Type::INT2,
        SqlType::Int => Type::INT4,
        SqlType::BigInt => Type::INT8,
        SqlType::Real => Type::FLOAT4,
        SqlType::Double => Type::FLOAT8,
        SqlType::Decimal => Type::NUMERIC,
        SqlType::Bool => Type::BOOL,
        SqlType::Uuid => Type::UUID,
        SqlType::DateTime => Type::TIMESTAMP,
        SqlType::DateTimeUtc => Type::TIMESTAMPTZ,
        SqlType::Date => Type::DATE,
        SqlType::String => Type::TEXT,
        SqlType::Bytes => Type::BYTEA,
    }
}

fn array_type(ty: SqlType) -> Type {
    match ty {
        SqlType::TinyInt | SqlType::SmallInt => Type::INT2_ARRAY,
        SqlType::Int => Type::INT4_ARRAY,
        SqlType::BigInt => Type::INT8_ARRAY,
        SqlType::Real => Type::FLOAT4_ARRAY,
        SqlType::Double => Type::FLOAT8_ARRAY,
        SqlType::Decimal => Type::NUMERIC_ARRAY,
        SqlType::Bool => Type::BOOL_ARRAY,
        SqlType::Uuid => Type::UUID_ARRAY,
        SqlType::DateTime => Type::TIMESTAMP_ARRAY,
        SqlType::DateTimeUtc => Type::TIMESTAMPTZ_ARRAY,
        SqlType::Date => Type::DATE_ARRAY,
        SqlType::String => Type::TEXT_ARRAY,
        SqlType::Bytes => Type::BYTEA_ARRAY,
    }
}

fn param_type(value: &Value) -> Type {
    match value {
        Value::Array(ty, _) => array_type(*ty),
        other => scalar_type(other.sql_type()),
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null(_) => Ok(IsNull::Yes),
            Value::TinyInt(v) => i16::from(*v).to_sql(ty, out),
            Value::SmallInt(v) => v.to_sql(ty, out),
            Value::Int(v) => v.to_sql(ty, out),
            Value::BigInt(v) => v.to_sql(ty, out),
            Value::Real(v) => v.to_sql(ty, out),
            Value::Double(v) => v.to_sql(ty, out),
            Value::Decimal(v) => v.to_sql(ty, out),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::DateTime(v) => v.to_sql(ty, out),
            Value::DateTimeUtc(v) => v.to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::String(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Array(_, items) => items.to_sql(ty, out),
        }
    }

    // The declared statement types come from the values themselves.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

macro_rules! read {
    ($row:expr, $idx:expr, $name:expr, $ty:ty, $variant:ident) => {
        $row.try_get::<_, Option<$ty>>($idx)
            .map_err(|e| DbError::decode($name, e.to_string()))?
            .map_or(Value::Null(SqlType::$variant), Value::$variant)
    };
}

fn read_value(row: &tokio_postgres::Row, idx: usize, name: &str, ty: &Type) -> DbResult<Value> {
    let sql_type = sql_type_of(ty).ok_or_else(|| {
        DbError::decode(name, format!("unsupported Postgres type '{}'", ty.name()))
    })?;
    Ok(match sql_type {
        SqlType::TinyInt | SqlType::SmallInt => read!(row, idx, name, i16, SmallInt),
        SqlType::Int => read!(row, idx, name, i32, Int),
        SqlType::BigInt => read!(row, idx, name, i64, BigInt),
        SqlType::Real => read!(row, idx, name, f32, Real),
        SqlType::Double => read!(row, idx, name, f64, Double),
        SqlType::Decimal => read!(row, idx, name, Decimal, Decimal),
        SqlType::Bool => read!(row, idx, name, bool, Bool),
        SqlType::Uuid => read!(row, idx, name, Uuid, Uuid),
        SqlType::DateTime => read!(row, idx, name, NaiveDateTime, DateTime),
        SqlType::DateTimeUtc => read!(row, idx, name, DateTime<Utc>, DateTimeUtc),
        SqlType::Date => read!(row, idx, name, NaiveDate, Date),
        SqlType::String => read!(row, idx, name, String, String),
        SqlType::Bytes => read!(row, idx, name, Vec<u8>, Bytes),
    })
}
