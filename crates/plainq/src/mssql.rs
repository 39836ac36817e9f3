//! SQL Server backend over `tiberius`.
//!
//! The schema-only probe uses `sp_describe_first_result_set` in browse mode, which
//! reports nullability, identity, computed and key membership per result column
//! without running the statement.

use crate::connection::Connection;
use crate::dialect::SQL_SERVER_DRIVER;
use crate::error::{DbError, DbResult};
use crate::row::{ColumnDesc, ResultSchema, Row};
use crate::value::{SqlType, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tiberius::{Client, ColumnData, Config, FromSql, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

const DESCRIBE_SQL: &str =
    "EXEC sp_describe_first_result_set @tsql = @P1, @params = @P2, @browse_information_mode = 1";

/// A SQL Server connection.
pub struct MssqlConnection {
    config: Config,
    identity: String,
    client: Option<Client<Compat<TcpStream>>>,
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("identity", &self.identity)
            .field("open", &self.client.is_some())
            .finish()
    }
}

impl MssqlConnection {
    /// `identity` distinguishes databases in the schema cache.
    pub fn new(config: Config, identity: impl Into<String>) -> Self {
        Self {
            config,
            identity: identity.into(),
            client: None,
        }
    }

    /// Parse an ADO.NET style connection string
    /// (`server=tcp:localhost,1433;database=blog;user=sa;password=...`).
    pub fn from_ado_string(connection_string: &str) -> DbResult<Self> {
        let config = Config::from_ado_string(connection_string)?;
        Ok(Self::new(config, connection_string))
    }

    fn client(&mut self) -> DbResult<&mut Client<Compat<TcpStream>>> {
        self.client
            .as_mut()
            .ok_or_else(|| DbError::Other("SQL Server connection is closed".to_string()))
    }
}

impl Connection for MssqlConnection {
    fn driver(&self) -> &str {
        SQL_SERVER_DRIVER
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn open(&mut self) -> DbResult<()> {
        let tcp = TcpStream::connect(self.config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        let client = Client::connect(self.config.clone(), tcp.compat_write()).await?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }

    async fn describe(&mut self, sql: &str, params: &[Value]) -> DbResult<ResultSchema> {
        let declarations = declare_params(params)?;
        let declarations = (!declarations.is_empty()).then_some(declarations);
        let rows = self
            .client()?
            .query(DESCRIBE_SQL, &[&sql, &declarations])
            .await?
            .into_first_result()
            .await?;

        let mut schema = Vec::with_capacity(rows.len());
        for row in &rows {
            if row.try_get::<bool, _>("is_hidden")?.unwrap_or(false) {
                continue;
            }
            let name = row.try_get::<&str, _>("name")?.unwrap_or_default();
            let provider_type = row
                .try_get::<&str, _>("system_type_name")?
                .unwrap_or_default();
            let flag = |column: &str| -> DbResult<bool> {
                Ok(row.try_get::<bool, _>(column)?.unwrap_or(false))
            };
            schema.push(ColumnDesc {
                name: name.to_string(),
                sql_type: sql_type_of(provider_type),
                provider_type: provider_type.to_string(),
                allow_null: flag("is_nullable")?,
                is_key: flag("is_part_of_unique_key")?,
                is_auto_increment: flag("is_identity_column")?,
                is_read_only: flag("is_computed_column")?,
            });
        }
        Ok(schema)
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let params = bind_params(params)?;
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let rows = self
            .client()?
            .query(sql, &refs)
            .await?
            .into_first_result()
            .await?;

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Arc<[String]> = first.columns().iter().map(|c| c.name().to_string()).collect();
        rows.into_iter()
            .map(|row| {
                let values = row
                    .into_iter()
                    .enumerate()
                    .map(|(idx, data)| read_value(&data, &columns[idx]))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(Row::new(Arc::clone(&columns), values))
            })
            .collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let params = bind_params(params)?;
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let result = self.client()?.execute(sql, &refs).await?;
        Ok(result.total())
    }
}

/// Mapped scalar type of a `system_type_name` such as `nvarchar(50)`.
pub fn sql_type_of(system_type_name: &str) -> Option<SqlType> {
    let base = system_type_name
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    Some(match base.as_str() {
        "tinyint" => SqlType::TinyInt,
        "smallint" => SqlType::SmallInt,
        "int" => SqlType::Int,
        "bigint" => SqlType::BigInt,
        "real" => SqlType::Real,
        // money is returned as float by the driver
        "float" | "money" | "smallmoney" => SqlType::Double,
        "decimal" | "numeric" => SqlType::Decimal,
        "bit" => SqlType::Bool,
        "uniqueidentifier" => SqlType::Uuid,
        "datetime" | "datetime2" | "smalldatetime" => SqlType::DateTime,
        "datetimeoffset" => SqlType::DateTimeUtc,
        "date" => SqlType::Date,
        "char" | "varchar" | "nchar" | "nvarchar" | "text" | "ntext" | "xml" => SqlType::String,
        "binary" | "varbinary" | "image" | "timestamp" | "rowversion" => SqlType::Bytes,
        _ => return None,
    })
}

/// A value bound as a positional `@Pn` parameter.
struct Param<'a>(&'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> ColumnData<'_> {
        match self.0 {
            Value::Null(ty) => null_data(*ty),
            Value::TinyInt(v) => v.to_sql(),
            Value::SmallInt(v) => v.to_sql(),
            Value::Int(v) => v.to_sql(),
            Value::BigInt(v) => v.to_sql(),
            Value::Real(v) => v.to_sql(),
            Value::Double(v) => v.to_sql(),
            Value::Decimal(v) => v.to_sql(),
            Value::Bool(v) => v.to_sql(),
            Value::Uuid(v) => v.to_sql(),
            Value::DateTime(v) => v.to_sql(),
            Value::DateTimeUtc(v) => v.to_sql(),
            Value::Date(v) => v.to_sql(),
            Value::String(v) => v.to_sql(),
            Value::Bytes(v) => v.to_sql(),
            // Rejected by `bind_params`.
            Value::Array(ty, _) => null_data(*ty),
        }
    }
}

fn null_data(ty: SqlType) -> ColumnData<'static> {
    match ty {
        SqlType::TinyInt => ColumnData::U8(None),
        SqlType::SmallInt => ColumnData::I16(None),
        SqlType::Int => ColumnData::I32(None),
        SqlType::BigInt => ColumnData::I64(None),
        SqlType::Real => ColumnData::F32(None),
        SqlType::Double => ColumnData::F64(None),
        SqlType::Decimal => ColumnData::Numeric(None),
        SqlType::Bool => ColumnData::Bit(None),
        SqlType::Uuid => ColumnData::Guid(None),
        SqlType::DateTime => ColumnData::DateTime2(None),
        SqlType::DateTimeUtc => ColumnData::DateTimeOffset(None),
        SqlType::Date => ColumnData::Date(None),
        SqlType::String => ColumnData::String(None),
        SqlType::Bytes => ColumnData::Binary(None),
    }
}

fn bind_params(params: &[Value]) -> DbResult<Vec<Param<'_>>> {
    params
        .iter()
        .map(|v| match v {
            Value::Array(..) => Err(DbError::validation(
                "array parameters are not supported by SQL Server",
            )),
            other => Ok(Param(other)),
        })
        .collect()
}

/// `@P1 int, @P2 nvarchar(max), ...` for `sp_describe_first_result_set`.
fn declare_params(params: &[Value]) -> DbResult<String> {
    let declarations = params
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            let ty = match value {
                Value::Array(..) => {
                    return Err(DbError::validation(
                        "array parameters are not supported by SQL Server",
                    ));
                }
                Value::Decimal(d) => format!("decimal(38,{})", d.scale()),
                other => declared_type(other.sql_type()).to_string(),
            };
            Ok(format!("@P{} {ty}", idx + 1))
        })
        .collect::<DbResult<Vec<_>>>()?;
    Ok(declarations.join(", "))
}

fn declared_type(ty: SqlType) -> &'static str {
    match ty {
        SqlType::TinyInt => "tinyint",
        SqlType::SmallInt => "smallint",
        SqlType::Int => "int",
        SqlType::BigInt => "bigint",
        SqlType::Real => "real",
        SqlType::Double => "float",
        SqlType::Decimal => "decimal(38,8)",
        SqlType::Bool => "bit",
        SqlType::Uuid => "uniqueidentifier",
        SqlType::DateTime => "datetime2",
        SqlType::DateTimeUtc => "datetimeoffset",
        SqlType::Date => "date",
        SqlType::String => "nvarchar(max)",
        SqlType::Bytes => "varbinary(max)",
    }
}

fn read_value(data: &ColumnData<'static>, column: &str) -> DbResult<Value> {
    let decode = |e: tiberius::error::Error| DbError::decode(column, e.to_string());
    Ok(match data {
        ColumnData::U8(v) => v.map_or(Value::Null(SqlType::TinyInt), Value::TinyInt),
        ColumnData::I16(v) => v.map_or(Value::Null(SqlType::SmallInt), Value::SmallInt),
        ColumnData::I32(v) => v.map_or(Value::Null(SqlType::Int), Value::Int),
        ColumnData::I64(v) => v.map_or(Value::Null(SqlType::BigInt), Value::BigInt),
        ColumnData::F32(v) => v.map_or(Value::Null(SqlType::Real), Value::Real),
        ColumnData::F64(v) => v.map_or(Value::Null(SqlType::Double), Value::Double),
        ColumnData::Bit(v) => v.map_or(Value::Null(SqlType::Bool), Value::Bool),
        ColumnData::Guid(v) => v.map_or(Value::Null(SqlType::Uuid), Value::Uuid),
        ColumnData::String(v) => v
            .as_ref()
            .map_or(Value::Null(SqlType::String), |s| Value::String(s.to_string())),
        ColumnData::Binary(v) => v
            .as_ref()
            .map_or(Value::Null(SqlType::Bytes), |b| Value::Bytes(b.to_vec())),
        ColumnData::Xml(v) => v
            .as_ref()
            .map_or(Value::Null(SqlType::String), |x| {
                Value::String(x.clone().into_owned().into_string())
            }),
        ColumnData::Numeric(_) => Decimal::from_sql(data)
            .map_err(decode)?
            .map_or(Value::Null(SqlType::Decimal), Value::Decimal),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)
                .map_err(decode)?
                .map_or(Value::Null(SqlType::DateTime), Value::DateTime)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .map_err(decode)?
            .map_or(Value::Null(SqlType::Date), Value::Date),
        ColumnData::DateTimeOffset(_) => DateTime::<Utc>::from_sql(data)
            .map_err(decode)?
            .map_or(Value::Null(SqlType::DateTimeUtc), Value::DateTimeUtc),
        other => {
            return Err(DbError::decode(
                column,
                format!("unsupported SQL Server value {other:?}"),
            ));
        }
    })
}
