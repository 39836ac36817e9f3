//! In-memory connection that records every call.

#![allow(dead_code)]

use plainq::dialect::{POSTGRES_DRIVER, SQL_SERVER_DRIVER};
use plainq::{Connection, DbError, DbResult, ResultSchema, Row, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_IDENTITY: AtomicUsize = AtomicUsize::new(0);

/// A connection identity no other test uses, so the process-wide caches never leak
/// between tests.
pub fn unique_identity(name: &str) -> String {
    format!("fake://{name}/{}", NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Default)]
pub struct FakeConnection {
    pub driver: String,
    pub identity: String,
    pub open: bool,
    pub opens: usize,
    pub closes: usize,
    /// SQL text of every schema-only probe.
    pub probes: Vec<String>,
    /// SQL text and parameters of every executed statement.
    pub statements: Vec<(String, Vec<Value>)>,
    /// Columns reported for `SELECT * FROM {table}` probes.
    pub tables: HashMap<String, ResultSchema>,
    /// Columns reported for any other probe.
    pub result_schema: ResultSchema,
    pub results: VecDeque<Vec<Row>>,
    pub affected: u64,
    pub fail_statements: bool,
    /// Yield once before running a statement.
    pub stall_statements: bool,
}

impl FakeConnection {
    pub fn sql_server(name: &str) -> Self {
        Self::with_driver(SQL_SERVER_DRIVER, name)
    }

    pub fn postgres(name: &str) -> Self {
        Self::with_driver(POSTGRES_DRIVER, name)
    }

    pub fn with_driver(driver: &str, name: &str) -> Self {
        Self {
            driver: driver.to_string(),
            identity: unique_identity(name),
            affected: 1,
            ..Self::default()
        }
    }

    pub fn table(mut self, name: &str, columns: ResultSchema) -> Self {
        self.tables.insert(name.to_string(), columns);
        self
    }

    pub fn result_schema(mut self, columns: ResultSchema) -> Self {
        self.result_schema = columns;
        self
    }

    pub fn returning(mut self, rows: Vec<Row>) -> Self {
        self.results.push_back(rows);
        self
    }
}

/// Rows sharing one column list.
pub fn rows(columns: &[&str], values: Vec<Vec<Value>>) -> Vec<Row> {
    let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
    values
        .into_iter()
        .map(|v| Row::new(Arc::clone(&columns), v))
        .collect()
}

impl Connection for FakeConnection {
    fn driver(&self) -> &str {
        &self.driver
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> DbResult<()> {
        self.open = true;
        self.opens += 1;
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        self.open = false;
        self.closes += 1;
        Ok(())
    }

    async fn describe(&mut self, sql: &str, _params: &[Value]) -> DbResult<ResultSchema> {
        assert!(self.open, "describe on a closed connection");
        self.probes.push(sql.to_string());
        match sql.strip_prefix("SELECT * FROM ") {
            Some(table) => self
                .tables
                .get(table)
                .cloned()
                .ok_or_else(|| DbError::Other(format!("Invalid object name '{table}'."))),
            None => Ok(self.result_schema.clone()),
        }
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        assert!(self.open, "query on a closed connection");
        self.statements.push((sql.to_string(), params.to_vec()));
        if self.fail_statements {
            return Err(DbError::Other("connection reset".to_string()));
        }
        Ok(self.results.pop_front().unwrap_or_default())
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        assert!(self.open, "execute on a closed connection");
        if self.stall_statements {
            tokio::task::yield_now().await;
        }
        self.statements.push((sql.to_string(), params.to_vec()));
        if self.fail_statements {
            return Err(DbError::Other("connection reset".to_string()));
        }
        Ok(self.affected)
    }
}
