use super::Query;
use crate::connection::Connection;
use crate::db::Db;
use crate::error::{DbError, DbResult};
use crate::row::FromRow;

impl Query {
    /// Execute and read every row into `T`.
    pub async fn to_list<T: FromRow, C: Connection>(&self, db: &mut Db<C>) -> DbResult<Vec<T>> {
        db.fetch(self).await
    }

    /// Execute and require exactly one row.
    pub async fn single<T: FromRow, C: Connection>(&self, db: &mut Db<C>) -> DbResult<T> {
        let rows: Vec<T> = db.fetch(self).await?;
        match rows.len() {
            0 => Err(DbError::not_found("Expected 1 row, got 0")),
            1 => rows
                .into_iter()
                .next()
                .ok_or_else(|| DbError::not_found("Expected 1 row, got 0")),
            got => Err(DbError::too_many_rows(1, got)),
        }
    }

    /// Execute and return the row if there is one; more than one row is an error.
    pub async fn single_opt<T: FromRow, C: Connection>(
        &self,
        db: &mut Db<C>,
    ) -> DbResult<Option<T>> {
        let rows: Vec<T> = db.fetch(self).await?;
        if rows.len() > 1 {
            return Err(DbError::too_many_rows(1, rows.len()));
        }
        Ok(rows.into_iter().next())
    }

    /// Execute and return the first row; no rows is an error.
    pub async fn first<T: FromRow, C: Connection>(&self, db: &mut Db<C>) -> DbResult<T> {
        self.first_opt(db)
            .await?
            .ok_or_else(|| DbError::not_found("Expected at least 1 row, got 0"))
    }

    /// Execute and return the first row, if any.
    pub async fn first_opt<T: FromRow, C: Connection>(
        &self,
        db: &mut Db<C>,
    ) -> DbResult<Option<T>> {
        let rows: Vec<T> = db.fetch(self).await?;
        Ok(rows.into_iter().next())
    }

    /// Execute a statement and return the affected row count.
    pub async fn execute<C: Connection>(&self, db: &mut Db<C>) -> DbResult<u64> {
        db.execute(self).await
    }
}
