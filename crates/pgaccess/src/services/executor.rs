//! Statement execution shared by `Client` and `Tx`.
//!
//! Runs the statements built in `sql` against anything implementing
//! `tokio_postgres::GenericClient` and logs them on the `pgaccess::sql`
//! target.

use crate::error::{DbError, DbResult};
use crate::models::{Filter, Record, Updates};
use crate::services::sql;

use std::time::{Duration, Instant};
use tokio_postgres::types::ToSql;
use tokio_postgres::{GenericClient, Row};

/// Statement logging policy for one client.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StatementLog {
    /// Log every statement at INFO
    pub debug: bool,
    /// Statements at or above this duration log at WARN
    pub slow_threshold: Duration,
}

impl StatementLog {
    fn finished(&self, sql: &str, params: usize, rows: u64, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        if elapsed >= self.slow_threshold {
            tracing::warn!(
                target: "pgaccess::sql",
                sql,
                params,
                rows,
                elapsed_ms,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Slow statement"
            );
        } else if self.debug {
            tracing::info!(target: "pgaccess::sql", sql, params, rows, elapsed_ms, "Statement");
        }
    }

    fn failed(&self, sql: &str, params: usize, error: &tokio_postgres::Error) {
        tracing::warn!(target: "pgaccess::sql", sql, params, error = %error, "Statement failed");
    }
}

/// Runs statements on one connection or transaction.
pub(crate) struct Executor<'a, C> {
    conn: &'a C,
    log: StatementLog,
}

impl<'a, C> Executor<'a, C>
where
    C: GenericClient + Sync,
{
    pub fn new(conn: &'a C, log: StatementLog) -> Self {
        Self { conn, log }
    }

    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DbResult<Vec<Row>> {
        let start = Instant::now();
        match self.conn.query(sql, params).await {
            Ok(rows) => {
                self.log.finished(sql, params.len(), rows.len() as u64, start.elapsed());
                Ok(rows)
            }
            Err(e) => {
                self.log.failed(sql, params.len(), &e);
                Err(e.into())
            }
        }
    }

    async fn query_opt(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DbResult<Option<Row>> {
        let start = Instant::now();
        match self.conn.query_opt(sql, params).await {
            Ok(row) => {
                self.log.finished(sql, params.len(), row.is_some() as u64, start.elapsed());
                Ok(row)
            }
            Err(e) => {
                self.log.failed(sql, params.len(), &e);
                Err(e.into())
            }
        }
    }

    async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DbResult<Row> {
        let start = Instant::now();
        match self.conn.query_one(sql, params).await {
            Ok(row) => {
                self.log.finished(sql, params.len(), 1, start.elapsed());
                Ok(row)
            }
            Err(e) => {
                self.log.failed(sql, params.len(), &e);
                Err(e.into())
            }
        }
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DbResult<u64> {
        let start = Instant::now();
        match self.conn.execute(sql, params).await {
            Ok(affected) => {
                self.log.finished(sql, params.len(), affected, start.elapsed());
                Ok(affected)
            }
            Err(e) => {
                self.log.failed(sql, params.len(), &e);
                Err(e.into())
            }
        }
    }

    pub async fn select<M: Record>(&self, filter: &Filter) -> DbResult<Vec<M>> {
        let sql = sql::select::<M>(filter, false);
        let rows = self.query(&sql, &filter.params()).await?;
        rows.iter().map(M::from_row).collect()
    }

    pub async fn select_one<M: Record>(&self, filter: &Filter) -> DbResult<M> {
        let sql = sql::select::<M>(filter, true);
        first_row::<M>(self.query_opt(&sql, &filter.params()).await?)
    }

    pub async fn insert<M: Record>(&self, model: &mut M) -> DbResult<()> {
        let sql = sql::insert::<M>();
        let row = {
            let values = model.insert_values();
            if values.len() != M::INSERT_COLUMNS.len() {
                return Err(DbError::invalid_query(format!(
                    "{} insert has {} values for {} columns",
                    M::TABLE,
                    values.len(),
                    M::INSERT_COLUMNS.len()
                )));
            }
            self.query_one(&sql, &values).await?
        };
        *model = M::from_row(&row)?;
        Ok(())
    }

    pub async fn update<M: Record>(&self, filter: &Filter, updates: &Updates) -> DbResult<u64> {
        let sql = sql::update::<M>(filter, updates)?;
        let params: Vec<&(dyn ToSql + Sync)> =
            updates.params().into_iter().chain(filter.params()).collect();
        self.execute(&sql, &params).await
    }

    pub async fn delete<M: Record>(&self, filter: &Filter) -> DbResult<u64> {
        let sql = sql::delete::<M>(filter)?;
        self.execute(&sql, &filter.params()).await
    }

    pub async fn delete_one<M: Record>(&self, filter: &Filter) -> DbResult<M> {
        let sql = sql::delete_one::<M>(filter);
        first_row::<M>(self.query_opt(&sql, &filter.params()).await?)
    }

    pub async fn count<M: Record>(&self, filter: &Filter) -> DbResult<i64> {
        let sql = sql::count::<M>(filter);
        let row = self.query_one(&sql, &filter.params()).await?;
        Ok(row.try_get::<_, i64>(0)?)
    }
}

/// Decode the single row a `select_one`/`delete_one` statement returned.
/// No row is the table's not-found signal.
fn first_row<M: Record>(row: Option<Row>) -> DbResult<M> {
    match row {
        Some(row) => M::from_row(&row),
        None => Err(DbError::not_found(M::TABLE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Account, Widget};

    #[test]
    fn test_missing_row_is_not_found_for_its_table() {
        let err = first_row::<Widget>(None).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, DbError::NotFound { table: "widgets" }));

        let err = first_row::<Account>(None).unwrap_err();
        assert!(matches!(err, DbError::NotFound { table: "ledger.accounts" }));
    }
}
