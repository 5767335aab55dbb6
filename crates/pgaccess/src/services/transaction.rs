//! Transactional handle passed to [`crate::Client::with_transaction`].

use crate::error::{DbError, DbResult};
use crate::models::{Filter, Record, Updates};
use crate::services::executor::{Executor, StatementLog};
use crate::services::operations::Operations;

use async_trait::async_trait;

/// A database transaction.
///
/// Every [`Operations`] call runs inside it. Commit and rollback are driven
/// by `with_transaction`; a dropped, unfinished transaction rolls back.
pub struct Tx<'c> {
    txn: deadpool_postgres::Transaction<'c>,
    log: StatementLog,
}

impl<'c> Tx<'c> {
    pub(crate) fn new(txn: deadpool_postgres::Transaction<'c>, log: StatementLog) -> Self {
        Self { txn, log }
    }

    /// The driver transaction, for statements not covered by [`Operations`].
    /// Statements issued through it are not logged.
    pub fn raw(&self) -> &tokio_postgres::Transaction<'c> {
        &*self.txn
    }

    pub(crate) async fn commit(self) -> DbResult<()> {
        self.txn.commit().await.map_err(DbError::from)?;
        tracing::debug!("Transaction committed");
        Ok(())
    }

    pub(crate) async fn rollback(self) -> DbResult<()> {
        self.txn.rollback().await.map_err(DbError::from)?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }

    fn executor(&self) -> Executor<'_, tokio_postgres::Transaction<'c>> {
        Executor::new(&*self.txn, self.log)
    }
}

#[async_trait]
impl<'c> Operations for Tx<'c> {
    async fn select<M: Record>(&self, filter: &Filter) -> DbResult<Vec<M>> {
        self.executor().select(filter).await
    }

    async fn select_one<M: Record>(&self, filter: &Filter) -> DbResult<M> {
        self.executor().select_one(filter).await
    }

    async fn insert<M: Record>(&self, model: &mut M) -> DbResult<()> {
        self.executor().insert(model).await
    }

    async fn update<M: Record>(&self, filter: &Filter, updates: &Updates) -> DbResult<u64> {
        self.executor().update::<M>(filter, updates).await
    }

    async fn delete<M: Record>(&self, filter: &Filter) -> DbResult<u64> {
        self.executor().delete::<M>(filter).await
    }

    async fn delete_one<M: Record>(&self, filter: &Filter) -> DbResult<M> {
        self.executor().delete_one(filter).await
    }

    async fn count<M: Record>(&self, filter: &Filter) -> DbResult<i64> {
        self.executor().count::<M>(filter).await
    }
}
