//! The CRUD surface shared by clients and transactions.

use crate::error::DbResult;
use crate::models::{Filter, Record, Updates};

use async_trait::async_trait;

/// Common database operations.
///
/// Implemented by [`crate::Client`] (each call checks out a pooled
/// connection) and [`crate::Tx`] (each call runs inside the transaction).
#[async_trait]
pub trait Operations: Send + Sync {
    /// Fetch every row matching `filter`. No match is an empty vector.
    async fn select<M: Record>(&self, filter: &Filter) -> DbResult<Vec<M>>;

    /// Fetch the first row matching `filter`, ordered by primary key.
    ///
    /// Returns [`crate::DbError::NotFound`] when nothing matches.
    async fn select_one<M: Record>(&self, filter: &Filter) -> DbResult<M>;

    /// Insert `model` and overwrite it with the stored row, so generated
    /// columns are filled in.
    async fn insert<M: Record>(&self, model: &mut M) -> DbResult<()>;

    /// Apply `updates` to every row matching `filter`. Returns rows affected.
    async fn update<M: Record>(&self, filter: &Filter, updates: &Updates) -> DbResult<u64>;

    /// Delete every row matching `filter`. Returns rows affected.
    async fn delete<M: Record>(&self, filter: &Filter) -> DbResult<u64>;

    /// Delete the first row matching `filter` and return it.
    ///
    /// Lookup and delete are one statement. Returns
    /// [`crate::DbError::NotFound`] and deletes nothing when no row matches.
    async fn delete_one<M: Record>(&self, filter: &Filter) -> DbResult<M>;

    /// Count rows matching `filter`.
    async fn count<M: Record>(&self, filter: &Filter) -> DbResult<i64>;

    /// Check if any row matches `filter`.
    async fn exists<M: Record>(&self, filter: &Filter) -> DbResult<bool> {
        Ok(self.count::<M>(filter).await? > 0)
    }
}
