//! Database client over a deadpool-postgres pool.
//!
//! Provides:
//! - Connection validation on open (ping)
//! - Statement logging when the config's debug flag is set
//! - Transactions with commit/rollback driven by the callback result
//! - Pool status and the raw pool as an escape hatch

use crate::config::{DbConfig, SslMode};
use crate::error::{DbError, DbResult};
use crate::models::{Filter, PoolStatus, Record, Updates};
use crate::services::executor::{Executor, StatementLog};
use crate::services::operations::Operations;
use crate::services::transaction::Tx;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use futures_util::future::BoxFuture;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::future::Future;
use std::sync::Arc;
use tokio_postgres::NoTls;
use tokio_util::sync::CancellationToken;

/// A handle on an open, validated connection pool.
///
/// Cloning is cheap and shares the pool. Once [`Client::close`] is called
/// every clone returns [`DbError::Closed`].
#[derive(Clone)]
pub struct Client {
    pool: Pool,
    log: StatementLog,
    display_url: Arc<str>,
}

impl Client {
    /// Open a pool for `config` and validate it with a ping.
    ///
    /// Fails fast: no retry, and no client is returned on failure.
    pub async fn open(config: &DbConfig) -> DbResult<Self> {
        let client = Self::build(config)?;

        let conn = client.pool.get().await.map_err(|e| {
            tracing::error!(url = %client.display_url, error = %e, "Failed to connect");
            DbError::connection_with_source("Failed to establish connection", e)
        })?;

        conn.execute("SELECT 1", &[]).await.map_err(|e| {
            tracing::error!(url = %client.display_url, error = %e, "Ping failed");
            DbError::connection_with_source("Connection validation failed", e)
        })?;
        drop(conn);

        tracing::info!(
            url = %client.display_url,
            debug = client.log.debug,
            max_size = config.pool.max_size,
            "Connected to PostgreSQL"
        );

        Ok(client)
    }

    /// Build the pool without connecting.
    pub(crate) fn build(config: &DbConfig) -> DbResult<Self> {
        let pg_config = config.to_pg_config()?;
        let manager_config = ManagerConfig { recycling_method: RecyclingMethod::Fast };

        let manager = match config.ssl_mode()? {
            SslMode::Disable => Manager::from_config(pg_config, NoTls, manager_config),
            mode => Manager::from_config(pg_config, tls_connector(mode)?, manager_config),
        };

        let pool = Pool::builder(manager)
            .max_size(config.pool.max_size)
            .wait_timeout(Some(config.pool.wait_timeout))
            .create_timeout(Some(config.pool.connect_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| DbError::connection(format!("Failed to create pool: {e}")))?;

        Ok(Self {
            pool,
            log: StatementLog {
                debug: config.debug,
                slow_threshold: config.pool.slow_threshold,
            },
            display_url: config.display_url().into(),
        })
    }

    /// Check out a pooled connection.
    async fn conn(&self) -> DbResult<Object> {
        if self.pool.is_closed() {
            return Err(DbError::Closed);
        }
        self.pool.get().await.map_err(|e| {
            let err = DbError::from(e);
            if !err.is_closed() {
                tracing::warn!(url = %self.display_url, error = %err, "Failed to acquire connection");
            }
            err
        })
    }

    /// Check if statement logging is on.
    pub fn debug(&self) -> bool {
        self.log.debug
    }

    /// Run `f` inside a transaction.
    ///
    /// `Ok` from `f` commits, `Err` rolls back and is returned unchanged.
    /// Nested transactions are not supported.
    ///
    /// ```ignore
    /// client
    ///     .with_transaction(|tx| Box::pin(async move {
    ///         tx.insert(&mut order).await?;
    ///         tx.update::<Stock>(&Filter::eq("sku", sku), &updates).await?;
    ///         Ok::<_, DbError>(())
    ///     }))
    ///     .await?;
    /// ```
    pub async fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        T: Send,
        E: From<DbError> + Send,
        F: for<'t> FnOnce(&'t Tx<'t>) -> BoxFuture<'t, Result<T, E>> + Send,
    {
        let mut conn = self.conn().await?;
        let txn = conn.transaction().await.map_err(DbError::from)?;
        let tx = Tx::new(txn, self.log);

        let outcome = f(&tx).await;
        settle(outcome, |commit| async move {
            if commit {
                tx.commit().await
            } else {
                tx.rollback().await
            }
        })
        .await
    }

    /// Close the pool, dropping all connections. Calling it again is a no-op.
    pub fn close(&self) {
        if self.pool.is_closed() {
            return;
        }
        self.pool.close();
        tracing::info!(url = %self.display_url, "Connection pool closed");
    }

    /// Check if the client is closed.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Get current pool status.
    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available as usize,
            waiting: status.waiting,
        }
    }

    /// The underlying pool. Statements issued through it are not logged.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check out a raw driver connection. Statements issued through it are
    /// not logged.
    pub async fn raw(&self) -> DbResult<Object> {
        self.conn().await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.display_url)
            .field("debug", &self.log.debug)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl Operations for Client {
    async fn select<M: Record>(&self, filter: &Filter) -> DbResult<Vec<M>> {
        let conn = self.conn().await?;
        Executor::new(&**conn, self.log).select(filter).await
    }

    async fn select_one<M: Record>(&self, filter: &Filter) -> DbResult<M> {
        let conn = self.conn().await?;
        Executor::new(&**conn, self.log).select_one(filter).await
    }

    async fn insert<M: Record>(&self, model: &mut M) -> DbResult<()> {
        let conn = self.conn().await?;
        Executor::new(&**conn, self.log).insert(model).await
    }

    async fn update<M: Record>(&self, filter: &Filter, updates: &Updates) -> DbResult<u64> {
        let conn = self.conn().await?;
        Executor::new(&**conn, self.log).update::<M>(filter, updates).await
    }

    async fn delete<M: Record>(&self, filter: &Filter) -> DbResult<u64> {
        let conn = self.conn().await?;
        Executor::new(&**conn, self.log).delete::<M>(filter).await
    }

    async fn delete_one<M: Record>(&self, filter: &Filter) -> DbResult<M> {
        let conn = self.conn().await?;
        Executor::new(&**conn, self.log).delete_one(filter).await
    }

    async fn count<M: Record>(&self, filter: &Filter) -> DbResult<i64> {
        let conn = self.conn().await?;
        Executor::new(&**conn, self.log).count::<M>(filter).await
    }
}

/// Race `fut` against `token`; cancellation wins and drops `fut`.
///
/// Dropping the future abandons the statement on the client side only; pair
/// this with `DB_STATEMENT_TIMEOUT_MS` to bound server-side work.
pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!("Operation cancelled");
            Err(DbError::Cancelled)
        }
        result = fut => result,
    }
}

/// Commit (`end(true)`) on `Ok`, roll back (`end(false)`) on `Err`.
///
/// A failed commit is returned; a failed rollback is only logged so the
/// caller's error wins.
async fn settle<T, E, Fut>(outcome: Result<T, E>, end: impl FnOnce(bool) -> Fut) -> Result<T, E>
where
    E: From<DbError>,
    Fut: Future<Output = DbResult<()>>,
{
    match outcome {
        Ok(value) => {
            end(true).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = end(false).await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

fn tls_connector(mode: SslMode) -> DbResult<MakeTlsConnector> {
    let mut builder = TlsConnector::builder();
    match mode {
        // Prefer and Require encrypt without verifying the certificate.
        SslMode::Prefer | SslMode::Require => {
            builder.danger_accept_invalid_certs(true);
        }
        SslMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyFull | SslMode::Disable => {}
    }

    let connector = builder
        .build()
        .map_err(|e| DbError::connection_with_source("Failed to create TLS connector", e))?;
    Ok(MakeTlsConnector::new(connector))
}
