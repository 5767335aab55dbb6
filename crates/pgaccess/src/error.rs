//! Error types for pgaccess.
//!
//! Driver errors are passed through with their PostgreSQL details extracted;
//! the driver's `tokio_postgres::Error` is kept as the source.

use thiserror::Error;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Main error type for pgaccess.
#[derive(Debug, Error)]
pub enum DbError {
    /// Opening or validating the connection failed.
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The statement succeeded but matched no row.
    #[error("record not found in {table}")]
    NotFound {
        /// Table the lookup ran against.
        table: &'static str,
    },

    /// Error reported by PostgreSQL or the driver.
    #[error("{message}")]
    Postgres {
        /// PostgreSQL error message.
        message: String,
        /// SQLSTATE code (e.g., "23505").
        code: Option<String>,
        /// Additional detail from PostgreSQL.
        detail: Option<String>,
        /// PostgreSQL hint.
        hint: Option<String>,
        /// The driver error, untouched.
        #[source]
        source: tokio_postgres::Error,
    },

    /// Acquiring a connection from the pool failed.
    #[error("Pool error: {message}")]
    Pool {
        /// Human-readable error message.
        message: String,
    },

    /// The client was closed.
    #[error("Client is closed")]
    Closed,

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// The statement could not be built from the given input.
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Human-readable error message.
        message: String,
    },

    /// Configuration error.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },
}

/// Convenience alias used throughout the crate.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Create a new connection error with source.
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a not-found error for a table.
    pub fn not_found(table: &'static str) -> Self {
        Self::NotFound { table }
    }

    /// Create a new pool error.
    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool { message: message.into() }
    }

    /// Create a new invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery { message: message.into() }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Check if this error is the not-found signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        self.pg_code() == Some(UNIQUE_VIOLATION)
    }

    /// Check if the client was closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "Connection",
            Self::NotFound { .. } => "NotFound",
            Self::Postgres { .. } => "Postgres",
            Self::Pool { .. } => "Pool",
            Self::Closed => "Closed",
            Self::Cancelled => "Cancelled",
            Self::InvalidQuery { .. } => "Query",
            Self::Config { .. } => "Config",
        }
    }

    /// Get actionable hint for the caller.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Connection { .. } => Some("Check that the database server is running"),
            Self::Postgres { hint, .. } => hint.as_deref(),
            Self::Pool { .. } => Some("Raise DB_POOL_MAX_SIZE or release idle connections"),
            Self::Closed => Some("Open a new client"),
            Self::Config { .. } => Some("Check the DB_* environment variables"),
            Self::NotFound { .. } | Self::Cancelled | Self::InvalidQuery { .. } => None,
        }
    }

    /// Get PostgreSQL error code (if applicable).
    pub fn pg_code(&self) -> Option<&str> {
        match self {
            Self::Postgres { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Get the underlying driver error (if applicable).
    pub fn as_postgres(&self) -> Option<&tokio_postgres::Error> {
        match self {
            Self::Postgres { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        let (message, code, detail, hint) = match err.as_db_error() {
            Some(db_err) => (
                db_err.message().to_string(),
                Some(db_err.code().code().to_string()),
                db_err.detail().map(String::from),
                db_err.hint().map(String::from),
            ),
            None => (err.to_string(), None, None, None),
        };
        DbError::Postgres { message, code, detail, hint, source: err }
    }
}

impl From<deadpool_postgres::PoolError> for DbError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        use deadpool_postgres::PoolError;

        match err {
            PoolError::Closed => DbError::Closed,
            PoolError::Backend(e) => DbError::from(e),
            PoolError::Timeout(kind) => DbError::pool(format!("timed out waiting for {kind:?}")),
            other => DbError::pool(other.to_string()),
        }
    }
}
