//! Generic record-oriented data access over PostgreSQL.
//!
//! - **config**: `DbConfig` loaded from `DB_*` environment variables
//! - **error**: `DbError`, with a distinct not-found signal
//! - **models**: the `Record` trait, `Filter`/`Updates`, pool status
//! - **services**: the pooled `Client`, the `Operations` trait, transactions
//! - **logging**: Structured logging setup
//!
//! ```ignore
//! let config = DbConfig::from_env();
//! let client = Client::open(&config).await?;
//!
//! let adults: Vec<User> = client.select(&Filter::new("age > ?").bind(18)).await?;
//! match client.select_one::<User>(&Filter::eq("email", email)).await {
//!     Err(e) if e.is_not_found() => { /* no such user */ }
//!     other => { /* ... */ }
//! }
//!
//! client.close();
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_support;

pub use config::{DbConfig, PoolOptions, SslMode};
pub use error::{DbError, DbResult};
pub use models::{Arg, Filter, PoolStatus, Record, Updates};
pub use services::{cancellable, Client, Operations, Tx};
