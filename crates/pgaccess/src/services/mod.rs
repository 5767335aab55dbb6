//! Database services.
//!
//! - `client` - pooled client: open/ping, close, transactions, raw access
//! - `operations` - the `Operations` CRUD trait
//! - `transaction` - `Tx`, the handle used inside transactions
//! - `executor` - statement execution and logging shared by both
//! - `sql` - statement text builders

pub mod client;
mod executor;
pub mod operations;
pub mod sql;
pub mod transaction;

pub use client::{cancellable, Client};
pub use operations::Operations;
pub use transaction::Tx;
