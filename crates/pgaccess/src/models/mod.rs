//! Data models for pgaccess.
//!
//! - `record` - the `Record` trait mapping a type onto a table
//! - `filter` - `Filter` and `Updates` carrying bound arguments
//! - `pool` - `PoolStatus`

pub mod filter;
pub mod pool;
pub mod record;

pub use filter::{Arg, Filter, Updates};
pub use pool::PoolStatus;
pub use record::Record;
