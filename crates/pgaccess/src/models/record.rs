//! The `Record` capability: a Rust type mapped onto one table.

use crate::error::DbResult;

use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

/// A type stored as rows of a single table.
///
/// Implementors describe where they live and how to move between a row and
/// a value; the client builds every statement from this description.
///
/// ```ignore
/// struct User { id: i64, email: String }
///
/// impl Record for User {
///     const TABLE: &'static str = "users";
///     const COLUMNS: &'static [&'static str] = &["id", "email"];
///     const INSERT_COLUMNS: &'static [&'static str] = &["email"];
///
///     fn insert_values(&self) -> Vec<&(dyn ToSql + Sync)> {
///         vec![&self.email]
///     }
///
///     fn from_row(row: &Row) -> DbResult<Self> {
///         Ok(Self { id: row.try_get("id")?, email: row.try_get("email")? })
///     }
/// }
/// ```
pub trait Record: Sized + Send + Sync + 'static {
    /// Table name, optionally schema-qualified (`billing.invoices`).
    const TABLE: &'static str;

    /// Identity column. Single-row lookups order by it.
    const PRIMARY_KEY: &'static str = "id";

    /// Columns read by SELECT and RETURNING, in `from_row` order.
    const COLUMNS: &'static [&'static str];

    /// Columns written by INSERT. Generated columns stay out of this list
    /// and are filled in from the RETURNING row.
    const INSERT_COLUMNS: &'static [&'static str];

    /// Values for `INSERT_COLUMNS`, same order and length.
    fn insert_values(&self) -> Vec<&(dyn ToSql + Sync)>;

    /// Decode a row selected with `COLUMNS`.
    fn from_row(row: &Row) -> DbResult<Self>;
}
