//! WHERE fragments and column assignments with bound arguments.

use tokio_postgres::types::ToSql;

/// A bound statement argument.
pub type Arg = Box<dyn ToSql + Send + Sync>;

/// A WHERE fragment with `?` placeholders and its arguments.
///
/// The fragment is passed to PostgreSQL as written, apart from `?` being
/// renumbered to `$n`. Write `??` for a literal `?` (jsonb operators).
/// Arguments are always bound, never interpolated.
#[derive(Debug, Default)]
pub struct Filter {
    clause: String,
    args: Vec<Arg>,
}

impl Filter {
    /// Create a filter from a WHERE fragment.
    pub fn new(clause: impl Into<String>) -> Self {
        Self { clause: clause.into(), args: Vec::new() }
    }

    /// A filter matching every row (no WHERE clause).
    ///
    /// `update` and `delete` refuse it; use `Filter::new("TRUE")` to touch
    /// the whole table on purpose.
    pub fn all() -> Self {
        Self::default()
    }

    /// `column = ?` bound to `value`.
    pub fn eq<T>(column: &str, value: T) -> Self
    where
        T: ToSql + Send + Sync + 'static,
    {
        Self::new(format!("{} = ?", crate::services::sql::quote_ident(column))).bind(value)
    }

    /// Bind the next `?` placeholder.
    pub fn bind<T>(mut self, value: T) -> Self
    where
        T: ToSql + Send + Sync + 'static,
    {
        self.args.push(Box::new(value));
        self
    }

    /// The fragment as written.
    pub fn clause(&self) -> &str {
        &self.clause
    }

    /// Check if this filter has no condition.
    pub fn is_all(&self) -> bool {
        self.clause.trim().is_empty()
    }

    /// Number of bound arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Arguments in the form the driver expects.
    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.args.iter().map(|arg| arg.as_ref() as &(dyn ToSql + Sync)).collect()
    }
}

/// Ordered column assignments for UPDATE.
#[derive(Debug, Default)]
pub struct Updates {
    columns: Vec<(String, Arg)>,
}

impl Updates {
    /// Create an empty set of assignments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` to `column`.
    pub fn set<T>(mut self, column: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Send + Sync + 'static,
    {
        self.columns.push((column.into(), Box::new(value)));
        self
    }

    /// Check if there is nothing to assign.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of assignments.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Column names in assignment order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(column, _)| column.as_str())
    }

    /// Values in assignment order.
    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.columns.iter().map(|(_, arg)| arg.as_ref() as &(dyn ToSql + Sync)).collect()
    }
}
