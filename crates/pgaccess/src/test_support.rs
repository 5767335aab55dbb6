//! Records and helpers shared by the unit tests.

use crate::error::DbResult;
use crate::models::Record;
use crate::services::Client;
use crate::DbConfig;

use tokio::sync::OnceCell;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

/// Plain record with a generated bigserial key.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: i64,
    pub name: String,
    pub quantity: i32,
}

impl Widget {
    pub fn new(name: impl Into<String>, quantity: i32) -> Self {
        Self { id: 0, name: name.into(), quantity }
    }
}

impl Record for Widget {
    const TABLE: &'static str = "widgets";
    const COLUMNS: &'static [&'static str] = &["id", "name", "quantity"];
    const INSERT_COLUMNS: &'static [&'static str] = &["name", "quantity"];

    fn insert_values(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![&self.name, &self.quantity]
    }

    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

/// Schema-qualified record whose only column is generated.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub account_no: i64,
}

impl Record for Account {
    const TABLE: &'static str = "ledger.accounts";
    const PRIMARY_KEY: &'static str = "account_no";
    const COLUMNS: &'static [&'static str] = &["account_no"];
    const INSERT_COLUMNS: &'static [&'static str] = &[];

    fn insert_values(&self) -> Vec<&(dyn ToSql + Sync)> {
        Vec::new()
    }

    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(Self { account_no: row.try_get("account_no")? })
    }
}

static SCHEMA: OnceCell<()> = OnceCell::const_new();

/// Open a client against the database named by the `DB_*` variables and
/// make sure the `widgets` table exists.
pub async fn live_client() -> Client {
    let client = Client::open(&DbConfig::from_env()).await.expect("open test database");

    SCHEMA
        .get_or_init(|| async {
            let conn = client.raw().await.expect("raw connection");
            conn.batch_execute(
                "CREATE TABLE IF NOT EXISTS widgets (
                     id BIGSERIAL PRIMARY KEY,
                     name TEXT NOT NULL,
                     quantity INTEGER NOT NULL DEFAULT 0
                 )",
            )
            .await
            .expect("create widgets table");
        })
        .await;

    client
}

/// A name no other test uses, so parallel tests can share the table.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}
