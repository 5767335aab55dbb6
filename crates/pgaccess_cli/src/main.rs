//! pgaccess-check - open a client from the `DB_*` environment and report.
//!
//! Exits 0 when the database answers, 1 otherwise.

use pgaccess::logging::{init_logging, LogConfig};
use pgaccess::{Client, DbConfig, DbError, PoolStatus};

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about = "Check that the database named by the DB_* variables answers.")]
struct Cli {
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Write logs to daily files in this directory instead of stdout.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

/// What the check found.
#[derive(Debug, Serialize)]
struct Report {
    url: String,
    server_version: String,
    debug: bool,
    pool: PoolStatus,
}

async fn check(config: &DbConfig) -> Result<Report, DbError> {
    let client = Client::open(config).await?;

    let conn = client.raw().await?;
    let row = conn.query_one("SELECT version()", &[]).await?;
    let server_version: String = row.try_get(0)?;
    drop(conn);

    let report = Report {
        url: config.display_url(),
        server_version,
        debug: client.debug(),
        pool: client.status(),
    };
    client.close();
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = match &cli.log_dir {
        Some(dir) => LogConfig::with_dir(dir),
        None => LogConfig::console(),
    };
    let _logging_guard = init_logging(log_config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let config = DbConfig::from_env();
    tracing::info!(url = %config.display_url(), "Checking database");

    match runtime.block_on(check(&config)) {
        Ok(report) if cli.json => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode report");
                ExitCode::FAILURE
            }
        },
        Ok(report) => {
            println!("{}: {}", report.url, report.server_version);
            println!(
                "pool: {}/{} connections, {} idle, {} waiting",
                report.pool.size, report.pool.max_size, report.pool.available, report.pool.waiting
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, category = e.category(), "Database check failed");
            if let Some(hint) = e.hint() {
                eprintln!("{e} ({hint})");
            } else {
                eprintln!("{e}");
            }
            ExitCode::FAILURE
        }
    }
}
