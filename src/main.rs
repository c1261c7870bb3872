//! Simple Bank bootstrap
//!
//! Loads `config/<env>.yaml`, installs logging, connects to PostgreSQL,
//! applies the ledger schema and verifies the store is reachable. The
//! request-handling layer builds on the [`simple_bank::Store`] created here.

use anyhow::Context;

use simple_bank::config::AppConfig;
use simple_bank::{Database, Store};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn skip_schema() -> bool {
    std::env::args().any(|a| a == "--no-schema")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env).context("Failed to load config")?;
    let _log_guard = simple_bank::logging::init_logging(&app_config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        "Starting simple_bank in {} mode",
        env
    );

    let db = Database::connect(&app_config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if skip_schema() {
        tracing::info!("Schema bootstrap skipped (--no-schema)");
    } else {
        db.init_schema()
            .await
            .context("Failed to initialize ledger schema")?;
    }

    db.health_check().await.context("Health check failed")?;

    let store = Store::from_database(&db, &app_config.transfer);
    tracing::info!(
        overdraft = ?store.overdraft_policy(),
        tx_timeout_ms = ?app_config.transfer.tx_timeout_ms,
        retry_attempts = app_config.retry.max_attempts,
        "Transfer store ready"
    );

    Ok(())
}
