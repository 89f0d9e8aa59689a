use std::process::ExitCode;

use anyhow::Context;
use coop_sync::{config::Config, data::JsonFileStore, services::pipeline};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_line_number(false)
                .with_file(false),
        )
        .init();

    let config = Config::new().context("error loading config")?;
    let store = JsonFileStore::open(&config.store_path)
        .await
        .context("error opening store")?;

    let report = pipeline::run(&config.settings, &config.credentials, &store)
        .await
        .context("sync failed")?;

    if !report.is_clean() {
        for failure in &report.failures {
            error!("{failure}");
        }
        error!("{} accounts could not be fully synced", report.failures.len());
        return Ok(ExitCode::FAILURE);
    }

    info!(
        "synced {} accounts, {} new operations",
        report.accounts.len(),
        report.transactions_added
    );

    Ok(ExitCode::SUCCESS)
}
