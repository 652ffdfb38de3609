pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::{AppConfig, DEFAULT_REFRESH_INTERVAL_SECS, ProvidersConfig};
use crate::core::{RefreshScheduler, SnapshotBuilder};
use crate::providers::{HorizonLedgerProvider, TickerPriceProvider};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Show,
    Watch,
}

/// Starts the refresh scheduler and hands it to the selected command.
///
/// A configuration that fails to load does not abort here; it is reported
/// as the outcome of the first refresh.
pub fn start_scheduler(config_path: Option<&str>) -> Result<RefreshScheduler> {
    let loaded = match config_path {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    };

    let (holdings, providers, interval) = match loaded {
        Ok(config) => {
            debug!("Loaded config: {config:#?}");
            let interval = config.refresh_interval();
            (Ok(config.holdings), config.providers, interval)
        }
        Err(e) => (
            Err(e),
            ProvidersConfig::default(),
            Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
        ),
    };

    let prices = Arc::new(TickerPriceProvider::new(providers.ticker_base_url())?);
    let ledger = Arc::new(HorizonLedgerProvider::new(providers.horizon_base_url())?);
    let builder = SnapshotBuilder::new(holdings, prices, ledger);

    Ok(RefreshScheduler::start(Arc::new(builder), interval))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("networth starting...");

    let scheduler = start_scheduler(config_path)?;
    match command {
        AppCommand::Show => cli::snapshot::show(scheduler).await,
        AppCommand::Watch => cli::snapshot::watch(scheduler).await,
    }
}
