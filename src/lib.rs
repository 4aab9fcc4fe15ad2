//! GATT battery query library
//! Scans for BLE advertisers (or connects to a given address), queries the
//! battery service of the peer and blacklists peers that have none.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod logging;
pub mod state;
pub mod utils;

use anyhow::Result;
use log::{error, info};

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::core::actions::ActionExecutor;
use crate::core::bluetooth::BluetoothManager;
use crate::core::dispatcher;
use crate::core::orchestrator::Orchestrator;

/// Runs one battery query session until Ctrl-C, or until the fixed target is
/// lost.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_config(path).await?,
        None => AppConfig::default(),
    };
    if let Some(policy) = cli.on_disconnect {
        config.fixed_target.on_disconnect = policy;
    }

    match cli.address {
        Some(address) => info!("Battery service client will connect to {}", address),
        None => info!(
            "No specific address specified. Will scan for any advertiser and query its battery service."
        ),
    }

    let (sink, mut dispatcher) = dispatcher::channel();
    let mut orchestrator = Orchestrator::from_config(&config, cli.address);
    let transport = BluetoothManager::new(sink, &config).await?;
    let mut executor = ActionExecutor::new(transport);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let outcome = dispatcher
        .run(&mut orchestrator, &mut executor, shutdown)
        .await;
    info!(
        "{} device(s) blacklisted during this run",
        orchestrator.blacklist().len()
    );
    outcome?;
    Ok(())
}
