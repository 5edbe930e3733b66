//! LuckyBet server binary
//!
//! Loads configuration, opens the ledger database, seeds the game catalog,
//! starts the round scheduler and serves the API.

use clap::Parser;
use luckybet::{
    api::{ApiServer, AppState},
    config::ConfigLoader,
    games::EntropySource,
    metrics::Metrics,
    storage::OptimizedStorage,
};
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// LuckyBet wagering server
#[derive(Parser)]
#[command(name = "luckybet")]
#[command(about = "Real-money ledger and round-based wagering server")]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// RocksDB data directory
    #[arg(long)]
    db_path: Option<String>,

    /// Key required in the X-API-Key header for admin endpoints
    #[arg(long)]
    admin_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(db_path) = cli.db_path {
        config.storage.data_directory = db_path;
    }
    if let Some(key) = cli.admin_api_key {
        config.server.admin_api_key = Some(key);
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.monitoring.log_filter)),
        )
        .init();

    info!("Starting LuckyBet v{}", env!("CARGO_PKG_VERSION"));
    info!("   Data directory: {}", config.storage.data_directory);

    let storage = OptimizedStorage::new_with_config(&config.storage)?;
    let metrics = Arc::new(Metrics::new()?);
    let state = Arc::new(AppState::build(&config, storage, Arc::new(EntropySource), metrics));

    let seeded = state.catalog.seed_defaults()?;
    info!("Game catalog ready ({} default entries added)", seeded);

    let refunded = state.scheduler.recover().await?;
    info!("Open round stakes refunded on startup: {}", refunded);

    let scheduler = state.scheduler.clone();
    let (arm_every, tick_every) = (config.arm_interval(), config.tick_interval());
    tokio::spawn(async move { scheduler.run(arm_every, tick_every).await });
    info!(
        "Round scheduler running (arm every {:?}, tick every {:?})",
        arm_every, tick_every
    );

    ApiServer::new(config.server.clone(), state).run().await
}
