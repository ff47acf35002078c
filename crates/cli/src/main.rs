use anyhow::Context;
use clap::{Parser, Subcommand};
use tradestate_core::{AppConfig, ChangeNotifier, ConfigLoader};
use tradestate_data::{Database, MarketStateRepository};
use tradestate_web_api::ApiServer;

mod retention;

#[derive(Parser)]
#[command(name = "tradestate")]
#[command(about = "Trading bot state store with live change notifications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST API and websocket observers
    Serve {
        /// Config file path
        #[arg(short, long, default_value = "config/tradestate.toml")]
        config: String,
    },
    /// Create the schema and seed default settings, then exit
    InitDb {
        /// Config file path
        #[arg(short, long, default_value = "config/tradestate.toml")]
        config: String,
    },
    /// Delete market state snapshots older than the given age, then exit
    Sweep {
        /// Maximum snapshot age in seconds
        #[arg(long)]
        max_age_secs: u64,
        /// Config file path
        #[arg(short, long, default_value = "config/tradestate.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Serve { config } => {
            run_server(&config).await?;
        }
        Commands::InitDb { config } => {
            let config = load_config(&config)?;
            let db = open_database(&config).await?;
            let counts = db.table_counts().await?;
            for (table, rows) in counts {
                tracing::info!(table, rows, "Table ready");
            }
            db.close().await;
        }
        Commands::Sweep {
            max_age_secs,
            config,
        } => {
            let config = load_config(&config)?;
            let db = open_database(&config).await?;
            let notifier = ChangeNotifier::from_config(&config.notifier);
            let repo = MarketStateRepository::new(db.clone(), notifier);
            let removed = retention::sweep_once(&repo, max_age_secs).await?;
            println!("Removed {removed} stale market state rows");
            db.close().await;
        }
    }

    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<AppConfig> {
    let config = ConfigLoader::load(path).with_context(|| format!("loading config {path}"))?;
    tracing::debug!(?config, "Configuration loaded");
    Ok(config)
}

async fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    tracing::info!("Opening database at: {}", config.database.url);
    Database::connect(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("opening database {}", config.database.url))
}

async fn run_server(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let db = open_database(&config).await?;
    let notifier = ChangeNotifier::from_config(&config.notifier);

    let sweeper = retention::spawn_sweeper(
        MarketStateRepository::new(db.clone(), notifier.clone()),
        &config.retention,
    );

    let addr = config.server.addr();
    tracing::info!("Starting web API server on {}", addr);
    let server = ApiServer::new(db.clone(), notifier);
    server.serve(&addr, shutdown_signal()).await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}
