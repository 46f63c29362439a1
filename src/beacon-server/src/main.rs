//! Beacon: web analytics funnel and conversion reporting server.
//!
//! Main entry point that wires configuration, the ClickHouse event store,
//! the funnel engine, and the REST API together.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};

use beacon_api::{ApiServer, AppState};
use beacon_core::config::AppConfig;
use beacon_funnel::{FunnelEngine, FunnelRegistry, GoalRegistry};
use beacon_store::ClickHouseEventStore;

#[derive(Parser, Debug)]
#[command(name = "beacon-server")]
#[command(about = "Web analytics funnel and conversion reporting server")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "BEACON__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "BEACON__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// ClickHouse URL (overrides config)
    #[arg(long, env = "BEACON__CLICKHOUSE__URL")]
    clickhouse_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Beacon starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(url) = cli.clickhouse_url {
        config.clickhouse.url = url;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        clickhouse_url = %config.clickhouse.url,
        "Configuration loaded"
    );

    let store = ClickHouseEventStore::new(&config.clickhouse);
    let state = AppState {
        engine: Arc::new(FunnelEngine::new(store)),
        funnels: Arc::new(FunnelRegistry::new()),
        goals: Arc::new(GoalRegistry::new()),
        node_id: config.node_id.clone(),
        start_time: Instant::now(),
        default_range_days: config.analytics.default_range_days,
    };

    let server = ApiServer::new(config, state);

    if let Err(e) = server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    server.start_http().await
}
