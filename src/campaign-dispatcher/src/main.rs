//! Campaign Dispatcher: periodically sends every due email campaign.
//!
//! Main entry point that wires the collaborators, registers payload handlers
//! and drives the dispatch loop.

use async_trait::async_trait;
use campaign_channels::SendGridProvider;
use campaign_core::config::AppConfig;
use campaign_core::error::CampaignResult;
use campaign_core::registry::{HandlerRegistry, PayloadHandler};
use campaign_dispatch::{DispatchServices, Dispatcher};
use campaign_management::ManagementStore;
use chrono::{TimeZone, Utc};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const DISPATCH_DUE: &str = "campaign.dispatch_due";

#[derive(Parser, Debug)]
#[command(name = "campaign-dispatcher")]
#[command(about = "Dispatches due email campaigns across their variants")]
#[command(version)]
struct Cli {
    /// Optional TOML config file (environment still overrides)
    #[arg(long, env = "CAMPAIGN_DISPATCH_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "CAMPAIGN_DISPATCH__NODE_ID")]
    node_id: Option<String>,

    /// Maximum campaigns dispatched in parallel (overrides config)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Seconds between dispatch runs (overrides config)
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Perform a single dispatch run and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Seed the in-memory store with demo campaigns
    #[arg(long, default_value_t = false)]
    demo: bool,
}

/// Runs the dispatcher for a `{"as_of": <epoch seconds>}` payload; `as_of`
/// defaults to now.
struct DispatchDueHandler {
    dispatcher: Dispatcher,
}

#[async_trait]
impl PayloadHandler for DispatchDueHandler {
    async fn handle(&self, payload: serde_json::Value) -> CampaignResult<()> {
        let as_of = payload
            .get("as_of")
            .and_then(|v| v.as_i64())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);
        self.dispatcher.run(as_of).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_dispatcher=info,campaign_dispatch=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Campaign Dispatcher starting up");

    // Load configuration
    let mut config = AppConfig::load_from(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(concurrency) = cli.concurrency {
        config.dispatch.max_concurrency = concurrency;
    }
    if let Some(secs) = cli.poll_interval {
        config.dispatch.poll_interval_secs = secs;
    }

    info!(
        node_id = %config.node_id,
        max_concurrency = config.dispatch.max_concurrency,
        poll_interval_secs = config.dispatch.poll_interval_secs,
        "Configuration loaded"
    );

    if config.metrics.enabled {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => info!(port = config.metrics.port, "Metrics exporter started"),
            Err(e) => error!(error = %e, "Failed to start metrics exporter"),
        }
    }

    let store = Arc::new(if cli.demo {
        ManagementStore::with_demo_data()
    } else {
        ManagementStore::new()
    });
    let provider = Arc::new(SendGridProvider::new(config.email.clone()));

    let dispatcher = Dispatcher::new(
        config.dispatch.clone(),
        config.email.from_email.clone(),
        DispatchServices {
            repository: store.clone(),
            tenants: store.clone(),
            audience: store.clone(),
            emails: store.clone(),
            sender: provider.clone(),
        },
    );

    let registry = HandlerRegistry::new();
    registry.register(DISPATCH_DUE, Arc::new(DispatchDueHandler { dispatcher }));

    if cli.once {
        run_dispatch(&registry).await;
        return Ok(());
    }

    let mut interval =
        tokio::time::interval(Duration::from_secs(config.dispatch.poll_interval_secs.max(1)));

    info!("Campaign Dispatcher is ready");

    loop {
        tokio::select! {
            _ = interval.tick() => run_dispatch(&registry).await,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// One dispatch run; its error is diagnostic only.
async fn run_dispatch(registry: &HandlerRegistry) {
    let payload = serde_json::json!({ "as_of": Utc::now().timestamp() });
    if let Err(e) = registry.dispatch(DISPATCH_DUE, payload).await {
        warn!(error = %e, "Dispatch run reported an error");
    }
}
