//! Sideline - live player dashboard core

use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use sideline::{
    bus::{ChangeBus, MemoryChangeBus, NatsChangeBus},
    config::{Args, DashboardConfig},
    live::spawn_dashboard,
    logging,
    server::{self, AppState},
    HttpSnapshotSource,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_json);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let dashboard_config = DashboardConfig::from_args(&args);

    info!("======================================");
    info!("  Sideline - live player dashboard");
    info!("======================================");
    info!("Instance ID: {}", args.instance_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Aggregator: {}", args.aggregator_url);
    info!("Request timeout: {} ms", args.request_timeout_ms);
    info!("Coalesce window: {} ms", args.coalesce_window_ms);
    info!(
        "Core topics: {}",
        dashboard_config
            .core_topics
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("NATS: {} (prefix '{}')", args.nats.nats_url, args.nats.subject_prefix);
    info!("======================================");

    // Connect to NATS (in-memory bus in dev mode)
    let bus: Arc<dyn ChangeBus> =
        match NatsChangeBus::connect(&args.nats, &format!("sideline-{}", args.instance_id)).await {
            Ok(bus) => {
                info!("NATS connected successfully");
                Arc::new(bus)
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("NATS connection failed (dev mode, using in-memory bus): {}", e);
                    Arc::new(MemoryChangeBus::new())
                } else {
                    error!("NATS connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        };
    let bus_name = bus.name();

    let source = Arc::new(HttpSnapshotSource::new(args.aggregator_config()));
    let (dashboard, controller) = spawn_dashboard(dashboard_config, source, bus);

    if let Some(subject) = args.initial_subject() {
        info!("Activating initial player {}", subject);
        dashboard.activate(subject)?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Arc::new(AppState::new(args, dashboard.clone(), bus_name));
    let server = tokio::spawn(server::run(state, shutdown_rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = server => {
            match result {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => error!("HTTP server failed: {}", e),
                Err(e) => error!("HTTP server task panicked: {}", e),
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = dashboard.shutdown();
    if let Err(e) = controller.await {
        error!("Dashboard controller task failed: {}", e);
    }

    info!("Sideline stopped");
    Ok(())
}
