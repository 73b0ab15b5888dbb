//! AIS ingestion runtime
//!
//! Runs one cycle (ensure schema → retried streaming session → aggregation
//! of the current 5-minute window) and exits. With `--loop`, repeats the
//! cycle every `CYCLE_INTERVAL_SECS` until Ctrl-C.
//!
//! Usage:
//!   cargo run --release --bin ais_ingest
//!   cargo run --release --bin ais_ingest -- --loop
//!
//! Environment variables: see `PipelineConfig::from_env`.

use aisflow::persistence::{PersistenceGateway, SqliteGateway};
use aisflow::pipeline::{run_scheduled, IngestionCycle, PipelineConfig};
use aisflow::streamer_core::{FeedConnector, WebSocketConnector};
use dotenv::dotenv;
use log::{error, info};
use std::env;
use std::sync::Arc;
use std::time::Duration;

fn loop_requested() -> bool {
    env::args().any(|arg| arg == "--loop")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize rustls crypto provider (required for wss:// connections)
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = PipelineConfig::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.rust_log))
        .target(env_logger::Target::Stderr)
        .init();

    let looping = loop_requested();

    info!("🚀 Starting AIS ingestion");
    info!("   ├─ Feed: {}", config.stream_url);
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Session: {}s", config.session_duration_secs);
    info!(
        "   ├─ Retries: {} (delay {}s, timeout {}s)",
        config.max_retries, config.retry_delay_secs, config.session_timeout_secs
    );
    if looping {
        info!("   └─ Mode: loop every {}s", config.cycle_interval_secs);
    } else {
        info!("   └─ Mode: single cycle");
    }

    let gateway: Arc<dyn PersistenceGateway> = Arc::new(SqliteGateway::open(&config.db_path)?);
    let connector: Arc<dyn FeedConnector> = Arc::new(WebSocketConnector::new(config.stream_url.clone()));
    let cycle = IngestionCycle::from_config(&config, connector, gateway);

    if looping {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("❌ Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        run_scheduled(&cycle, Duration::from_secs(config.cycle_interval_secs), shutdown).await;
        return Ok(());
    }

    match cycle.run_once().await {
        Ok(report) => {
            info!(
                "📊 {}: total={} cargo={} tanker={} passenger={}",
                report.window,
                report.aggregate.total,
                report.aggregate.cargo,
                report.aggregate.tanker,
                report.aggregate.passenger
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ {}", e);
            Err(e.into())
        }
    }
}
