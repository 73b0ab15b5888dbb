//! Recompute the vessel-count aggregate for one 5-minute window
//!
//! Usage:
//!   cargo run --release --bin aggregate_window
//!   cargo run --release --bin aggregate_window -- --at 2024-05-01T12:03:00Z
//!
//! Without `--at`, aggregates the window containing the current time.
//! Prints the resulting row as JSON on stdout.
//!
//! Environment variables:
//! - AIS_DB_PATH - SQLite database path (default: data/aisflow.db)
//! - RUST_LOG - Logging level (optional, default: info)

use aisflow::aggregator_core::{aligned_window, AggregationEngine};
use aisflow::persistence::{PersistenceGateway, SqliteGateway};
use chrono::{DateTime, Utc};
use std::env;
use std::sync::Arc;

fn parse_at_from_args() -> Result<Option<DateTime<Utc>>, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let Some(idx) = args.iter().position(|x| x == "--at") else {
        return Ok(None);
    };

    let raw = args
        .get(idx + 1)
        .ok_or("--at requires an RFC3339 timestamp")?;
    let at = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| format!("invalid --at timestamp '{}': {}", raw, e))?;

    Ok(Some(at.with_timezone(&Utc)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let at = parse_at_from_args()?.unwrap_or_else(Utc::now);
    let db_path = env::var("AIS_DB_PATH").unwrap_or_else(|_| "data/aisflow.db".to_string());
    let window = aligned_window(at);

    log::info!("🚀 Aggregating window {}", window);
    log::info!("   └─ Database: {}", db_path);

    let gateway: Arc<dyn PersistenceGateway> = Arc::new(SqliteGateway::open(&db_path)?);
    gateway.ensure_schema().await?;

    if let Some(previous) = gateway.read_count_aggregate(window.start).await? {
        log::info!(
            "♻️  Replacing existing row: total={} cargo={} tanker={} passenger={}",
            previous.total,
            previous.cargo,
            previous.tanker,
            previous.passenger
        );
    }

    let aggregate = AggregationEngine::new(gateway).aggregate_window(&window).await?;

    println!("{}", serde_json::to_string(&aggregate)?);
    Ok(())
}
