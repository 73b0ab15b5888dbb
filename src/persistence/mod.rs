//! Persistence gateway for AIS records
//!
//! Every component receives an explicit `Arc<dyn PersistenceGateway>`; there is
//! no process-wide database handle.
//!
//! Relations written (see `/sql/`):
//! - `ship_position` - INSERT (append-only, one row per position report)
//! - `ship_static` - UPSERT on ship_id (last write wins, no timestamp check)
//! - `ingestion_log` - INSERT (append-only, one row per session)
//! - `ship_count_agg` - UPSERT on batch_start (idempotent per window)

pub mod memory_gateway;
pub mod sqlite_gateway;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory_gateway::MemoryGateway;
pub use sqlite_gateway::SqliteGateway;

/// One received position report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub ship_id: i64,
    /// Receipt time, not the report's own event time
    pub observed_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Latest static/voyage data for a ship, keyed by `ship_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticRecord {
    pub ship_id: i64,
    pub ship_type: String,
    pub destination: String,
    pub last_update: DateTime<Utc>,
    pub dim_a: Option<f64>,
    pub dim_b: Option<f64>,
    pub dim_c: Option<f64>,
    pub dim_d: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionLogEntry {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub records_received: u64,
    pub errors_encountered: u64,
}

/// Vessel counts for one 5-minute window
///
/// Invariant: `cargo + tanker + passenger <= total`. Ships whose type is
/// missing, non-numeric or outside the three ranges only count in `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountAggregate {
    pub batch_start: DateTime<Utc>,
    pub total: u64,
    pub cargo: u64,
    pub tanker: u64,
    pub passenger: u64,
}

impl CountAggregate {
    pub fn empty(batch_start: DateTime<Utc>) -> Self {
        Self {
            batch_start,
            total: 0,
            cargo: 0,
            tanker: 0,
            passenger: 0,
        }
    }

    pub fn categorized(&self) -> u64 {
        self.cargo + self.tanker + self.passenger
    }
}

#[derive(Debug)]
pub enum GatewayError {
    Database(String),
    Io(std::io::Error),
    /// A stored value could not be mapped back into a record
    Corrupt(String),
    /// Connection mutex was poisoned by a panicking writer
    Poisoned,
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        GatewayError::Database(err.to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(err)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Database(e) => write!(f, "Database error: {}", e),
            GatewayError::Io(e) => write!(f, "IO error: {}", e),
            GatewayError::Corrupt(msg) => write!(f, "Corrupt stored value: {}", msg),
            GatewayError::Poisoned => write!(f, "Database connection lock poisoned"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Durable store consumed by the ingestion session and the aggregation engine
///
/// Each call is one logical write or read. Implementations may batch
/// internally but must never partially apply a single record.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Create relations if missing. Safe to call on every cycle.
    async fn ensure_schema(&self) -> Result<(), GatewayError>;

    /// Overwrite the row for `record.ship_id` unconditionally
    async fn upsert_static(&self, record: &StaticRecord) -> Result<(), GatewayError>;

    async fn append_position(&self, record: &PositionRecord) -> Result<(), GatewayError>;

    async fn append_ingestion_log(&self, entry: &IngestionLogEntry) -> Result<(), GatewayError>;

    /// Positions with `start <= observed_at < end`
    async fn read_positions_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PositionRecord>, GatewayError>;

    /// At most one (the stored) row per requested ship id; unknown ids are skipped
    async fn read_static_by_ship_ids(&self, ids: &[i64]) -> Result<Vec<StaticRecord>, GatewayError>;

    /// Overwrite the aggregate keyed by `record.batch_start`
    async fn upsert_count_aggregate(&self, record: &CountAggregate) -> Result<(), GatewayError>;

    async fn read_count_aggregate(
        &self,
        batch_start: DateTime<Utc>,
    ) -> Result<Option<CountAggregate>, GatewayError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
