//! In-process PersistenceGateway
//!
//! Same semantics as the SQLite gateway (unconditional static overwrite,
//! half-open window reads, aggregate upsert) without a database file. Test
//! backend for sessions, the runner and the pipeline.

use super::{
    CountAggregate, GatewayError, IngestionLogEntry, PersistenceGateway, PositionRecord,
    StaticRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    positions: Vec<PositionRecord>,
    statics: HashMap<i64, StaticRecord>,
    ingestion_log: Vec<IngestionLogEntry>,
    aggregates: BTreeMap<DateTime<Utc>, CountAggregate>,
}

#[derive(Default)]
pub struct MemoryGateway {
    tables: Mutex<Tables>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, GatewayError> {
        self.tables.lock().map_err(|_| GatewayError::Poisoned)
    }

    /// Snapshot of all stored positions in arrival order
    pub fn positions(&self) -> Result<Vec<PositionRecord>, GatewayError> {
        Ok(self.lock()?.positions.clone())
    }

    /// Snapshot of stored static rows, ordered by ship id
    pub fn statics(&self) -> Result<Vec<StaticRecord>, GatewayError> {
        let tables = self.lock()?;
        let mut rows: Vec<StaticRecord> = tables.statics.values().cloned().collect();
        rows.sort_by_key(|r| r.ship_id);
        Ok(rows)
    }

    pub fn ingestion_log(&self) -> Result<Vec<IngestionLogEntry>, GatewayError> {
        Ok(self.lock()?.ingestion_log.clone())
    }

    pub fn aggregates(&self) -> Result<Vec<CountAggregate>, GatewayError> {
        Ok(self.lock()?.aggregates.values().copied().collect())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn ensure_schema(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn upsert_static(&self, record: &StaticRecord) -> Result<(), GatewayError> {
        self.lock()?.statics.insert(record.ship_id, record.clone());
        Ok(())
    }

    async fn append_position(&self, record: &PositionRecord) -> Result<(), GatewayError> {
        self.lock()?.positions.push(record.clone());
        Ok(())
    }

    async fn append_ingestion_log(&self, entry: &IngestionLogEntry) -> Result<(), GatewayError> {
        self.lock()?.ingestion_log.push(entry.clone());
        Ok(())
    }

    async fn read_positions_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PositionRecord>, GatewayError> {
        Ok(self
            .lock()?
            .positions
            .iter()
            .filter(|p| p.observed_at >= start && p.observed_at < end)
            .cloned()
            .collect())
    }

    async fn read_static_by_ship_ids(&self, ids: &[i64]) -> Result<Vec<StaticRecord>, GatewayError> {
        let tables = self.lock()?;
        let mut rows: Vec<StaticRecord> = ids
            .iter()
            .filter_map(|id| tables.statics.get(id).cloned())
            .collect();
        rows.sort_by_key(|r| r.ship_id);
        rows.dedup_by_key(|r| r.ship_id);
        Ok(rows)
    }

    async fn upsert_count_aggregate(&self, record: &CountAggregate) -> Result<(), GatewayError> {
        self.lock()?.aggregates.insert(record.batch_start, *record);
        Ok(())
    }

    async fn read_count_aggregate(
        &self,
        batch_start: DateTime<Utc>,
    ) -> Result<Option<CountAggregate>, GatewayError> {
        Ok(self.lock()?.aggregates.get(&batch_start).copied())
    }

    fn backend_type(&self) -> &'static str {
        "Memory"
    }
}
