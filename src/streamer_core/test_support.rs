//! Scripted feed and fault-injecting gateway for session/runner tests

use crate::persistence::{
    CountAggregate, GatewayError, IngestionLogEntry, PersistenceGateway, PositionRecord,
    StaticRecord,
};
use crate::streamer_core::feed_client::{FeedConnection, FeedConnector, TransportError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub enum Step {
    Frame(Vec<u8>),
    Delay(Duration),
    Close,
    Error(String),
}

pub fn position_frame(ship_id: i64, latitude: f64, longitude: f64) -> Vec<u8> {
    serde_json::json!({
        "MessageType": "PositionReport",
        "Message": {"PositionReport": {"UserID": ship_id, "Latitude": latitude, "Longitude": longitude}}
    })
    .to_string()
    .into_bytes()
}

pub fn static_frame(ship_id: i64, ship_type: &str, destination: &str) -> Vec<u8> {
    serde_json::json!({
        "MessageType": "ShipStaticData",
        "Message": {"ShipStaticData": {
            "UserID": ship_id,
            "Type": ship_type,
            "Destination": destination,
            "Dimensions": {"A": 100.0, "B": 20.0}
        }}
    })
    .to_string()
    .into_bytes()
}

/// Each `connect` consumes the next script; once scripts run out the
/// connection stays silent until the session deadline.
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    refuse_first: usize,
    connects: AtomicUsize,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            refuse_first: 0,
            connects: AtomicUsize::new(0),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn refusing(refuse_first: usize) -> Self {
        let mut connector = Self::new(Vec::new());
        connector.refuse_first = refuse_first;
        connector
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedConnector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn FeedConnection>, TransportError> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
        if attempt < self.refuse_first {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedConnection {
            steps: steps.into(),
            sent: self.sent.clone(),
        }))
    }

    fn endpoint(&self) -> &str {
        "scripted://feed"
    }
}

struct ScriptedConnection {
    steps: VecDeque<Step>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FeedConnection for ScriptedConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.steps.pop_front() {
                Some(Step::Frame(frame)) => return Ok(Some(frame)),
                Some(Step::Delay(delay)) => tokio::time::sleep(delay).await,
                Some(Step::Close) => return Ok(None),
                Some(Step::Error(msg)) => return Err(TransportError::Receive(msg)),
                None => std::future::pending::<()>().await,
            }
        }
    }
}

enum Fault {
    Fail,
    Stall,
}

/// Passes everything through to `inner` but faults data writes
/// (`append_position` / `upsert_static`) after `allowed_writes` successes:
/// `new` returns an error, `stalling` never completes.
pub struct FailingGateway {
    inner: Arc<dyn PersistenceGateway>,
    allowed_writes: usize,
    writes: AtomicUsize,
    fault: Fault,
}

impl FailingGateway {
    pub fn new(inner: Arc<dyn PersistenceGateway>, allowed_writes: usize) -> Self {
        Self {
            inner,
            allowed_writes,
            writes: AtomicUsize::new(0),
            fault: Fault::Fail,
        }
    }

    pub fn stalling(inner: Arc<dyn PersistenceGateway>, allowed_writes: usize) -> Self {
        Self {
            fault: Fault::Stall,
            ..Self::new(inner, allowed_writes)
        }
    }

    async fn admit(&self) -> Result<(), GatewayError> {
        if self.writes.fetch_add(1, Ordering::SeqCst) < self.allowed_writes {
            return Ok(());
        }
        match self.fault {
            Fault::Fail => Err(GatewayError::Database("disk I/O error".to_string())),
            Fault::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GatewayError::Database("database is locked".to_string()))
            }
        }
    }
}

#[async_trait]
impl PersistenceGateway for FailingGateway {
    async fn ensure_schema(&self) -> Result<(), GatewayError> {
        self.inner.ensure_schema().await
    }

    async fn upsert_static(&self, record: &StaticRecord) -> Result<(), GatewayError> {
        self.admit().await?;
        self.inner.upsert_static(record).await
    }

    async fn append_position(&self, record: &PositionRecord) -> Result<(), GatewayError> {
        self.admit().await?;
        self.inner.append_position(record).await
    }

    async fn append_ingestion_log(&self, entry: &IngestionLogEntry) -> Result<(), GatewayError> {
        self.inner.append_ingestion_log(entry).await
    }

    async fn read_positions_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PositionRecord>, GatewayError> {
        self.inner.read_positions_in_window(start, end).await
    }

    async fn read_static_by_ship_ids(&self, ids: &[i64]) -> Result<Vec<StaticRecord>, GatewayError> {
        self.inner.read_static_by_ship_ids(ids).await
    }

    async fn upsert_count_aggregate(&self, record: &CountAggregate) -> Result<(), GatewayError> {
        self.inner.upsert_count_aggregate(record).await
    }

    async fn read_count_aggregate(
        &self,
        batch_start: DateTime<Utc>,
    ) -> Result<Option<CountAggregate>, GatewayError> {
        self.inner.read_count_aggregate(batch_start).await
    }

    fn backend_type(&self) -> &'static str {
        "Failing"
    }
}
