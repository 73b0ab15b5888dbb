//! One ingestion + aggregation pass

use super::config::PipelineConfig;
use crate::aggregator_core::{aligned_window, AggregationEngine, AggregationError, Window};
use crate::persistence::{CountAggregate, GatewayError, PersistenceGateway};
use crate::streamer_core::{
    FeedConnector, RetryPolicy, RetryingSessionRunner, RunnerError, SessionSummary, StreamSession,
    SubscriptionRequest,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub enum CycleError {
    Schema(GatewayError),
    Ingestion(RunnerError),
    Aggregation(AggregationError),
}

impl From<RunnerError> for CycleError {
    fn from(err: RunnerError) -> Self {
        CycleError::Ingestion(err)
    }
}

impl From<AggregationError> for CycleError {
    fn from(err: AggregationError) -> Self {
        CycleError::Aggregation(err)
    }
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::Schema(e) => write!(f, "Schema setup failed: {}", e),
            CycleError::Ingestion(e) => write!(f, "{}", e),
            CycleError::Aggregation(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CycleError {}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub summary: SessionSummary,
    pub window: Window,
    pub aggregate: CountAggregate,
}

pub struct IngestionCycle {
    gateway: Arc<dyn PersistenceGateway>,
    session: StreamSession,
    runner: RetryingSessionRunner,
    engine: AggregationEngine,
    session_duration: Duration,
}

impl IngestionCycle {
    pub fn new(
        connector: Arc<dyn FeedConnector>,
        gateway: Arc<dyn PersistenceGateway>,
        subscription: SubscriptionRequest,
        session_duration: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            session: StreamSession::new(connector, gateway.clone(), subscription),
            runner: RetryingSessionRunner::new(policy),
            engine: AggregationEngine::new(gateway.clone()),
            gateway,
            session_duration,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        connector: Arc<dyn FeedConnector>,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self::new(
            connector,
            gateway,
            SubscriptionRequest::global(&config.api_key),
            config.session_duration(),
            config.retry_policy(),
        )
    }

    /// Ensure schema, stream one retried session, then aggregate the window
    /// containing the moment ingestion finished
    ///
    /// Aggregation is skipped when ingestion exhausts its retries.
    pub async fn run_once(&self) -> Result<CycleReport, CycleError> {
        log::info!("🔧 Ensuring schema ({})", self.gateway.backend_type());
        self.gateway.ensure_schema().await.map_err(CycleError::Schema)?;

        let summary = self.runner.run(&self.session, self.session_duration).await?;

        let window = aligned_window(Utc::now());
        let aggregate = self.engine.aggregate_window(&window).await?;

        log::info!(
            "✅ Cycle complete: {} records ingested, window {}: {} vessels",
            summary.records_received,
            window,
            aggregate.total
        );

        Ok(CycleReport {
            summary,
            window,
            aggregate,
        })
    }
}
