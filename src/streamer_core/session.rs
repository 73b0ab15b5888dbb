//! One bounded-duration ingestion session
//!
//! The deadline is absolute from session start: every receive waits at most
//! for the time remaining, and a received frame never extends the budget.
//! Exactly one `ingestion_log` row is written per session, on every exit path.

use crate::persistence::{GatewayError, IngestionLogEntry, PersistenceGateway};
use crate::streamer_core::feed_client::{FeedConnector, SubscriptionRequest, TransportError};
use crate::streamer_core::message_router::{classify, RoutedMessage};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Why the session stopped
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// Duration budget used up. Not an error.
    DeadlineReached,
    /// Peer closed the stream before the deadline
    TransportClosed,
    TransportError(TransportError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub records_received: u64,
    pub errors_encountered: u64,
    pub end: SessionEnd,
}

impl SessionSummary {
    /// Transport failures end the session cleanly but still count as a
    /// failed attempt for the retry runner.
    pub fn transport_failed(&self) -> bool {
        !matches!(self.end, SessionEnd::DeadlineReached)
    }
}

#[derive(Debug)]
pub enum SessionError {
    /// A gateway write failed mid-session; the session was aborted
    Persistence(GatewayError),
    /// The hard wall-clock limit passed before the session could finish
    TimedOut(Duration),
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        SessionError::Persistence(err)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Persistence(e) => write!(f, "Session aborted by persistence failure: {}", e),
            SessionError::TimedOut(limit) => {
                write!(f, "Session aborted after {}s hard limit", limit.as_secs_f64())
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Default)]
struct Counters {
    records: u64,
    errors: u64,
    ignored: u64,
}

pub struct StreamSession {
    connector: Arc<dyn FeedConnector>,
    gateway: Arc<dyn PersistenceGateway>,
    subscription: SubscriptionRequest,
}

impl StreamSession {
    pub fn new(
        connector: Arc<dyn FeedConnector>,
        gateway: Arc<dyn PersistenceGateway>,
        subscription: SubscriptionRequest,
    ) -> Self {
        Self {
            connector,
            gateway,
            subscription,
        }
    }

    /// Stream for at most `duration`, persisting every routed frame
    ///
    /// Returns `Ok` for a clean end (deadline) and for transport failures
    /// (one counted error). Returns `Err` only when a gateway write fails;
    /// the summary row is still attempted in that case.
    pub async fn run(&self, duration: Duration) -> Result<SessionSummary, SessionError> {
        self.run_bounded(duration, None).await
    }

    /// Same as `run`, but abandons the session outright once `limit` has
    /// elapsed since start, even if a gateway call is stuck. The summary row
    /// for the abandoned session is still written with the counts so far.
    pub async fn run_with_limit(
        &self,
        duration: Duration,
        limit: Duration,
    ) -> Result<SessionSummary, SessionError> {
        self.run_bounded(duration, Some(limit)).await
    }

    async fn run_bounded(
        &self,
        duration: Duration,
        limit: Option<Duration>,
    ) -> Result<SessionSummary, SessionError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = start + duration;
        let mut counters = Counters::default();

        log::info!(
            "📡 Session started: {}s budget on {}",
            duration.as_secs_f64(),
            self.connector.endpoint()
        );

        // A limit too large to represent as an Instant is no limit
        let abort_at = limit.and_then(|limit| start.checked_add(limit).map(|at| (limit, at)));

        let streaming = self.stream_until(deadline, &mut counters);
        let outcome = match abort_at {
            Some((limit, at)) => match timeout_at(at, streaming).await {
                Ok(result) => result.map_err(SessionError::Persistence),
                Err(_) => Err(SessionError::TimedOut(limit)),
            },
            None => streaming.await.map_err(SessionError::Persistence),
        };

        let ended_at = Utc::now();
        let entry = IngestionLogEntry {
            window_start: started_at,
            window_end: ended_at,
            records_received: counters.records,
            errors_encountered: counters.errors,
        };

        match outcome {
            Ok(end) => {
                self.gateway.append_ingestion_log(&entry).await?;

                let summary = SessionSummary {
                    started_at,
                    ended_at,
                    records_received: counters.records,
                    errors_encountered: counters.errors,
                    end,
                };
                log::info!(
                    "✅ Session ended ({:?}): records={} errors={} ignored={}",
                    summary.end,
                    summary.records_received,
                    summary.errors_encountered,
                    counters.ignored
                );
                Ok(summary)
            }
            Err(e) => {
                log::error!("❌ Session aborted after {} records: {}", counters.records, e);
                if let Err(log_err) = self.gateway.append_ingestion_log(&entry).await {
                    log::error!("❌ Failed to write ingestion log for aborted session: {}", log_err);
                }
                Err(e)
            }
        }
    }

    async fn stream_until(
        &self,
        deadline: Instant,
        counters: &mut Counters,
    ) -> Result<SessionEnd, GatewayError> {
        let mut connection = match timeout_at(deadline, self.connector.connect()).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => return Ok(transport_failure(counters, e)),
            Err(_) => {
                return Ok(transport_failure(
                    counters,
                    TransportError::Connect("connect did not finish within session budget".to_string()),
                ))
            }
        };

        let subscribe = match self.subscription.to_json() {
            Ok(json) => json,
            Err(e) => return Ok(transport_failure(counters, TransportError::Send(e.to_string()))),
        };
        match timeout_at(deadline, connection.send_text(subscribe)).await {
            Ok(Ok(())) => log::info!("📨 Subscription sent"),
            Ok(Err(e)) => return Ok(transport_failure(counters, e)),
            Err(_) => {
                return Ok(transport_failure(
                    counters,
                    TransportError::Send("subscribe did not finish within session budget".to_string()),
                ))
            }
        }

        loop {
            if Instant::now() >= deadline {
                return Ok(SessionEnd::DeadlineReached);
            }

            let frame = match timeout_at(deadline, connection.next_frame()).await {
                Err(_) => return Ok(SessionEnd::DeadlineReached),
                Ok(Ok(Some(frame))) => frame,
                Ok(Ok(None)) => {
                    counters.errors += 1;
                    log::warn!("⚠️  Connection closed by peer after {} records", counters.records);
                    return Ok(SessionEnd::TransportClosed);
                }
                Ok(Err(e)) => return Ok(transport_failure(counters, e)),
            };

            match classify(&frame, Utc::now()) {
                RoutedMessage::Position(record) => {
                    self.gateway.append_position(&record).await?;
                    counters.records += 1;
                    log::debug!("📍 position ship={} ({:.4}, {:.4})", record.ship_id, record.latitude, record.longitude);
                }
                RoutedMessage::Static(record) => {
                    self.gateway.upsert_static(&record).await?;
                    counters.records += 1;
                    log::debug!("🚢 static ship={} type={} dest={}", record.ship_id, record.ship_type, record.destination);
                }
                RoutedMessage::Ignored(reason) => {
                    // Dropped without touching errors_encountered
                    counters.ignored += 1;
                    log::debug!("Skipping frame: {}", reason);
                }
            }
        }
    }
}

fn transport_failure(counters: &mut Counters, error: TransportError) -> SessionEnd {
    counters.errors += 1;
    log::warn!("⚠️  Transport failure after {} records: {}", counters.records, error);
    SessionEnd::TransportError(error)
}
