//! Whole-session retry at the orchestration boundary
//!
//! Each attempt runs one full `StreamSession` under a hard wall-clock limit.
//! An attempt that hits the limit is abandoned but still leaves its summary
//! row. Transport failures, persistence failures and timeouts all count as
//! failed attempts; attempts never overlap.

use crate::persistence::GatewayError;
use crate::streamer_core::error_handler::FixedBackoff;
use crate::streamer_core::session::{SessionError, SessionSummary, StreamSession};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Hard limit per attempt; an attempt exceeding it is abandoned
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            retry_delay: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug)]
pub enum AttemptFailure {
    /// Session ended early on a transport failure (summary was written)
    Transport(SessionSummary),
    Persistence(GatewayError),
    TimedOut(Duration),
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::Transport(summary) => write!(
                f,
                "transport failure ({:?}) after {} records",
                summary.end, summary.records_received
            ),
            AttemptFailure::Persistence(e) => write!(f, "persistence failure: {}", e),
            AttemptFailure::TimedOut(limit) => {
                write!(f, "attempt exceeded {}s timeout", limit.as_secs_f64())
            }
        }
    }
}

#[derive(Debug)]
pub enum RunnerError {
    Exhausted { attempts: u32, last: AttemptFailure },
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::Exhausted { attempts, last } => {
                write!(f, "Ingestion failed after {} attempts; last: {}", attempts, last)
            }
        }
    }
}

impl std::error::Error for RunnerError {}

pub struct RetryingSessionRunner {
    policy: RetryPolicy,
}

impl RetryingSessionRunner {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `session` until one attempt reaches its deadline cleanly
    pub async fn run(
        &self,
        session: &StreamSession,
        duration: Duration,
    ) -> Result<SessionSummary, RunnerError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = FixedBackoff::new(self.policy.retry_delay, max_attempts - 1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            log::info!("🔁 Ingestion attempt {}/{}", attempt, max_attempts);

            let failure = match session
                .run_with_limit(duration, self.policy.attempt_timeout)
                .await
            {
                Ok(summary) if !summary.transport_failed() => {
                    if attempt > 1 {
                        log::info!("✅ Ingestion succeeded on attempt {}", attempt);
                    }
                    return Ok(summary);
                }
                Ok(summary) => AttemptFailure::Transport(summary),
                Err(SessionError::Persistence(e)) => AttemptFailure::Persistence(e),
                Err(SessionError::TimedOut(limit)) => AttemptFailure::TimedOut(limit),
            };

            log::warn!("⚠️  Attempt {} failed: {}", attempt, failure);

            if backoff.sleep().await.is_err() {
                log::error!("❌ Retry budget exhausted after {} attempts", attempt);
                return Err(RunnerError::Exhausted {
                    attempts: attempt,
                    last: failure,
                });
            }
        }
    }
}
