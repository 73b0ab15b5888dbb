use std::time::Duration;
use tokio::time::sleep;

/// Fixed-delay retry budget between whole-session attempts
#[derive(Debug)]
pub struct FixedBackoff {
    delay: Duration,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl FixedBackoff {
    pub fn new(delay: Duration, max_retries: u32) -> Self {
        Self {
            delay,
            max_retries,
            current_attempt: 0,
        }
    }

    /// Wait before the next retry, or fail once the budget is spent
    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        if self.current_attempt >= self.max_retries {
            return Err(MaxRetriesExceeded);
        }

        log::warn!(
            "⏳ Retry {} of {} in {}s",
            self.current_attempt + 1,
            self.max_retries,
            self.delay.as_secs_f64()
        );

        sleep(self.delay).await;
        self.current_attempt += 1;
        Ok(())
    }

    pub fn retries_used(&self) -> u32 {
        self.current_attempt
    }
}
