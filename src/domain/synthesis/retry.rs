use std::time::Duration;
use tokio::time::sleep;

pub const DEFAULT_CHUNK_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MANUAL_MAX_RETRIES: u32 = 2;

/// Linear backoff between attempts of the same chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub step_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_CHUNK_MAX_RETRIES,
            base_delay: Duration::from_secs(2),
            step_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, step_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            step_delay,
        }
    }

    pub fn with_max_retries(&self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self.clone()
        }
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay + self.step_delay.saturating_mul(attempt)
    }

    pub async fn wait_before_retry(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        tracing::debug!(
            delay_ms = delay.as_millis() as u64,
            next_attempt = attempt + 2,
            "Waiting before retry"
        );
        sleep(delay).await;
    }
}
