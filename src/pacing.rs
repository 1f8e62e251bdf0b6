use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;
use tracing;

/// Pause inserted after each network action of a batch.
///
/// Successful actions wait the base delay. Each consecutive failure adds an
/// exponentially growing penalty, capped at `max_delay`; the next success
/// clears it.
pub struct Pacer {
    base_delay: Duration,
    max_delay: Duration,
    backoff: ExponentialBackoff,
    penalty: Duration,
}

impl Pacer {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        let max_delay = max_delay.max(base_delay);
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(base_delay.max(Duration::from_millis(1)))
            .with_randomization_factor(0.0)
            .with_multiplier(2.0)
            .with_max_interval(max_delay)
            .with_max_elapsed_time(None)
            .build();
        Self {
            base_delay,
            max_delay,
            backoff,
            penalty: Duration::ZERO,
        }
    }

    /// Never pauses.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn record_success(&mut self) {
        self.backoff.reset();
        self.penalty = Duration::ZERO;
    }

    pub fn record_failure(&mut self) {
        if self.base_delay.is_zero() {
            return;
        }
        self.penalty = self.backoff.next_backoff().unwrap_or(self.max_delay);
    }

    pub fn current_delay(&self) -> Duration {
        (self.base_delay + self.penalty).min(self.max_delay)
    }

    pub async fn pause(&self) {
        let delay = self.current_delay();
        if delay.is_zero() {
            return;
        }
        if !self.penalty.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off after failure");
        }
        tokio::time::sleep(delay).await;
    }
}
