use crate::config::RetryPolicy;
use crate::errors::CatalogError;
use std::time::Duration;

impl RetryPolicy {
    /// Whether a failed attempt may be followed by another one.
    pub fn should_retry(&self, err: &CatalogError) -> bool {
        match err {
            CatalogError::Timeout(_) | CatalogError::Transport { .. } => true,
            CatalogError::UpstreamError { .. } => self.retry_upstream_errors,
            CatalogError::NotFound(_) => self.retry_not_found,
            CatalogError::InvalidPayload { .. }
            | CatalogError::CircuitOpen { .. }
            | CatalogError::Poisoned(_) => false,
        }
    }

    /// Backoff to wait before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let millis = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay_ms as f64);
        Duration::from_secs_f64(capped / 1000.0)
    }

    /// Total time spent on a call whose every attempt takes `per_attempt` and fails
    /// with a retryable error.
    pub fn worst_case(&self, per_attempt: Duration) -> Duration {
        let attempts = per_attempt.saturating_mul(self.max_attempts);
        (0..self.max_attempts.saturating_sub(1))
            .map(|retry| self.delay_for(retry))
            .fold(attempts, Duration::saturating_add)
    }
}
