//! Retry budget and backoff.
//!
//! A failed attempt is re-issued while budget remains. The delay between
//! attempts is zero unless a base delay is configured, in which case it grows
//! exponentially and is capped.

use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Number of re-dispatches allowed after the first failure (default: 0)
    pub max_attempts: usize,
    /// Base delay for exponential backoff in milliseconds (default: 0, immediate)
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds (default: 5000)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) to spread delays (default: 0.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay_ms: 0,
            max_delay_ms: 5000,
            jitter_factor: 0.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries.
    pub fn no_retry() -> Self {
        Self::default()
    }

    /// Retry up to `attempts` times with no delay.
    pub fn immediate(attempts: usize) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Create a config with exponential backoff.
    pub fn backoff(attempts: usize, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: attempts,
            base_delay_ms,
            max_delay_ms,
            jitter_factor: 0.1,
        }
    }
}

/// Calculate backoff delay before retry number `attempt` (1-based).
///
/// Uses exponential backoff: `base_delay * 2^(attempt-1)`
/// Capped at `max_delay_ms`.
pub fn calculate_backoff(attempt: usize, config: &RetryConfig) -> Duration {
    if attempt == 0 || config.base_delay_ms == 0 {
        return Duration::ZERO;
    }

    let delay_ms = config
        .base_delay_ms
        .saturating_mul(1 << (attempt - 1).min(10));
    let capped_ms = delay_ms.min(config.max_delay_ms);

    let jitter_range = (capped_ms as f64 * config.jitter_factor) as u64;
    let jittered_ms = if jitter_range > 0 {
        // Simple deterministic jitter based on attempt number
        let jitter = (attempt as u64 * 7) % jitter_range;
        capped_ms.saturating_add(jitter)
    } else {
        capped_ms
    };

    Duration::from_millis(jittered_ms)
}
