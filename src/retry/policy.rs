//! Back-off policy for rate-limited requests.
//!
//! The session replays a request that was answered with
//! `429 Too Many Requests` after a delay that doubles on every replay.

use rand::Rng;
use std::time::Duration;

use crate::defaults::back_off;

/// Back-off policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BackOffPolicy {
    /// Maximum number of replays after a 429 response
    pub max_attempts: u32,
    /// Delay before the first replay
    pub initial_delay: Duration,
    /// Maximum delay between replays
    pub max_delay: Duration,
    /// Backoff multiplier (for exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub use_jitter: bool,
    /// Maximum jitter percentage (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackOffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: back_off::MAX_ATTEMPTS,
            initial_delay: back_off::INITIAL_DELAY,
            max_delay: back_off::MAX_DELAY,
            backoff_multiplier: back_off::MULTIPLIER,
            use_jitter: false,
            jitter_factor: 0.1,
        }
    }
}

impl BackOffPolicy {
    /// Create a new back-off policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set initial delay
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    pub const fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Set jitter factor
    pub const fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Whether another replay is allowed after `used` replays.
    pub fn allows(&self, used: u32) -> bool {
        used < self.max_attempts
    }

    /// Calculate delay for a given replay (0-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);

        let delay = Duration::from_millis(base_delay as u64).min(self.max_delay);

        if self.use_jitter {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    /// Add jitter to a delay
    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rng.gen_range(-jitter_range..=jitter_range);

        let new_delay = delay.as_millis() as f64 + jitter;
        Duration::from_millis(new_delay.max(0.0) as u64)
    }
}
