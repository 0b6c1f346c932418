//! Tunables of the order transaction core.

use std::time::Duration;

use domain::StatusPathPolicy;
use rand::Rng;

use crate::throttle::ThrottlePolicy;

/// Settings for [`crate::OrderCoordinator`].
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Times a mutation runs before a serialization failure is returned.
    pub tx_attempts: u32,
    /// Base pause before the second attempt. Doubles per retry, with jitter.
    pub tx_backoff: Duration,
    /// Upper bound of a single pause between attempts.
    pub tx_backoff_cap: Duration,
    /// Order numbers tried per transaction before giving up.
    pub number_attempts: u32,
    /// Characters per generated order number.
    pub number_length: usize,
    /// Handling of target statuses that are not direct successors.
    pub status_path: StatusPathPolicy,
    pub create_throttle: ThrottlePolicy,
    pub preview_throttle: ThrottlePolicy,
    pub note_throttle: ThrottlePolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tx_attempts: 3,
            tx_backoff: Duration::from_millis(10),
            tx_backoff_cap: Duration::from_millis(250),
            number_attempts: 5,
            number_length: 6,
            status_path: StatusPathPolicy::SingleHop,
            create_throttle: ThrottlePolicy::per_minute(),
            preview_throttle: ThrottlePolicy::per_minute(),
            note_throttle: ThrottlePolicy::per_five_minutes(),
        }
    }
}

impl CoreConfig {
    pub fn with_status_path(mut self, policy: StatusPathPolicy) -> Self {
        self.status_path = policy;
        self
    }

    pub fn with_tx_attempts(mut self, attempts: u32) -> Self {
        self.tx_attempts = attempts.max(1);
        self
    }

    pub fn with_tx_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.tx_backoff = base;
        self.tx_backoff_cap = cap.max(base);
        self
    }

    pub fn with_number_attempts(mut self, attempts: u32) -> Self {
        self.number_attempts = attempts.max(1);
        self
    }

    /// Pause after the `run`th failed attempt: exponential from
    /// `tx_backoff`, capped, plus up to the same amount again of random jitter.
    pub fn retry_delay(&self, run: u32) -> Duration {
        let exponent = run.saturating_sub(1).min(16);
        let delay = self
            .tx_backoff
            .saturating_mul(1 << exponent)
            .min(self.tx_backoff_cap);
        let jitter_ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    /// Disables every throttle policy.
    pub fn without_throttling(mut self) -> Self {
        self.create_throttle = ThrottlePolicy::unlimited();
        self.preview_throttle = ThrottlePolicy::unlimited();
        self.note_throttle = ThrottlePolicy::unlimited();
        self
    }
}
