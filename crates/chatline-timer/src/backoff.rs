//! Reconnect backoff: configuration and attempt bookkeeping.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Full configuration for reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt. Doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound for the doubled delay.
    pub max_delay: Duration,
    /// Reconnect attempts allowed between two successful opens.
    /// Once used up, the client stops and reports a fatal condition.
    pub max_attempts: u32,
    /// Fixed delay for the reconnect triggered by the app returning to the
    /// foreground. Independent of the backoff counter.
    pub visibility_delay: Duration,
    /// Random extra delay (0..=jitter) added on top of the backoff delay so
    /// many clients dropped by the same outage do not return in lockstep.
    /// Zero disables it.
    pub jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(10_000),
            max_attempts: 5,
            visibility_delay: Duration::from_millis(1_000),
            jitter: Duration::ZERO,
        }
    }
}

impl ReconnectConfig {
    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`ReconnectPolicy::new`]. Rules:
    /// - a zero `base_delay` falls back to the default (1 s).
    /// - `max_delay` is raised to at least `base_delay`.
    pub fn validated(mut self) -> Self {
        if self.base_delay.is_zero() {
            let fallback = Self::default().base_delay;
            warn!(
                fallback_ms = fallback.as_millis() as u64,
                "base_delay is zero, using default"
            );
            self.base_delay = fallback;
        }
        if self.max_delay < self.base_delay {
            warn!(
                max_delay_ms = self.max_delay.as_millis() as u64,
                base_delay_ms = self.base_delay.as_millis() as u64,
                "max_delay below base_delay, raising"
            );
            self.max_delay = self.base_delay;
        }
        self
    }

    /// `min(base_delay * 2^attempt, max_delay)`, without jitter.
    ///
    /// Saturates instead of overflowing for large attempt numbers.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Tracks how many reconnect attempts have been used since the last
/// successful open.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config: config.validated(),
            attempt: 0,
        }
    }

    /// Attempts used so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether every allowed attempt has been used.
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Claims the next attempt and returns how long to wait before it.
    ///
    /// The delay is computed from the attempt number *before* it is
    /// incremented, so the first reconnect waits `base_delay`. Returns
    /// `None` once exhausted; the counter does not move in that case.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.config.delay_for(self.attempt) + self.jitter();
        self.attempt += 1;
        Some(delay)
    }

    /// Back to attempt 0. Called on a successful open or explicit disconnect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.config.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
