//! Bounded exponential backoff for the reconnect loop.

use std::time::Duration;

use dcxmpp_shared::constants::{RECONNECT_INITIAL_DELAY_MS, RECONNECT_MAX_DELAY_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(RECONNECT_INITIAL_DELAY_MS),
            max: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
        }
    }
}

/// Doubles from `initial` up to `max`; [`Backoff::reset`] once a session
/// has been established.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    next: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            next: config.initial,
            config,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next.min(self.config.max);
        self.next = (delay * 2).min(self.config.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.config.initial;
    }
}
