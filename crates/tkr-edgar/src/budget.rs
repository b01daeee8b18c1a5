//! Outbound request pacing.
//!
//! A leaky bucket with a single slot: each caller reserves the next free
//! slot and sleeps until it opens, so requests leave at most once per
//! `interval / requests` regardless of how many tasks share the budget.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Default upstream allowance: 10 requests per second.
pub const DEFAULT_REQUESTS_PER_INTERVAL: u32 = 10;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug)]
pub struct RequestBudget {
    spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestBudget {
    /// `requests` per `interval`. Zero requests is treated as one.
    pub fn new(requests: u32, interval: Duration) -> Self {
        Self {
            spacing: interval / requests.max(1),
            next_slot: Mutex::new(None),
        }
    }

    /// No pacing at all.
    pub fn unlimited() -> Self {
        Self {
            spacing: Duration::ZERO,
            next_slot: Mutex::new(None),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait for the next slot.
    pub async fn acquire(&self) {
        if self.spacing.is_zero() {
            return;
        }
        let slot = {
            let mut next = self
                .next_slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.spacing);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_INTERVAL, DEFAULT_INTERVAL)
    }
}
