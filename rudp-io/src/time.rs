//! Time utilities
//!
//! Periodic timers for statistics reporting and deadline arithmetic for the
//! retransmission scheduler.

use std::time::{Duration, Instant};

/// Timer for periodic operations
///
/// Used for periodic statistics reports.
#[derive(Debug, Clone)]
pub struct Timer {
    interval: Duration,
    last_fire: Instant,
}

impl Timer {
    /// Create a new timer with the given interval
    pub fn new(interval: Duration) -> Self {
        Timer {
            interval,
            last_fire: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the timer has expired
    pub fn expired(&self) -> bool {
        self.last_fire.elapsed() >= self.interval
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.last_fire = Instant::now();
    }

    /// Get time until next expiration
    pub fn time_until_expiration(&self) -> Duration {
        self.interval.saturating_sub(self.last_fire.elapsed())
    }

    /// Fire the timer if expired, returning true if it fired
    pub fn try_fire(&mut self) -> bool {
        if self.expired() {
            self.reset();
            true
        } else {
            false
        }
    }
}

/// How long to wait for `deadline`, capped at `max_wait`
///
/// With no deadline the full `max_wait` is returned; a deadline in the past
/// yields zero.
pub fn wait_until(deadline: Option<Instant>, now: Instant, max_wait: Duration) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(now).min(max_wait),
        None => max_wait,
    }
}
