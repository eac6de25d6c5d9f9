//! Limits for rendering and watching
//!
//! Provides:
//! - Partial nesting depth
//! - Poll interval and concurrency
//! - Overall deploy attempt deadline

use std::time::Duration;

/// Deepest allowed chain of partials including partials
pub const MAX_PARTIAL_DEPTH: usize = 32;

/// Limits for a single watch of a resource set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchLimits {
    /// Pause between two poll cycles
    pub poll_interval: Duration,

    /// Maximum number of resources polled at the same time
    pub max_concurrent_polls: usize,

    /// Hard stop for the whole attempt, on top of per-kind timeouts
    pub attempt_deadline: Duration,
}

impl Default for WatchLimits {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_concurrent_polls: 8,
            attempt_deadline: Duration::from_secs(600), // 10 minutes
        }
    }
}

impl WatchLimits {
    /// Limits suitable for testing (fast cycles, short deadline)
    pub fn testing() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            max_concurrent_polls: 2,
            attempt_deadline: Duration::from_secs(10),
        }
    }

    /// Limits suitable for production (balanced)
    pub fn production() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_concurrency(mut self, max: usize) -> Self {
        // a zero-permit semaphore would never poll anything
        self.max_concurrent_polls = max.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.attempt_deadline = deadline;
        self
    }
}
