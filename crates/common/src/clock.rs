//! Job timing utilities.
//!
//! Every job is anchored to a monotonic epoch recorded when the orchestrator
//! accepts it. The epoch drives two things: elapsed-time accounting in the
//! job result, and the shared wall-clock deadline each pipeline stage runs
//! under.

use std::time::{Duration, Instant};

/// A job clock anchored to the moment the job started.
#[derive(Debug, Clone)]
pub struct JobClock {
    /// The instant the job started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl JobClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the job started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at job start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// A wall-clock deadline shared by all stages of one job.
///
/// Stages ask for the remaining budget just before awaiting an external
/// process; an expired deadline means the job must fail with a timeout
/// instead of starting more work.
#[derive(Debug, Clone)]
pub struct Deadline {
    epoch: Instant,
    budget: Duration,
}

impl Deadline {
    /// Create a deadline `budget_secs` from now.
    pub fn new(budget_secs: u64) -> Self {
        Self {
            epoch: Instant::now(),
            budget: Duration::from_secs(budget_secs),
        }
    }

    /// Time left before the deadline, or `None` once expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.budget.checked_sub(self.epoch.elapsed())
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        self.remaining().is_none()
    }

    /// Total budget in seconds.
    pub fn budget_secs(&self) -> u64 {
        self.budget.as_secs()
    }
}
