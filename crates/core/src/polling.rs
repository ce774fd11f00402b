//! Bounded, fixed-interval polling decisions.
//!
//! The poll loop itself lives next to the provider clients; this module only
//! answers "given attempt `n` and the status just observed, what now?" so the
//! timeout cutoff can be tested without any I/O.

use std::time::Duration;

/// Attempts allowed when polling a submitted job.
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 40;
/// Constant delay between status checks (40 x 500 ms = 20 s ceiling).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Attempt budget and interval for one polling sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollBudget {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Upper bound on time spent sleeping between attempts.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing.
    pub fn ceiling(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts.saturating_sub(1))
    }
}

/// A provider status reduced to what the poll loop cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    /// Still queued or running. `detail` is the raw provider status.
    Pending { detail: String },
    /// Finished successfully with the given payload.
    Ready(T),
    /// Finished unsuccessfully; the message is surfaced to the caller.
    Failed(String),
}

/// What the poll loop should do after observing a status.
#[derive(Debug, Clone, PartialEq)]
pub enum PollDecision<T> {
    /// Stop and return the payload.
    Finish(T),
    /// Stop and report a generation failure.
    Fail(String),
    /// Sleep for the budget interval, then poll again.
    Wait,
    /// Budget exhausted without a terminal status.
    GiveUp,
}

/// Decide the next step after `attempt` (1-based) observed `status`.
pub fn decide<T>(attempt: u32, budget: &PollBudget, status: PollStatus<T>) -> PollDecision<T> {
    match status {
        PollStatus::Ready(value) => PollDecision::Finish(value),
        PollStatus::Failed(message) => PollDecision::Fail(message),
        PollStatus::Pending { .. } if attempt >= budget.max_attempts => PollDecision::GiveUp,
        PollStatus::Pending { .. } => PollDecision::Wait,
    }
}

// ---------------------------------------------------------------------------
// Status vocabularies
// ---------------------------------------------------------------------------

/// Terminal-outcome class of a raw provider status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Pending,
    Ready,
    Failed,
}

/// Classify a BFL `get_result` status (case-insensitive).
///
/// `Ready` succeeds; `Error`, `Failed`, the moderation outcomes and
/// `Task not found` fail; anything else (`Pending`, `Processing`, `Queued`)
/// keeps polling.
pub fn classify_bfl_status(status: &str) -> StatusClass {
    match status.trim().to_ascii_lowercase().as_str() {
        "ready" => StatusClass::Ready,
        "error" | "failed" | "content moderated" | "request moderated" | "task not found" => {
            StatusClass::Failed
        }
        _ => StatusClass::Pending,
    }
}

/// Classify a fal queue status (case-insensitive).
pub fn classify_fal_status(status: &str) -> StatusClass {
    match status.trim().to_ascii_uppercase().as_str() {
        "COMPLETED" => StatusClass::Ready,
        "IN_QUEUE" | "IN_PROGRESS" => StatusClass::Pending,
        _ => StatusClass::Failed,
    }
}
