//! Job handles, results and the per-request job lifecycle.
//!
//! Every external job moves through:
//!
//! ```text
//! Created -> Submitted -> Polling -> Ready | Failed | TimedOut
//!                      \-> DelegatedWait -> Ready | Failed
//! ```
//!
//! [`JobLifecycle`] enforces those edges so a handle reaches exactly one
//! terminal state before the request returns.

use serde::Serialize;

use crate::error::CoreError;

/// An in-flight external job, owned by a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Provider-assigned job identifier.
    pub id: String,
    /// Provider-issued URL used to check job status.
    pub status_url: String,
    /// Where the finished result document is fetched from, if separate.
    pub result_url: Option<String>,
}

/// What a successful job produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Artifact {
    /// Direct link to a generated file.
    Url(String),
    /// Provider result document, relayed as-is.
    Document(serde_json::Value),
}

impl Artifact {
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Artifact::Url(url) => Some(url),
            Artifact::Document(_) => None,
        }
    }

    /// Convert into a JSON value suitable for relaying to the client.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Artifact::Url(url) => serde_json::Value::String(url),
            Artifact::Document(doc) => doc,
        }
    }
}

/// Terminal success of an external job.
///
/// Terminal failures are reported as errors by the bridge, so a handle maps
/// to exactly one `Ok(JobResult)` or one error.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job_id: String,
    pub artifact: Artifact,
    /// Status checks performed before the job settled.
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Submitted,
    Polling,
    DelegatedWait,
    Ready,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Ready | JobState::Failed | JobState::TimedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Submitted => "submitted",
            JobState::Polling => "polling",
            JobState::DelegatedWait => "delegated_wait",
            JobState::Ready => "ready",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
        }
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Submitted)
                | (Created, Failed)
                | (Created, DelegatedWait)
                | (Submitted, Polling)
                | (Submitted, Failed)
                | (Polling, Ready)
                | (Polling, Failed)
                | (Polling, TimedOut)
                | (DelegatedWait, Ready)
                | (DelegatedWait, Failed)
        )
    }
}

/// Tracks one job through its lifecycle.
#[derive(Debug)]
pub struct JobLifecycle {
    state: JobState,
}

impl Default for JobLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl JobLifecycle {
    pub fn new() -> Self {
        Self {
            state: JobState::Created,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`, rejecting edges outside the lifecycle graph.
    ///
    /// Once terminal, every further transition is rejected.
    pub fn advance(&mut self, next: JobState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}
