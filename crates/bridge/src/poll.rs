//! The bounded, fixed-interval poll loop.
//!
//! [`poll_until_terminal`] drives any [`StatusSource`] with the decisions
//! from [`headshot_core::polling::decide`]: at most `max_attempts` checks,
//! a constant sleep between them, and no sleep after the last one.

use async_trait::async_trait;
use headshot_core::polling::{decide, PollBudget, PollDecision, PollStatus};

use crate::error::BridgeError;

/// Something that can report the current status of one job.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Payload carried by a ready status.
    type Output: Send;

    /// Perform one status check.
    async fn check(&self) -> Result<PollStatus<Self::Output>, BridgeError>;
}

/// A settled poll and the number of checks it took.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// Poll `source` until it settles or `budget` is exhausted.
///
/// - Ready -> `Ok` with the payload, no further checks.
/// - Failed -> [`BridgeError::GenerationFailed`].
/// - Still pending after `max_attempts` checks -> [`BridgeError::Timeout`].
/// - A check error is returned as-is; nothing is retried.
pub async fn poll_until_terminal<S>(
    source: &S,
    budget: &PollBudget,
) -> Result<PollOutcome<S::Output>, BridgeError>
where
    S: StatusSource + ?Sized,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let status = source.check().await?;

        if let PollStatus::Pending { detail } = &status {
            tracing::debug!(attempt, status = %detail, "Job still pending");
        }

        match decide(attempt, budget, status) {
            PollDecision::Finish(value) => {
                return Ok(PollOutcome {
                    value,
                    attempts: attempt,
                })
            }
            PollDecision::Fail(message) => {
                tracing::warn!(attempt, error = %message, "Job reported failure");
                return Err(BridgeError::GenerationFailed(message));
            }
            PollDecision::GiveUp => {
                tracing::warn!(attempts = attempt, "Polling budget exhausted");
                return Err(BridgeError::Timeout { attempts: attempt });
            }
            PollDecision::Wait => tokio::time::sleep(budget.interval).await,
        }
    }
}
