//! One interface over both ways of waiting for an external job.
//!
//! [`KontextBridge`] submits to BFL and polls the returned URL itself;
//! [`FalSubscribeBridge`] hands the whole cycle to [`FalClient::subscribe`].
//! Routes hold an `Arc<dyn JobBridge>` and never see which path runs.

use std::sync::Arc;

use async_trait::async_trait;
use headshot_core::job::{JobLifecycle, JobResult, JobState};
use headshot_core::polling::PollBudget;

use crate::bfl::BflClient;
use crate::error::BridgeError;
use crate::fal::{log_progress, FalClient, ProgressCallback};

/// Submits a provider-specific payload and waits for a terminal result.
#[async_trait]
pub trait JobBridge: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Run one job to completion.
    ///
    /// Returns the job's result, or the error that ended it: a provider
    /// rejection, a generation failure, or an exhausted budget.
    async fn run(&self, payload: serde_json::Value) -> Result<JobResult, BridgeError>;
}

/// Terminal lifecycle state for a job that ended with `err`.
fn failure_state(err: &BridgeError, delegated: bool) -> JobState {
    match err {
        BridgeError::Timeout { .. } if !delegated => JobState::TimedOut,
        _ => JobState::Failed,
    }
}

/// Record the terminal transition and log it.
fn settle(
    bridge: &str,
    lifecycle: &mut JobLifecycle,
    outcome: &Result<JobResult, BridgeError>,
    delegated: bool,
) -> Result<(), BridgeError> {
    match outcome {
        Ok(result) => {
            lifecycle.advance(JobState::Ready)?;
            tracing::info!(
                bridge,
                job_id = %result.job_id,
                attempts = result.attempts,
                "Job ready",
            );
        }
        Err(err) => {
            let state = failure_state(err, delegated);
            lifecycle.advance(state)?;
            tracing::warn!(bridge, state = state.as_str(), error = %err, "Job did not succeed");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Manual polling
// ---------------------------------------------------------------------------

/// Submit-then-poll bridge over a BFL endpoint.
pub struct KontextBridge {
    client: Arc<BflClient>,
    endpoint: String,
    budget: PollBudget,
}

impl KontextBridge {
    pub fn new(client: Arc<BflClient>, endpoint: impl Into<String>, budget: PollBudget) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            budget,
        }
    }
}

#[async_trait]
impl JobBridge for KontextBridge {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn run(&self, payload: serde_json::Value) -> Result<JobResult, BridgeError> {
        let mut lifecycle = JobLifecycle::new();

        let handle = match self.client.submit(&self.endpoint, &payload).await {
            Ok(handle) => handle,
            Err(err) => {
                // Rejected submissions never reach the poll loop.
                lifecycle.advance(JobState::Failed)?;
                tracing::warn!(bridge = %self.endpoint, error = %err, "Submission rejected");
                return Err(err);
            }
        };
        lifecycle.advance(JobState::Submitted)?;
        tracing::info!(bridge = %self.endpoint, job_id = %handle.id, "Job submitted");

        lifecycle.advance(JobState::Polling)?;
        let outcome = self.client.poll(&handle, &self.budget).await;
        settle(&self.endpoint, &mut lifecycle, &outcome, false)?;
        outcome
    }
}

// ---------------------------------------------------------------------------
// Delegated subscribe
// ---------------------------------------------------------------------------

/// Bridge that delegates submit-and-wait to a fal subscribe cycle.
pub struct FalSubscribeBridge {
    client: Arc<FalClient>,
    model: String,
    budget: PollBudget,
    on_update: Arc<ProgressCallback<'static>>,
}

impl FalSubscribeBridge {
    /// Bridge for `model`, reporting progress through `tracing`.
    pub fn new(client: Arc<FalClient>, model: impl Into<String>, budget: PollBudget) -> Self {
        Self {
            client,
            model: model.into(),
            budget,
            on_update: Arc::new(log_progress),
        }
    }

    /// Replace the progress callback.
    pub fn with_progress(mut self, on_update: Arc<ProgressCallback<'static>>) -> Self {
        self.on_update = on_update;
        self
    }
}

#[async_trait]
impl JobBridge for FalSubscribeBridge {
    fn name(&self) -> &str {
        &self.model
    }

    async fn run(&self, payload: serde_json::Value) -> Result<JobResult, BridgeError> {
        let mut lifecycle = JobLifecycle::new();
        lifecycle.advance(JobState::DelegatedWait)?;

        let outcome = self
            .client
            .subscribe(&self.model, &payload, &self.budget, self.on_update.as_ref())
            .await;
        settle(&self.model, &mut lifecycle, &outcome, true)?;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use assert_matches::assert_matches;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::json;

    use super::*;
    use crate::bfl::KONTEXT_ENDPOINT;
    use crate::fal::{QueueUpdate, LORA_GENERATION_MODEL};

    fn budget(max_attempts: u32) -> PollBudget {
        PollBudget::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn delegated_timeouts_settle_as_failed() {
        let err = BridgeError::Timeout { attempts: 3 };
        assert_eq!(failure_state(&err, false), JobState::TimedOut);
        assert_eq!(failure_state(&err, true), JobState::Failed);
    }

    #[tokio::test]
    async fn rejected_submission_never_polls() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/flux-kontext-pro");
                then.status(500).body("upstream exploded");
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(json!({"status": "Ready"}));
            })
            .await;

        let client = Arc::new(BflClient::new("k", server.base_url()));
        let bridge: Arc<dyn JobBridge> =
            Arc::new(KontextBridge::new(client, KONTEXT_ENDPOINT, budget(5)));
        let err = bridge.run(json!({"prompt": "p"})).await.unwrap_err();

        assert_matches!(err, BridgeError::Provider { status: 500, body, .. } if body == "upstream exploded");
        poll.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn kontext_bridge_returns_artifact_url() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/flux-kontext-pro");
                then.status(200).json_body(json!({
                    "id": "j",
                    "polling_url": server.url("/v1/get_result?id=j")
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/get_result");
                then.status(200).json_body(json!({
                    "status": "Ready",
                    "result": {"sample": "https://out/j.jpg"}
                }));
            })
            .await;

        let client = Arc::new(BflClient::new("k", server.base_url()));
        let bridge = KontextBridge::new(client, KONTEXT_ENDPOINT, budget(5));
        let result = bridge.run(json!({"prompt": "p"})).await.unwrap();

        assert_eq!(bridge.name(), "flux-kontext-pro");
        assert_eq!(result.job_id, "j");
        assert_eq!(result.artifact.as_url(), Some("https://out/j.jpg"));
    }

    #[tokio::test]
    async fn fal_bridge_invokes_custom_progress() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/fal-ai/flux-lora");
                then.status(200).json_body(json!({"request_id": "r"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/fal-ai/flux-lora/requests/r/status");
                then.status(200).json_body(json!({"status": "COMPLETED"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/fal-ai/flux-lora/requests/r");
                then.status(200).json_body(json!({"images": []}));
            })
            .await;

        let seen = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&seen);
        let client = Arc::new(FalClient::new("k", server.base_url()));
        let bridge = FalSubscribeBridge::new(client, LORA_GENERATION_MODEL, budget(5))
            .with_progress(Arc::new(move |_update: &QueueUpdate| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        let result = bridge.run(json!({"prompt": "p"})).await.unwrap();

        assert_eq!(result.artifact.into_json(), json!({"images": []}));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
