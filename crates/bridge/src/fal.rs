//! Queue client for fal.ai models with a blocking `subscribe` cycle.
//!
//! `subscribe` submits the input to `POST {queue}/{model}`, follows the
//! returned `status_url` (with logs) until the request completes, reporting
//! each status to a progress callback, and finally fetches the result
//! document from `response_url`. Callers get the whole cycle as one call.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use headshot_core::job::{Artifact, JobHandle, JobResult};
use headshot_core::polling::{classify_fal_status, PollBudget, PollStatus, StatusClass};
use serde::Deserialize;
use serde_json::json;

use crate::error::BridgeError;
use crate::poll::{poll_until_terminal, StatusSource};

pub const DEFAULT_FAL_QUEUE_URL: &str = "https://queue.fal.run";

/// Text-to-image with a user-supplied LoRA.
pub const LORA_GENERATION_MODEL: &str = "fal-ai/flux-lora";
/// Fast LoRA trainer taking a zip of images.
pub const LORA_TRAINING_MODEL: &str = "fal-ai/flux-lora-fast-training";

const PROVIDER: &str = "fal";

/// Progress report passed to the subscribe callback on every status check.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueUpdate {
    pub request_id: String,
    pub status: String,
    pub queue_position: Option<u32>,
    /// Log lines not seen in an earlier update.
    pub new_logs: Vec<String>,
}

/// Callback invoked with each [`QueueUpdate`]; may borrow for `'a`.
pub type ProgressCallback<'a> = dyn Fn(&QueueUpdate) + Send + Sync + 'a;

/// Progress callback that forwards queue updates to `tracing`.
pub fn log_progress(update: &QueueUpdate) {
    tracing::info!(
        request_id = %update.request_id,
        status = %update.status,
        queue_position = ?update.queue_position,
        "fal queue update",
    );
    for line in &update.new_logs {
        tracing::debug!(request_id = %update.request_id, "{line}");
    }
}

/// HTTP client for the fal queue API.
pub struct FalClient {
    client: reqwest::Client,
    api_key: String,
    queue_url: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
    status_url: Option<String>,
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    queue_position: Option<u32>,
    #[serde(default)]
    logs: Option<Vec<LogEntry>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogEntry {
    message: String,
}

impl FalClient {
    /// Create a client for `queue_url` (e.g. [`DEFAULT_FAL_QUEUE_URL`]).
    pub fn new(api_key: impl Into<String>, queue_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_key, queue_url)
    }

    pub fn with_client(
        client: reqwest::Client,
        api_key: impl Into<String>,
        queue_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            queue_url: queue_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    /// Enqueue `input` for `model` and return the queue handle.
    ///
    /// Status and result URLs default to the queue's conventional
    /// `requests/{id}/status` and `requests/{id}` paths when the response
    /// omits them.
    pub async fn submit(
        &self,
        model: &str,
        input: &serde_json::Value,
    ) -> Result<JobHandle, BridgeError> {
        let model = model.trim_matches('/');
        let response = self
            .client
            .post(format!("{}/{}", self.queue_url, model))
            .header("Authorization", self.auth_header())
            .json(input)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BridgeError::from_response(PROVIDER, response).await);
        }

        let body: SubmitResponse =
            response
                .json()
                .await
                .map_err(|e| BridgeError::MalformedResponse {
                    provider: PROVIDER,
                    detail: e.to_string(),
                })?;

        let request_url = format!("{}/{}/requests/{}", self.queue_url, model, body.request_id);
        Ok(JobHandle {
            status_url: body
                .status_url
                .unwrap_or_else(|| format!("{request_url}/status")),
            result_url: Some(body.response_url.unwrap_or(request_url)),
            id: body.request_id,
        })
    }

    /// One status check, including logs.
    async fn status(&self, handle: &JobHandle) -> Result<StatusResponse, BridgeError> {
        let response = self
            .client
            .get(&handle.status_url)
            .query(&[("logs", "1")])
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BridgeError::from_response(PROVIDER, response).await);
        }
        Ok(response.json().await?)
    }

    /// Fetch the result document of a completed request.
    pub async fn result(&self, handle: &JobHandle) -> Result<serde_json::Value, BridgeError> {
        let url = handle
            .result_url
            .as_deref()
            .ok_or_else(|| BridgeError::MalformedResponse {
                provider: PROVIDER,
                detail: format!("No response_url for request {}", handle.id),
            })?;

        let response = self
            .client
            .get(url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BridgeError::from_response(PROVIDER, response).await);
        }
        Ok(response.json().await?)
    }

    /// Submit, wait for completion under `budget`, and fetch the result.
    ///
    /// `on_update` sees every status check. Submission errors, failure
    /// statuses and result-fetch errors are propagated unchanged.
    pub async fn subscribe(
        &self,
        model: &str,
        input: &serde_json::Value,
        budget: &PollBudget,
        on_update: &ProgressCallback<'_>,
    ) -> Result<JobResult, BridgeError> {
        let handle = self.submit(model, input).await?;
        tracing::info!(request_id = %handle.id, model, "Submitted fal request");

        let source = FalStatus {
            client: self,
            handle: &handle,
            on_update,
            logs_seen: AtomicUsize::new(0),
        };
        let outcome = poll_until_terminal(&source, budget).await?;

        let document = self.result(&handle).await?;
        Ok(JobResult {
            job_id: handle.id,
            artifact: Artifact::Document(document),
            attempts: outcome.attempts,
        })
    }
}

/// [`StatusSource`] adapter for one fal request.
struct FalStatus<'a> {
    client: &'a FalClient,
    handle: &'a JobHandle,
    on_update: &'a ProgressCallback<'a>,
    logs_seen: AtomicUsize,
}

#[async_trait]
impl StatusSource for FalStatus<'_> {
    type Output = ();

    async fn check(&self) -> Result<PollStatus<()>, BridgeError> {
        let body = self.client.status(self.handle).await?;

        let logs: Vec<String> = body
            .logs
            .unwrap_or_default()
            .into_iter()
            .map(|l| l.message)
            .collect();
        let seen = self.logs_seen.swap(logs.len(), Ordering::SeqCst);
        let new_logs = logs.into_iter().skip(seen).collect();

        (self.on_update)(&QueueUpdate {
            request_id: self.handle.id.clone(),
            status: body.status.clone(),
            queue_position: body.queue_position,
            new_logs,
        });

        Ok(match classify_fal_status(&body.status) {
            StatusClass::Ready => match body.error {
                Some(error) => PollStatus::Failed(error),
                None => PollStatus::Ready(()),
            },
            StatusClass::Pending => PollStatus::Pending {
                detail: body.status,
            },
            StatusClass::Failed => PollStatus::Failed(format!(
                "{}: {}",
                body.status,
                body.error.unwrap_or_else(|| "no details".to_string())
            )),
        })
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input for [`LORA_GENERATION_MODEL`]: one portrait image with the given LoRA.
pub fn lora_generation_input(prompt: &str, lora_path: &str) -> serde_json::Value {
    json!({
        "prompt": prompt,
        "loras": [{ "path": lora_path, "scale": 1 }],
        "image_size": "portrait_4_3",
        "num_images": 1,
        "output_format": "jpeg",
        "enable_safety_checker": true,
    })
}

/// Input for [`LORA_TRAINING_MODEL`].
pub fn training_input(images_data_url: &str, trigger_word: &str) -> serde_json::Value {
    json!({
        "images_data_url": images_data_url,
        "trigger_word": trigger_word,
        "create_masks": true,
    })
}
