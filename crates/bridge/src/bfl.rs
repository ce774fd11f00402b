//! REST client for the Black Forest Labs (BFL) image API.
//!
//! Jobs are submitted with `POST {base}/v1/{endpoint}` and an `x-key`
//! header. The response carries a `polling_url` that is queried with
//! `GET` until the job reports `Ready` (artifact in `result.sample`), a
//! failure status, or the caller's attempt budget runs out.

use async_trait::async_trait;
use base64::Engine;
use headshot_core::generation::{FinetunedGenerationParams, GenerationRequest, ImageSource};
use headshot_core::job::{Artifact, JobHandle, JobResult};
use headshot_core::polling::{classify_bfl_status, PollBudget, PollStatus, StatusClass};
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::poll::{poll_until_terminal, StatusSource};

pub const DEFAULT_BFL_BASE_URL: &str = "https://api.bfl.ai";

/// Image-editing endpoint used for single-photo headshots.
pub const KONTEXT_ENDPOINT: &str = "flux-kontext-pro";

const PROVIDER: &str = "BFL";

/// HTTP client for the BFL API.
pub struct BflClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// Body returned by a successful submission.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: Option<String>,
    polling_url: Option<String>,
}

/// Body returned by the polling URL.
#[derive(Debug, Deserialize)]
struct ResultResponse {
    /// Absent while the job is still being registered; treated as pending.
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

impl BflClient {
    /// Create a client for `base_url` (e.g. [`DEFAULT_BFL_BASE_URL`]).
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_key, base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit a job and return the provider's response body unchanged.
    ///
    /// Used where the caller relays the submission (job id + polling URL)
    /// instead of waiting for the job.
    pub async fn submit_raw<T>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<serde_json::Value, BridgeError>
    where
        T: Serialize + ?Sized,
    {
        let url = format!("{}/v1/{}", self.base_url, endpoint.trim_start_matches('/'));
        tracing::debug!(%url, "Submitting BFL job");

        let response = self
            .client
            .post(url)
            .header("accept", "application/json")
            .header("x-key", &self.api_key)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BridgeError::from_response(PROVIDER, response).await);
        }
        Ok(response.json().await?)
    }

    /// Submit a job and extract its [`JobHandle`].
    ///
    /// A 2xx response without a `polling_url` is reported as
    /// [`BridgeError::MalformedResponse`].
    pub async fn submit<T>(&self, endpoint: &str, payload: &T) -> Result<JobHandle, BridgeError>
    where
        T: Serialize + ?Sized,
    {
        let body = self.submit_raw(endpoint, payload).await?;
        handle_from_submission(body)
    }

    /// Submit a finetuned generation to `params.endpoint` without waiting.
    ///
    /// Parameters are validated first; invalid ones never reach the network.
    pub async fn submit_finetuned(
        &self,
        params: &FinetunedGenerationParams,
    ) -> Result<serde_json::Value, BridgeError> {
        params.validate()?;
        tracing::info!(
            endpoint = %params.endpoint,
            finetune_id = %params.finetune_id,
            "Submitting finetuned generation",
        );
        self.submit_raw(&params.endpoint, params).await
    }

    /// Perform one status check against the job's polling URL.
    pub async fn check(&self, handle: &JobHandle) -> Result<PollStatus<String>, BridgeError> {
        let response = self
            .client
            .get(&handle.status_url)
            .header("accept", "application/json")
            .header("x-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BridgeError::from_response("BFL polling", response).await);
        }

        let body: ResultResponse = response.json().await?;
        interpret_result(body)
    }

    /// Poll the job until it settles or `budget` runs out.
    pub async fn poll(
        &self,
        handle: &JobHandle,
        budget: &PollBudget,
    ) -> Result<JobResult, BridgeError> {
        let source = BflStatus {
            client: self,
            handle,
        };
        let outcome = poll_until_terminal(&source, budget).await?;

        Ok(JobResult {
            job_id: handle.id.clone(),
            artifact: Artifact::Url(outcome.value),
            attempts: outcome.attempts,
        })
    }
}

/// [`StatusSource`] adapter for one BFL job.
struct BflStatus<'a> {
    client: &'a BflClient,
    handle: &'a JobHandle,
}

#[async_trait]
impl StatusSource for BflStatus<'_> {
    type Output = String;

    async fn check(&self) -> Result<PollStatus<String>, BridgeError> {
        self.client.check(self.handle).await
    }
}

fn handle_from_submission(body: serde_json::Value) -> Result<JobHandle, BridgeError> {
    let parsed: SubmitResponse =
        serde_json::from_value(body).map_err(|e| BridgeError::MalformedResponse {
            provider: PROVIDER,
            detail: e.to_string(),
        })?;

    let status_url = parsed
        .polling_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| BridgeError::MalformedResponse {
            provider: PROVIDER,
            detail: "No polling_url from BFL API".to_string(),
        })?;

    Ok(JobHandle {
        id: parsed.id.unwrap_or_default(),
        status_url,
        result_url: None,
    })
}

fn interpret_result(body: ResultResponse) -> Result<PollStatus<String>, BridgeError> {
    let Some(status) = body.status else {
        return Ok(PollStatus::Pending {
            detail: "<no status>".to_string(),
        });
    };
    match classify_bfl_status(&status) {
        StatusClass::Pending => Ok(PollStatus::Pending { detail: status }),
        StatusClass::Failed => {
            let detail = body
                .result
                .map(|r| r.to_string())
                .unwrap_or_else(|| "no details".to_string());
            Ok(PollStatus::Failed(format!("{status}: {detail}")))
        }
        StatusClass::Ready => {
            let sample = body
                .result
                .as_ref()
                .and_then(|r| r.get("sample"))
                .and_then(|s| s.as_str())
                .ok_or_else(|| BridgeError::MalformedResponse {
                    provider: PROVIDER,
                    detail: "Ready status but no result sample".to_string(),
                })?;
            Ok(PollStatus::Ready(sample.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Base64-encode raw image bytes the way BFL expects them in `input_image`.
pub fn encode_image(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Request body for the Kontext image-editing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KontextPayload {
    pub prompt: String,
    pub aspect_ratio: String,
    pub output_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

impl From<&GenerationRequest> for KontextPayload {
    fn from(req: &GenerationRequest) -> Self {
        let input_image = req.source.as_ref().map(|source| match source {
            ImageSource::Bytes(bytes) => encode_image(bytes),
            ImageSource::Url(url) => url.clone(),
        });

        Self {
            prompt: req.prompt.clone(),
            aspect_ratio: req.aspect_ratio.clone(),
            output_format: req.output_format.clone(),
            input_image,
            negative_prompt: req.negative_prompt.clone(),
        }
    }
}
