//! Handlers for headshot generation.
//!
//! v1 edits one uploaded photo (or image URL) with BFL Kontext and waits for
//! the result URL. v2 renders from a LoRA trained by `/finetune` and relays
//! the provider's result document.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use headshot_bridge::bfl::KontextPayload;
use headshot_bridge::fal::lora_generation_input;
use headshot_core::error::CoreError;
use headshot_core::generation::{resolve_image_source, GenerationRequest};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::handlers::form::FormData;
use crate::handlers::run_detached;
use crate::state::AppState;

/// Response of a v1 headshot.
#[derive(Debug, Serialize)]
pub struct HeadshotResult {
    pub result_url: String,
}

/// POST /headshot
///
/// A form with a `path` field (LoRA URL) is a v2 request; anything else is v1.
pub async fn create_headshot(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let form = FormData::read(multipart).await?;
    if form.text("path").is_some() {
        lora_headshot(&state, form).await
    } else {
        let result = kontext_headshot(&state, form).await?;
        serde_json::to_value(result)
            .map(Json)
            .map_err(|e| AppError::InternalError(e.to_string()))
    }
}

/// POST /v1/headshot
pub async fn create_headshot_v1(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<HeadshotResult>> {
    let form = FormData::read(multipart).await?;
    kontext_headshot(&state, form).await.map(Json)
}

/// POST /v2/headshot
pub async fn create_headshot_v2(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let form = FormData::read(multipart).await?;
    lora_headshot(&state, form).await
}

async fn kontext_headshot(state: &AppState, mut form: FormData) -> AppResult<HeadshotResult> {
    let file = form.take_file("file").map(|f| f.bytes);
    let image_url = form.text("image_url").map(str::to_string);
    let source = resolve_image_source(file, image_url)?;

    let request = GenerationRequest::headshot(form.text("prompt").map(str::to_string), Some(source));
    let payload = serde_json::to_value(KontextPayload::from(&request))
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    let bridge = Arc::clone(&state.headshot);
    let result =
        run_detached(async move { bridge.run(payload).await.map_err(AppError::from) }).await?;
    let result_url = result
        .artifact
        .as_url()
        .ok_or_else(|| AppError::InternalError("Kontext job produced no image URL".to_string()))?
        .to_string();

    tracing::info!(job_id = %result.job_id, attempts = result.attempts, "Headshot ready");
    Ok(HeadshotResult { result_url })
}

async fn lora_headshot(state: &AppState, form: FormData) -> AppResult<Json<serde_json::Value>> {
    let lora_path = form
        .text("path")
        .ok_or_else(|| CoreError::Validation("path is required".to_string()))?;
    let prompt = GenerationRequest::headshot(form.text("prompt").map(str::to_string), None).prompt;

    let input = lora_generation_input(&prompt, lora_path);
    let bridge = Arc::clone(&state.lora_headshot);
    let result =
        run_detached(async move { bridge.run(input).await.map_err(AppError::from) }).await?;

    tracing::info!(job_id = %result.job_id, attempts = result.attempts, "LoRA headshot ready");
    Ok(Json(result.artifact.into_json()))
}
