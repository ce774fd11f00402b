//! Handler for LoRA training.
//!
//! Uploaded photos are validated, staged in a request-scoped directory,
//! zipped, pushed to the temporary file host, and handed to the trainer by
//! URL. The pipeline runs on its own task, so it finishes (and removes its
//! staging directory) even if the client goes away first.

use axum::extract::{Multipart, State};
use axum::Json;
use headshot_bridge::fal::training_input;
use headshot_bridge::staging::{StagingArea, TrainingUpload};
use headshot_core::finetune::{normalize_trigger_word, validate_training_files};
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::form::FormData;
use crate::handlers::run_detached;
use crate::state::AppState;

/// Response of a completed training run.
#[derive(Debug, Serialize)]
pub struct FinetuneResult {
    pub status: &'static str,
    pub message: String,
    /// Trainer output, including `diffusers_lora_file.url`.
    pub result: serde_json::Value,
}

/// POST /finetune
///
/// Train a LoRA from 3-20 `files` (jpg/jpeg/png) under `trigger_word`.
pub async fn create_finetune(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<FinetuneResult>> {
    let mut form = FormData::read(multipart).await?;
    let uploads = form.take_files("files");

    // Everything is checked before any file is written or request sent.
    let names: Vec<&str> = uploads.iter().map(|u| u.file_name.as_str()).collect();
    validate_training_files(&names)?;
    let trigger_word = normalize_trigger_word(form.text("trigger_word"))?;

    let mut staging = StagingArea::create(&state.config.staging_dir)?;
    let image_count = uploads.len();
    let word = trigger_word.clone();
    let result = run_detached(async move {
        let outcome = train(&state, &mut staging, &uploads, &word).await;
        staging.close();
        outcome
    })
    .await?;

    Ok(Json(FinetuneResult {
        status: "success",
        message: format!(
            "Training finished for {image_count} images with trigger word '{trigger_word}'"
        ),
        result,
    }))
}

async fn train(
    state: &AppState,
    staging: &mut StagingArea,
    uploads: &[TrainingUpload],
    trigger_word: &str,
) -> AppResult<serde_json::Value> {
    staging.stage(uploads).await?;
    let archive = staging.archive().await?;
    let images_url = state.uploader.upload(&archive).await?;

    let result = state
        .trainer
        .run(training_input(&images_url, trigger_word))
        .await?;

    tracing::info!(
        job_id = %result.job_id,
        attempts = result.attempts,
        images = uploads.len(),
        "LoRA training finished",
    );
    Ok(result.artifact.into_json())
}
