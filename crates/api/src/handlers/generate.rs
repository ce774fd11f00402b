//! Handler for finetuned image generation on BFL.
//!
//! The submission is relayed as-is (job id + polling URL); callers poll
//! themselves or receive the configured webhook.

use axum::extract::{Multipart, State};
use axum::Json;
use headshot_bridge::bfl::encode_image;
use headshot_core::error::CoreError;
use headshot_core::generation::FinetunedGenerationParams;

use crate::error::AppResult;
use crate::handlers::form::FormData;
use crate::state::AppState;

/// POST /generate-finetuned-image
pub async fn generate_finetuned_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let mut form = FormData::read(multipart).await?;
    let params = params_from_form(&mut form)?;

    let body = state.bfl.submit_finetuned(&params).await?;
    Ok(Json(body))
}

fn params_from_form(form: &mut FormData) -> Result<FinetunedGenerationParams, CoreError> {
    let finetune_id = form
        .text("finetune_id")
        .ok_or_else(|| CoreError::Validation("finetune_id is required".to_string()))?;
    let prompt = form
        .text("prompt")
        .ok_or_else(|| CoreError::Validation("prompt is required".to_string()))?;

    let mut params = FinetunedGenerationParams::new(finetune_id, prompt);
    if let Some(endpoint) = form.text("endpoint") {
        params.endpoint = endpoint.to_string();
    }
    if let Some(strength) = form.parse("finetune_strength")? {
        params.finetune_strength = strength;
    }
    params.steps = form.parse("steps")?;
    params.guidance = form.parse("guidance")?;
    params.aspect_ratio = form.text("aspect_ratio").map(str::to_string);
    params.seed = form.parse("seed")?;
    if let Some(tolerance) = form.parse("safety_tolerance")? {
        params.safety_tolerance = tolerance;
    }
    if let Some(format) = form.text("output_format") {
        params.output_format = format.to_string();
    }
    params.raw = form.parse("raw")?;
    params.image_prompt_strength = form.parse("image_prompt_strength")?;
    params.webhook_url = form.text("webhook_url").map(str::to_string);
    params.webhook_secret = form.text("webhook_secret").map(str::to_string);
    params.image_prompt = form.take_file("image_prompt").map(|f| encode_image(&f.bytes));

    params.validate()?;
    Ok(params)
}
