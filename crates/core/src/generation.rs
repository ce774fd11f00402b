//! Generation request types, defaults and parameter validation.
//!
//! [`GenerationRequest`] describes a single headshot generation (prompt plus
//! optional source image). [`FinetunedGenerationParams`] carries the knobs
//! accepted by the finetuned-model endpoints and is serialised directly as
//! the provider payload.

use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Headshot defaults
// ---------------------------------------------------------------------------

/// Prompt used when the caller does not supply one.
pub const DEFAULT_HEADSHOT_PROMPT: &str = "Professional headshot, studio lighting, business attire, \
     clean background, realistic, high quality";

/// Portrait framing for headshots.
pub const DEFAULT_ASPECT_RATIO: &str = "3:4";

pub const DEFAULT_OUTPUT_FORMAT: &str = "jpeg";

/// Defects every headshot generation steers away from.
pub const HEADSHOT_NEGATIVE_PROMPT: &str = "blurry, distorted face, poor lighting, low resolution, \
     cartoonish, painting, artistic style, hat, sunglasses, overexposed, underexposed, watermark, \
     background clutter, open mouth, extreme makeup";

/// Output formats the providers accept.
pub const VALID_OUTPUT_FORMATS: &[&str] = &["jpeg", "png"];

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// Where the source image for an edit comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Raw uploaded bytes; encoded before being sent upstream.
    Bytes(Vec<u8>),
    /// A publicly reachable image URL passed through verbatim.
    Url(String),
}

/// A single generation request, created per incoming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub source: Option<ImageSource>,
    pub negative_prompt: Option<String>,
    pub output_format: String,
    pub aspect_ratio: String,
}

impl GenerationRequest {
    /// Build a headshot request with the standard framing and negative prompt.
    ///
    /// An empty or missing prompt falls back to [`DEFAULT_HEADSHOT_PROMPT`].
    pub fn headshot(prompt: Option<String>, source: Option<ImageSource>) -> Self {
        let prompt = prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_HEADSHOT_PROMPT.to_string());

        Self {
            prompt,
            source,
            negative_prompt: Some(HEADSHOT_NEGATIVE_PROMPT.to_string()),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
        }
    }
}

/// Pick the source image for a headshot: an uploaded file wins over a URL.
///
/// Returns a validation error when neither is present.
pub fn resolve_image_source(
    file: Option<Vec<u8>>,
    image_url: Option<String>,
) -> Result<ImageSource, CoreError> {
    if let Some(bytes) = file.filter(|b| !b.is_empty()) {
        return Ok(ImageSource::Bytes(bytes));
    }
    match image_url.map(|u| u.trim().to_string()) {
        Some(url) if !url.is_empty() => Ok(ImageSource::Url(url)),
        _ => Err(CoreError::Validation(
            "Provide a file or image_url".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Finetuned generation
// ---------------------------------------------------------------------------

/// Highest-quality finetuned endpoint; used when none is requested.
pub const ENDPOINT_ULTRA_FINETUNED: &str = "flux-pro-1.1-ultra-finetuned";
/// Step/guidance controllable finetuned endpoint.
pub const ENDPOINT_PRO_FINETUNED: &str = "flux-pro-finetuned";

pub const VALID_FINETUNED_ENDPOINTS: &[&str] = &[ENDPOINT_ULTRA_FINETUNED, ENDPOINT_PRO_FINETUNED];

pub const DEFAULT_FINETUNE_STRENGTH: f64 = 1.2;
pub const DEFAULT_SAFETY_TOLERANCE: u8 = 2;

/// Parameters for a generation against a previously finetuned model.
///
/// Serialises to the provider's request body; the `endpoint` selects the URL
/// and is not part of the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinetunedGenerationParams {
    #[serde(skip)]
    pub endpoint: String,
    pub finetune_id: String,
    pub prompt: String,
    pub finetune_strength: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub safety_tolerance: u8,
    pub output_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
    /// Base64-encoded image used as a visual prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

impl FinetunedGenerationParams {
    /// Create parameters with provider defaults for everything optional.
    pub fn new(finetune_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            endpoint: ENDPOINT_ULTRA_FINETUNED.to_string(),
            finetune_id: finetune_id.into(),
            prompt: prompt.into(),
            finetune_strength: DEFAULT_FINETUNE_STRENGTH,
            steps: None,
            guidance: None,
            aspect_ratio: None,
            seed: None,
            safety_tolerance: DEFAULT_SAFETY_TOLERANCE,
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            raw: None,
            image_prompt: None,
            image_prompt_strength: None,
            webhook_url: None,
            webhook_secret: None,
        }
    }

    /// Check every field against the ranges the provider accepts.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.finetune_id.trim().is_empty() {
            return Err(CoreError::Validation("finetune_id is required".to_string()));
        }
        if self.prompt.trim().is_empty() {
            return Err(CoreError::Validation("prompt is required".to_string()));
        }
        if !VALID_FINETUNED_ENDPOINTS.contains(&self.endpoint.as_str()) {
            return Err(CoreError::Validation(format!(
                "Invalid endpoint '{}'. Must be one of: {}",
                self.endpoint,
                VALID_FINETUNED_ENDPOINTS.join(", ")
            )));
        }
        validate_range("finetune_strength", self.finetune_strength, 0.0, 2.0)?;
        if let Some(steps) = self.steps {
            validate_range("steps", f64::from(steps), 1.0, 50.0)?;
        }
        if let Some(guidance) = self.guidance {
            validate_range("guidance", guidance, 1.5, 5.0)?;
        }
        validate_range("safety_tolerance", f64::from(self.safety_tolerance), 0.0, 6.0)?;
        if let Some(strength) = self.image_prompt_strength {
            validate_range("image_prompt_strength", strength, 0.0, 1.0)?;
        }
        validate_output_format(&self.output_format)?;
        if let Some(url) = &self.webhook_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(CoreError::Validation(format!(
                    "webhook_url must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(())
    }
}

/// Validate that `format` is one of [`VALID_OUTPUT_FORMATS`].
pub fn validate_output_format(format: &str) -> Result<(), CoreError> {
    if VALID_OUTPUT_FORMATS.contains(&format) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid output_format '{format}'. Must be one of: {}",
            VALID_OUTPUT_FORMATS.join(", ")
        )))
    }
}

fn validate_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), CoreError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )))
    }
}
