use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use headshot_bridge::BridgeError;
use headshot_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for validation failures and [`BridgeError`] for
/// everything that happens against an external provider. Implements
/// [`IntoResponse`] to produce consistent `{"error", "code"}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `headshot_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A provider, polling or upload error from `headshot_bridge`.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type Classified = (StatusCode, &'static str, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Bridge(bridge) => classify_bridge_error(bridge),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> Classified {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> Classified {
    match err {
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        other => {
            tracing::error!(error = %other, "Internal core error");
            internal()
        }
    }
}

/// Provider failures keep their raw text; transport and filesystem failures
/// are logged and replaced with a generic message.
fn classify_bridge_error(err: &BridgeError) -> Classified {
    match err {
        BridgeError::Provider { provider, body, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "PROVIDER_ERROR",
            format!("{provider} API error: {body}"),
        ),
        BridgeError::MalformedResponse { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "PROVIDER_ERROR",
            err.to_string(),
        ),
        BridgeError::GenerationFailed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "GENERATION_FAILED",
            err.to_string(),
        ),
        BridgeError::Timeout { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "TIMEOUT", err.to_string())
        }
        BridgeError::Core(core) => classify_core_error(core),
        other => {
            tracing::error!(error = %other, "Provider bridge error");
            internal()
        }
    }
}
