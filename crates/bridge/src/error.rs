use headshot_core::error::CoreError;

/// Errors from submitting to, polling, or uploading to an external provider.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The HTTP request itself failed (network, DNS, TLS, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("{provider} API error ({status}): {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        /// Raw response body, relayed to the caller.
        body: String,
    },

    /// A 2xx response that lacks a field the bridge needs.
    #[error("Malformed {provider} response: {detail}")]
    MalformedResponse {
        provider: &'static str,
        detail: String,
    },

    /// The provider reported the job as failed.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The attempt budget ran out before the job settled.
    #[error("Timeout waiting for result after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A job lifecycle invariant was violated.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl BridgeError {
    /// Read the body of a non-2xx response into a [`BridgeError::Provider`].
    pub(crate) async fn from_response(provider: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        BridgeError::Provider {
            provider,
            status,
            body,
        }
    }
}
