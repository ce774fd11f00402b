#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use httpmock::MockServer;
use tempfile::TempDir;
use tower::ServiceExt;

use headshot_api::config::{ProviderConfig, ServerConfig};
use headshot_api::router::build_app_router;
use headshot_api::state::AppState;
use headshot_core::polling::PollBudget;

/// Poll attempts allowed per BFL job in tests.
pub const POLL_ATTEMPTS: u32 = 3;

/// Fake upstream services plus a private staging root for one test.
pub struct Providers {
    pub bfl: MockServer,
    pub fal: MockServer,
    pub upload: MockServer,
    pub staging: TempDir,
}

impl Providers {
    pub async fn start() -> Self {
        Self {
            bfl: MockServer::start_async().await,
            fal: MockServer::start_async().await,
            upload: MockServer::start_async().await,
            staging: tempfile::tempdir().expect("staging root"),
        }
    }

    /// Entries left in the staging root.
    pub fn staged_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.staging.path())
            .expect("read staging root")
            .map(|e| e.expect("dir entry").path())
            .collect()
    }
}

/// Build a test `ServerConfig` pointing every provider at its mock server.
///
/// Budgets use a 1 ms interval so polling tests finish immediately.
pub fn test_config(providers: &Providers) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 10 * 1024 * 1024,
        staging_dir: providers.staging.path().to_path_buf(),
        providers: ProviderConfig {
            bfl_api_key: "test-bfl-key".to_string(),
            bfl_base_url: providers.bfl.base_url(),
            fal_key: "test-fal-key".to_string(),
            fal_queue_url: providers.fal.base_url(),
            fal_lora_model: "fal-ai/flux-lora".to_string(),
            fal_training_model: "fal-ai/flux-lora-fast-training".to_string(),
            upload_url: providers.upload.url("/api/v1/upload"),
            poll: PollBudget::new(POLL_ATTEMPTS, Duration::from_millis(1)),
            subscribe: PollBudget::new(5, Duration::from_millis(1)),
        },
    }
}

/// Build the full application router exactly as `main.rs` does.
pub fn build_test_app(providers: &Providers) -> Router {
    build_test_app_with(test_config(providers))
}

/// Build the router from a config adjusted by the test.
pub fn build_test_app_with(config: ServerConfig) -> Router {
    let state = AppState::from_config(config.clone()).expect("http client");
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "headshot-test-boundary";

/// Hand-assembled `multipart/form-data` body.
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Add `count` small images named `photo_NN.<ext>` under `files`.
    pub fn photos(self, count: usize, ext: &str) -> Self {
        (0..count).fold(self, |form, i| {
            form.file("files", &format!("photo_{i:02}.{ext}"), b"\xff\xd8\xff\xe0jpeg")
        })
    }

    fn into_body(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// POST a multipart form to `uri`.
pub async fn post_form(app: Router, uri: &str, form: Form) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(form.into_body()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// GET `uri`.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
