//! Integration tests for `/finetune`: validation, the zip-and-upload
//! pipeline, the training subscribe cycle and staging cleanup.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, post_form, Form, Providers};
use headshot_core::polling::PollBudget;
use httpmock::Method::{GET, POST};
use httpmock::Mock;
use serde_json::json;

const TRAINING: &str = "/fal-ai/flux-lora-fast-training";

async fn mock_upload_success(providers: &Providers) -> Mock<'_> {
    providers
        .upload
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/upload")
                .body_includes("training_images.zip");
            then.status(200).json_body(json!({
                "status": "success",
                "data": {"url": "http://tmpfiles.org/777/training_images.zip"}
            }));
        })
        .await
}

/// Mock a training run that completes on its first status check.
async fn mock_training_success(providers: &Providers) -> Mock<'_> {
    let submit = providers
        .fal
        .mock_async(|when, then| {
            when.method(POST)
                .path(TRAINING)
                .body_includes("\"images_data_url\":\"https://tmpfiles.org/dl/777/training_images.zip\"")
                .body_includes("\"trigger_word\":\"ALEX\"");
            then.status(200).json_body(json!({"request_id": "train-1"}));
        })
        .await;
    providers
        .fal
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("{TRAINING}/requests/train-1/status"));
            then.status(200).json_body(json!({
                "status": "COMPLETED",
                "logs": [{"message": "step 1000/1000"}]
            }));
        })
        .await;
    providers
        .fal
        .mock_async(|when, then| {
            when.method(GET).path(format!("{TRAINING}/requests/train-1"));
            then.status(200).json_body(json!({
                "diffusers_lora_file": {"url": "https://fal.test/lora.safetensors"},
                "config_file": {"url": "https://fal.test/config.json"}
            }));
        })
        .await;
    submit
}

// ---------------------------------------------------------------------------
// Test: fewer than 3 images is a 400 before any upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn too_few_images_returns_400() {
    let providers = Providers::start().await;
    let upload = mock_upload_success(&providers).await;
    let app = common::build_test_app(&providers);

    let response = post_form(app, "/finetune", Form::new().photos(2, "jpg")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    upload.assert_calls_async(0).await;
    assert!(providers.staged_entries().is_empty());
}

// ---------------------------------------------------------------------------
// Test: more than 20 images is a 400 before any upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn too_many_images_returns_400() {
    let providers = Providers::start().await;
    let upload = mock_upload_success(&providers).await;
    let app = common::build_test_app(&providers);

    let response = post_form(app, "/finetune", Form::new().photos(21, "png")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    upload.assert_calls_async(0).await;
}

// ---------------------------------------------------------------------------
// Test: an unsupported extension is rejected before any network call
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unsupported_extension_returns_400() {
    let providers = Providers::start().await;
    let upload = mock_upload_success(&providers).await;
    let training = mock_training_success(&providers).await;
    let app = common::build_test_app(&providers);

    let form = Form::new()
        .photos(3, "JPG")
        .file("files", "animation.gif", b"GIF89a");
    let response = post_form(app, "/finetune", form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("animation.gif"));
    upload.assert_calls_async(0).await;
    training.assert_calls_async(0).await;
    assert!(providers.staged_entries().is_empty());
}

// ---------------------------------------------------------------------------
// Test: a full run uploads, trains, relays the result and cleans up
// ---------------------------------------------------------------------------

#[tokio::test]
async fn training_succeeds_and_cleans_staging() {
    let providers = Providers::start().await;
    let upload = mock_upload_success(&providers).await;
    let training = mock_training_success(&providers).await;
    let app = common::build_test_app(&providers);

    let form = Form::new().photos(5, "jpeg").text("trigger_word", "ALEX");
    let response = post_form(app, "/finetune", form).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "success");
    assert!(json["message"].as_str().unwrap().contains("ALEX"));
    assert_eq!(
        json["result"]["diffusers_lora_file"]["url"],
        "https://fal.test/lora.safetensors"
    );
    upload.assert_async().await;
    training.assert_async().await;
    assert!(providers.staged_entries().is_empty());
}

// ---------------------------------------------------------------------------
// Test: an upload rejection is relayed and staging is still removed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_failure_cleans_staging() {
    let providers = Providers::start().await;
    providers
        .upload
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/upload");
            then.status(503).body("Service Unavailable");
        })
        .await;
    let training = mock_training_success(&providers).await;
    let app = common::build_test_app(&providers);

    let form = Form::new().photos(3, "jpg").text("trigger_word", "ALEX");
    let response = post_form(app, "/finetune", form).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PROVIDER_ERROR");
    assert_eq!(json["error"], "Upload host API error: Service Unavailable");
    training.assert_calls_async(0).await;
    assert!(providers.staged_entries().is_empty());
}

// ---------------------------------------------------------------------------
// Test: a failed training run is relayed and staging is still removed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn training_failure_cleans_staging() {
    let providers = Providers::start().await;
    mock_upload_success(&providers).await;
    providers
        .fal
        .mock_async(|when, then| {
            when.method(POST).path(TRAINING);
            then.status(200).json_body(json!({"request_id": "train-2"}));
        })
        .await;
    providers
        .fal
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("{TRAINING}/requests/train-2/status"));
            then.status(200)
                .json_body(json!({"status": "FAILED", "error": "Not enough faces detected"}));
        })
        .await;
    let app = common::build_test_app(&providers);

    let response = post_form(app, "/finetune", Form::new().photos(4, "png")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "GENERATION_FAILED");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("Not enough faces detected"));
    assert!(providers.staged_entries().is_empty());
}

// ---------------------------------------------------------------------------
// Test: the default trigger word is used when none is sent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_trigger_word_is_sent() {
    let providers = Providers::start().await;
    mock_upload_success(&providers).await;
    let submit = providers
        .fal
        .mock_async(|when, then| {
            when.method(POST)
                .path(TRAINING)
                .body_includes("\"trigger_word\":\"TOK\"")
                .body_includes("\"create_masks\":true");
            then.status(200).json_body(json!({"request_id": "train-3"}));
        })
        .await;
    providers
        .fal
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("{TRAINING}/requests/train-3/status"));
            then.status(200).json_body(json!({"status": "COMPLETED"}));
        })
        .await;
    providers
        .fal
        .mock_async(|when, then| {
            when.method(GET).path(format!("{TRAINING}/requests/train-3"));
            then.status(200).json_body(json!({"diffusers_lora_file": {"url": "u"}}));
        })
        .await;
    let app = common::build_test_app(&providers);

    let response = post_form(app, "/finetune", Form::new().photos(3, "jpg")).await;

    assert_eq!(response.status(), StatusCode::OK);
    submit.assert_async().await;
}

// ---------------------------------------------------------------------------
// Test: an abandoned request still finishes training and cleans staging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn abandoned_request_finishes_and_cleans_staging() {
    let providers = Providers::start().await;
    mock_upload_success(&providers).await;
    providers
        .fal
        .mock_async(|when, then| {
            when.method(POST).path(TRAINING);
            then.status(200).json_body(json!({"request_id": "train-4"}));
        })
        .await;
    let status = providers
        .fal
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("{TRAINING}/requests/train-4/status"));
            then.status(200).json_body(json!({"status": "IN_PROGRESS"}));
        })
        .await;
    let mut config = common::test_config(&providers);
    config.providers.subscribe = PollBudget::new(20, Duration::from_millis(20));
    let app = common::build_test_app_with(config);

    let form = Form::new().photos(3, "jpg").text("trigger_word", "ALEX");
    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), post_form(app, "/finetune", form)).await;
    assert!(abandoned.is_err(), "request should still be waiting");

    tokio::time::sleep(Duration::from_millis(800)).await;
    status.assert_calls_async(20).await;
    assert!(providers.staged_entries().is_empty());
}

// ---------------------------------------------------------------------------
// Test: a filesystem failure while staging is a sanitised 500
// ---------------------------------------------------------------------------

#[tokio::test]
async fn staging_io_failure_returns_internal_error() {
    let providers = Providers::start().await;
    let upload = mock_upload_success(&providers).await;
    let training = mock_training_success(&providers).await;

    // A regular file where the staging root should be makes every write fail.
    let blocker = providers.staging.path().join("not-a-directory");
    std::fs::write(&blocker, b"").unwrap();
    let mut config = common::test_config(&providers);
    config.staging_dir = blocker.clone();
    let app = common::build_test_app_with(config);

    let form = Form::new().photos(3, "jpg").text("trigger_word", "ALEX");
    let response = post_form(app, "/finetune", form).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
    upload.assert_calls_async(0).await;
    training.assert_calls_async(0).await;
    assert_eq!(providers.staged_entries(), vec![blocker]);
}
