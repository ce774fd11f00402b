//! Route definitions for LoRA training and finetuned generation.

use axum::routing::post;
use axum::Router;

use crate::handlers::{finetune, generate};
use crate::state::AppState;

/// ```text
/// POST   /finetune                  -> create_finetune            (multipart)
/// POST   /generate-finetuned-image  -> generate_finetuned_image   (multipart)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/finetune", post(finetune::create_finetune))
        .route(
            "/generate-finetuned-image",
            post(generate::generate_finetuned_image),
        )
}
