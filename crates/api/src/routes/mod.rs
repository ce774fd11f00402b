pub mod finetune;
pub mod headshot;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the API route tree.
///
/// Route hierarchy:
///
/// ```text
/// /headshot                          v1 or v2, chosen by the `path` field
/// /v1/headshot                       single-photo headshot (BFL Kontext)
/// /v2/headshot                       headshot from a trained LoRA (fal)
///
/// /finetune                          train a LoRA from 3-20 photos (fal)
/// /generate-finetuned-image          submit a finetuned generation (BFL)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(headshot::router())
        .merge(finetune::router())
}
