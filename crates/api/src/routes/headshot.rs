//! Route definitions for headshot generation.

use axum::routing::post;
use axum::Router;

use crate::handlers::headshot;
use crate::state::AppState;

/// ```text
/// POST   /headshot         -> create_headshot     (multipart, dispatches on `path`)
/// POST   /v1/headshot      -> create_headshot_v1  (multipart)
/// POST   /v2/headshot      -> create_headshot_v2  (multipart)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/headshot", post(headshot::create_headshot))
        .route("/v1/headshot", post(headshot::create_headshot_v1))
        .route("/v2/headshot", post(headshot::create_headshot_v2))
}
