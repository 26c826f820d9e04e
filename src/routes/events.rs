use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;

use crate::middleware::auth::Claims;
use crate::AppState;

/// Login activity intake. The heatmap increment runs on a detached task:
/// the caller gets its 202 immediately and a storage failure on the
/// aggregation side can only ever show up in the logs, never here.
#[axum::debug_handler]
pub async fn login_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    let user_id = claims.sub.clone();
    let heatmap = state.heatmap_service.clone();
    let ts = crate::utils::time::now();

    tokio::spawn(async move {
        tracing::debug!(%user_id, "recording login activity");
        heatmap.track_login(ts).await;
    });

    (StatusCode::ACCEPTED, Json(json!({ "accepted": true })))
}
