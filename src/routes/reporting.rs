use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::dto::reporting_dto::{FunnelQuery, FunnelRow, HeatmapSnapshot};
use crate::error::Result;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/admin/reports/login-heatmap",
    responses(
        (status = 200, description = "7x12 login activity matrix", body = Json<HeatmapSnapshot>),
        (status = 403, description = "Caller is not an operator")
    )
)]
#[axum::debug_handler]
pub async fn login_heatmap(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let snapshot = state.reporting_service.login_heatmap().await?;
    Ok(Json(snapshot))
}

#[axum::debug_handler]
pub async fn reset_login_heatmap(State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.reporting_service.reset_login_heatmap().await?;
    Ok(Json(serde_json::json!({ "reset": true })))
}

#[utoipa::path(
    get,
    path = "/api/admin/reports/test-funnel",
    params(
        ("from" = Option<String>, Query, description = "Window start, YYYY-MM-DD, inclusive"),
        ("to" = Option<String>, Query, description = "Window end, YYYY-MM-DD, inclusive"),
        ("level" = Option<String>, Query, description = "Filter by proficiency level"),
        ("limit" = Option<i64>, Query, description = "Max rows, default 20")
    ),
    responses(
        (status = 200, description = "Per-test conversion metrics", body = Json<Vec<FunnelRow>>),
        (status = 400, description = "Malformed window")
    )
)]
#[axum::debug_handler]
pub async fn test_funnel(
    State(state): State<AppState>,
    Query(query): Query<FunnelQuery>,
) -> Result<impl IntoResponse> {
    let rows = state.reporting_service.test_funnel(&query).await?;
    Ok(Json(rows))
}
