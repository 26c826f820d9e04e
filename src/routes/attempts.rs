use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use validator::Validate;

use crate::dto::attempt_dto::{
    RecordAnswerRequest, RecordAnswerResponse, RecordResultRequest, SectionProgressRequest,
    StartAttemptRequest,
};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse> {
    req.validate()?;
    let user_id = claims.user_id()?;
    let detail = state.attempt_service.start_attempt(user_id, req.test_id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let user_id = claims.user_id()?;
    let attempts = state.attempt_service.list_attempts(user_id).await?;
    Ok(Json(attempts))
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let user_id = claims.user_id()?;
    let detail = state.attempt_service.get_attempt(user_id, attempt_id).await?;
    Ok(Json(detail))
}

#[axum::debug_handler]
pub async fn update_section_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(section_attempt_id): Path<i64>,
    Json(req): Json<SectionProgressRequest>,
) -> Result<impl IntoResponse> {
    req.validate()?;
    let user_id = claims.user_id()?;
    let updated = state
        .attempt_service
        .update_section_progress(user_id, section_attempt_id, &req)
        .await?;
    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn restart_section(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(section_attempt_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let user_id = claims.user_id()?;
    let retake = state
        .attempt_service
        .restart_section(user_id, section_attempt_id)
        .await?;
    Ok((StatusCode::CREATED, Json(retake)))
}

#[axum::debug_handler]
pub async fn record_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(section_attempt_id): Path<i64>,
    Json(req): Json<RecordAnswerRequest>,
) -> Result<impl IntoResponse> {
    req.validate()?;
    let user_id = claims.user_id()?;
    let answer = state
        .attempt_service
        .record_answer(user_id, section_attempt_id, &req)
        .await?;
    // Correctness stays server-side while the section is live; the client
    // only gets an acknowledgement.
    Ok(Json(RecordAnswerResponse {
        saved: true,
        question_id: answer.question_id,
        marked_for_review: answer.marked_for_review,
        answered_at: answer.answered_at,
    }))
}

#[axum::debug_handler]
pub async fn record_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<RecordResultRequest>,
) -> Result<impl IntoResponse> {
    let user_id = claims.user_id()?;
    let updated = state
        .attempt_service
        .record_result(user_id, attempt_id, &req)
        .await?;
    Ok(Json(updated))
}
