use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StartAttemptRequest {
    #[validate(range(min = 1))]
    pub test_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordAnswerRequest {
    #[validate(range(min = 1))]
    pub question_id: i64,
    /// None clears the selection; the answer row stays, marked incorrect.
    pub selected_option_id: Option<i64>,
    pub marked_for_review: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordAnswerResponse {
    pub saved: bool,
    pub question_id: i64,
    pub marked_for_review: bool,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SectionProgressRequest {
    /// Target status in storage form, e.g. "in_progress" or "completed".
    pub status: Option<String>,
    /// Remaining time budget pushed by the client-side timer.
    #[validate(range(min = 0))]
    pub time_remaining_seconds: Option<i32>,
    /// Section score supplied by the scoring collaborator; only applied on
    /// the transition to completed.
    pub score: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResultRequest {
    pub total_score: Option<Decimal>,
    pub passed: Option<bool>,
}
