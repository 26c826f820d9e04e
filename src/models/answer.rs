use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recorded selection for one question within a section attempt.
/// Unique per (section_attempt_id, question_id): re-answering replaces the
/// row. `is_correct` is a write-time snapshot against the question's
/// designated correct option; catalog edits made later never rewrite it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserAnswer {
    pub id: i64,
    pub section_attempt_id: i64,
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    pub is_correct: bool,
    pub marked_for_review: bool,
    pub answered_at: DateTime<Utc>,
}
