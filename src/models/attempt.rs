use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestAttempt {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub is_completed: bool,
    pub total_score: Option<Decimal>,
    pub passed: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SectionAttempt {
    pub id: i64,
    pub test_attempt_id: i64,
    pub section_id: i64,
    pub status: String,
    pub score: Option<Decimal>,
    pub correct_answers: Option<i32>,
    pub question_count: i32,
    pub time_remaining_seconds: i32,
    pub attempt_number: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SectionAttempt {
    pub fn parsed_status(&self) -> Option<SectionStatus> {
        SectionStatus::parse(&self.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.parsed_status().map(|s| s.is_terminal()).unwrap_or(false)
    }
}

/// Section progress states. `Completed` and `Abandoned` are terminal:
/// nothing transitions out of them, and a terminal row must never be
/// mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    NotStarted,
    InProgress,
    Paused,
    Completed,
    Abandoned,
}

impl SectionStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "not_started" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Legal transitions:
    /// not_started -> in_progress -> {paused <-> in_progress} -> {completed | abandoned}
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::NotStarted, Self::InProgress) => true,
            (Self::NotStarted, Self::Abandoned) => true,
            (Self::InProgress, Self::Paused) => true,
            (Self::InProgress, Self::Completed) => true,
            (Self::InProgress, Self::Abandoned) => true,
            (Self::Paused, Self::InProgress) => true,
            (Self::Paused, Self::Completed) => true,
            (Self::Paused, Self::Abandoned) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
