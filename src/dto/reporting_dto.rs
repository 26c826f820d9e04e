use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapRowView {
    pub weekday_id: i16,
    pub weekday: String,
    /// 12 counters in bin display order 00-02 .. 22-24.
    pub counts: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapSnapshot {
    pub bins: Vec<String>,
    pub rows: Vec<HeatmapRowView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunnelQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub level: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelRow {
    pub test_id: i64,
    pub title: String,
    pub level: Option<String>,
    pub started: i64,
    pub completed: i64,
    pub passed: i64,
    pub attempt_count: i64,
    pub completion_rate: f64,
    pub pass_rate: f64,
}
