use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WeekdayDim {
    pub id: i16,
    pub name: String,
}

/// One weekday row of the login heatmap: a counter per 2-hour bin.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoginHeatmapRow {
    pub weekday_id: i16,
    pub h00_02: i32,
    pub h02_04: i32,
    pub h04_06: i32,
    pub h06_08: i32,
    pub h08_10: i32,
    pub h10_12: i32,
    pub h12_14: i32,
    pub h14_16: i32,
    pub h16_18: i32,
    pub h18_20: i32,
    pub h20_22: i32,
    pub h22_24: i32,
}

impl LoginHeatmapRow {
    /// Counters in bin display order 00-02 .. 22-24.
    pub fn counts(&self) -> [i32; 12] {
        [
            self.h00_02, self.h02_04, self.h04_06, self.h06_08, self.h08_10, self.h10_12,
            self.h12_14, self.h14_16, self.h16_18, self.h18_20, self.h20_22, self.h22_24,
        ]
    }

    pub fn zeroed(weekday_id: i16) -> Self {
        Self {
            weekday_id,
            h00_02: 0,
            h02_04: 0,
            h04_06: 0,
            h06_08: 0,
            h08_10: 0,
            h10_12: 0,
            h12_14: 0,
            h14_16: 0,
            h16_18: 0,
            h18_20: 0,
            h20_22: 0,
            h22_24: 0,
        }
    }
}
