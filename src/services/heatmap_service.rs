use crate::dto::reporting_dto::{HeatmapRowView, HeatmapSnapshot};
use crate::error::{Error, Result};
use crate::utils::time::{login_bucket, BIN_LABELS};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;

/// Durable 7x12 login counter matrix. Increments are expressed as a single
/// atomic column update scoped by weekday id; a read-the-counter-then-write
/// cycle would lose updates under concurrent logins and is never used here.
#[derive(Clone)]
pub struct HeatmapService {
    pool: PgPool,
    timezone: Tz,
}

/// Bin label -> counter column. The whitelist is the only route from input
/// to SQL identifier; an unknown label fails closed instead of reaching an
/// arbitrary column.
fn column_for_bin(bin: &str) -> Option<&'static str> {
    match bin {
        "00-02" => Some("h00_02"),
        "02-04" => Some("h02_04"),
        "04-06" => Some("h04_06"),
        "06-08" => Some("h06_08"),
        "08-10" => Some("h08_10"),
        "10-12" => Some("h10_12"),
        "12-14" => Some("h12_14"),
        "14-16" => Some("h14_16"),
        "16-18" => Some("h16_18"),
        "18-20" => Some("h18_20"),
        "20-22" => Some("h20_22"),
        "22-24" => Some("h22_24"),
        _ => None,
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    weekday_id: i16,
    name: String,
    h00_02: i32,
    h02_04: i32,
    h04_06: i32,
    h06_08: i32,
    h08_10: i32,
    h10_12: i32,
    h12_14: i32,
    h14_16: i32,
    h16_18: i32,
    h18_20: i32,
    h20_22: i32,
    h22_24: i32,
}

impl HeatmapService {
    pub fn new(pool: PgPool, timezone: Tz) -> Self {
        Self { pool, timezone }
    }

    /// Buckets a login timestamp and increments the matching cell. This is
    /// the fire-and-forget entry point: every failure is logged and
    /// swallowed so that login tracking can never fail the login itself.
    pub async fn track_login(&self, ts: DateTime<Utc>) {
        let (weekday_id, bin) = login_bucket(ts, self.timezone);
        if let Err(e) = self.increment(weekday_id, bin).await {
            tracing::error!(error = ?e, weekday_id, bin, "failed to record login activity");
        }
    }

    /// Atomically adds one to cell (weekday, bin). If the weekday row does
    /// not exist yet, a zero row is inserted with conflict-tolerant
    /// semantics and the increment is retried once: two callers racing on
    /// "row missing" both succeed and neither increment is lost.
    pub async fn increment(&self, weekday_id: i16, bin: &str) -> Result<()> {
        if !(1..=7).contains(&weekday_id) {
            return Err(Error::InvalidState(format!(
                "Weekday id {} outside 1..7",
                weekday_id
            )));
        }
        let column = column_for_bin(bin)
            .ok_or_else(|| Error::InvalidState(format!("Unknown heatmap bin '{}'", bin)))?;

        let update = format!(
            "UPDATE login_heatmap SET {col} = {col} + 1 WHERE weekday_id = $1",
            col = column
        );

        let affected = sqlx::query(&update)
            .bind(weekday_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            sqlx::query(
                r#"INSERT INTO login_heatmap (weekday_id) VALUES ($1)
                   ON CONFLICT (weekday_id) DO NOTHING"#,
            )
            .bind(weekday_id)
            .execute(&self.pool)
            .await?;

            sqlx::query(&update)
                .bind(weekday_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// All 7 weekday rows in id order, each with 12 ordered counters. A
    /// weekday with no recorded activity renders as a zero row rather than
    /// being omitted.
    pub async fn snapshot(&self) -> Result<HeatmapSnapshot> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT wd.id AS weekday_id, wd.name,
                   COALESCE(lh.h00_02, 0) AS h00_02,
                   COALESCE(lh.h02_04, 0) AS h02_04,
                   COALESCE(lh.h04_06, 0) AS h04_06,
                   COALESCE(lh.h06_08, 0) AS h06_08,
                   COALESCE(lh.h08_10, 0) AS h08_10,
                   COALESCE(lh.h10_12, 0) AS h10_12,
                   COALESCE(lh.h12_14, 0) AS h12_14,
                   COALESCE(lh.h14_16, 0) AS h14_16,
                   COALESCE(lh.h16_18, 0) AS h16_18,
                   COALESCE(lh.h18_20, 0) AS h18_20,
                   COALESCE(lh.h20_22, 0) AS h20_22,
                   COALESCE(lh.h22_24, 0) AS h22_24
            FROM weekday_dim wd
            LEFT JOIN login_heatmap lh ON lh.weekday_id = wd.id
            ORDER BY wd.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = rows
            .into_iter()
            .map(|r| HeatmapRowView {
                weekday_id: r.weekday_id,
                weekday: r.name,
                counts: vec![
                    r.h00_02, r.h02_04, r.h04_06, r.h06_08, r.h08_10, r.h10_12, r.h12_14,
                    r.h14_16, r.h16_18, r.h18_20, r.h20_22, r.h22_24,
                ],
            })
            .collect();

        Ok(HeatmapSnapshot {
            bins: BIN_LABELS.iter().map(|s| s.to_string()).collect(),
            rows,
        })
    }

    /// Zeroes all 84 counters in one statement, so concurrent readers see
    /// either the old matrix or the fully reset one, never a partial reset.
    pub async fn reset(&self) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE login_heatmap
            SET h00_02 = 0, h02_04 = 0, h04_06 = 0, h06_08 = 0,
                h08_10 = 0, h10_12 = 0, h12_14 = 0, h14_16 = 0,
                h16_18 = 0, h18_20 = 0, h20_22 = 0, h22_24 = 0
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("login heatmap reset");
        Ok(())
    }
}
