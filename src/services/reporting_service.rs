use crate::dto::reporting_dto::{FunnelQuery, FunnelRow, HeatmapSnapshot};
use crate::error::{Error, Result};
use crate::services::heatmap_service::HeatmapService;
use crate::utils::time::{day_window_utc, local_today};
use chrono::NaiveDate;
use chrono_tz::Tz;
use sqlx::PgPool;

const DEFAULT_WINDOW_DAYS: i64 = 30;
const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct ReportingService {
    pool: PgPool,
    heatmap: HeatmapService,
    timezone: Tz,
}

#[derive(sqlx::FromRow)]
struct FunnelAggRow {
    test_id: i64,
    title: String,
    level: Option<String>,
    started: i64,
    completed: i64,
    passed: i64,
}

impl ReportingService {
    pub fn new(pool: PgPool, heatmap: HeatmapService, timezone: Tz) -> Self {
        Self {
            pool,
            heatmap,
            timezone,
        }
    }

    pub async fn login_heatmap(&self) -> Result<HeatmapSnapshot> {
        self.heatmap.snapshot().await
    }

    pub async fn reset_login_heatmap(&self) -> Result<()> {
        self.heatmap.reset().await
    }

    /// Started/completed/passed conversion per test over a closed date
    /// window (inclusive day boundaries on the target timezone's calendar).
    /// Only tests with at least one in-window attempt are returned, ordered
    /// by completed count descending.
    pub async fn test_funnel(&self, query: &FunnelQuery) -> Result<Vec<FunnelRow>> {
        let today = local_today(self.timezone);
        let (from, to) = resolve_window(query.from, query.to, today);
        if from > to {
            return Err(Error::BadRequest(format!(
                "Window start {} is after window end {}",
                from, to
            )));
        }
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let (window_start, window_end) = day_window_utc(from, to, self.timezone);

        let rows = sqlx::query_as::<_, FunnelAggRow>(
            r#"
            SELECT t.id AS test_id, t.title, t.level,
                   COUNT(ta.id) AS started,
                   COUNT(ta.id) FILTER (WHERE ta.is_completed) AS completed,
                   COUNT(ta.id) FILTER (WHERE ta.passed IS TRUE) AS passed
            FROM tests t
            JOIN test_attempts ta ON ta.test_id = t.id
            WHERE ta.started_at >= $1 AND ta.started_at < $2
              AND ($3::text IS NULL OR t.level = $3)
            GROUP BY t.id, t.title, t.level
            ORDER BY completed DESC, started DESC, t.id ASC
            LIMIT $4
            "#,
        )
        .bind(window_start)
        .bind(window_end)
        .bind(query.level.clone())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let (completion_rate, pass_rate) = funnel_rates(r.started, r.completed, r.passed);
                FunnelRow {
                    test_id: r.test_id,
                    title: r.title,
                    level: r.level,
                    started: r.started,
                    completed: r.completed,
                    passed: r.passed,
                    // Deliberately the completed count: the metric is named
                    // after its historical definition, not recomputed.
                    attempt_count: r.completed,
                    completion_rate,
                    pass_rate,
                }
            })
            .collect())
    }
}

/// Defaults to the trailing 30 days ending today when bounds are absent.
fn resolve_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let to = to.unwrap_or(today);
    let from = from.unwrap_or(to - chrono::Duration::days(DEFAULT_WINDOW_DAYS - 1));
    (from, to)
}

/// Percentage rates, two decimals, standard rounding; a zero denominator
/// yields 0 rather than an error.
fn funnel_rates(started: i64, completed: i64, passed: i64) -> (f64, f64) {
    let completion = if started > 0 {
        round2(completed as f64 / started as f64 * 100.0)
    } else {
        0.0
    };
    let pass = if completed > 0 {
        round2(passed as f64 / completed as f64 * 100.0)
    } else {
        0.0
    };
    (completion, pass)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
