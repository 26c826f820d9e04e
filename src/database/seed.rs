use crate::error::Result;
use sqlx::PgPool;

const WEEKDAYS: [(i16, &str); 7] = [
    (1, "Понедельник"),
    (2, "Вторник"),
    (3, "Среда"),
    (4, "Четверг"),
    (5, "Пятница"),
    (6, "Суббота"),
    (7, "Воскресенье"),
];

/// Seeds both dimension tables to their fixed cardinality. Idempotent:
/// already-present rows are left untouched, so this runs on every startup.
pub async fn seed_dimensions(pool: &PgPool) -> Result<()> {
    for (id, name) in WEEKDAYS {
        sqlx::query(
            r#"INSERT INTO weekday_dim (id, name) VALUES ($1, $2)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"INSERT INTO login_heatmap (weekday_id) VALUES ($1)
               ON CONFLICT (weekday_id) DO NOTHING"#,
        )
        .bind(id)
        .execute(pool)
        .await?;
    }

    tracing::debug!("dimension tables seeded");
    Ok(())
}
