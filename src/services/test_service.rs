use crate::error::{Error, Result};
use crate::models::test::{Section, Test};
use sqlx::PgPool;

#[derive(Clone)]
pub struct TestService {
    pool: PgPool,
}

impl TestService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_active_test(&self, test_id: i64) -> Result<Test> {
        let test = sqlx::query_as::<_, Test>(
            r#"SELECT * FROM tests WHERE id = $1 AND is_active = TRUE"#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        test.ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    pub async fn list_sections(&self, test_id: i64) -> Result<Vec<Section>> {
        let sections = sqlx::query_as::<_, Section>(
            r#"SELECT * FROM sections WHERE test_id = $1 ORDER BY order_index ASC, id ASC"#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sections)
    }

    pub async fn section_question_count(&self, section_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(q.id) FROM questions q
               JOIN parts p ON q.part_id = p.id
               WHERE p.section_id = $1"#,
        )
        .bind(section_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn question_belongs_to_section(
        &self,
        question_id: i64,
        section_id: i64,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (
                SELECT 1 FROM questions q
                JOIN parts p ON q.part_id = p.id
                WHERE q.id = $1 AND p.section_id = $2
            )"#,
        )
        .bind(question_id)
        .bind(section_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Whether the given option is the designated correct one for its
    /// question. Fails NotFound when the option does not belong to the
    /// question at all.
    pub async fn option_correctness(&self, question_id: i64, option_id: i64) -> Result<bool> {
        let is_correct: Option<bool> = sqlx::query_scalar(
            r#"SELECT is_correct FROM options WHERE id = $1 AND question_id = $2"#,
        )
        .bind(option_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        is_correct.ok_or_else(|| {
            Error::NotFound(format!(
                "Option {} not found for question {}",
                option_id, question_id
            ))
        })
    }
}
