use crate::dto::attempt_dto::{RecordAnswerRequest, RecordResultRequest, SectionProgressRequest};
use crate::error::{Error, Result};
use crate::models::answer::UserAnswer;
use crate::models::attempt::{SectionAttempt, SectionStatus, TestAttempt};
use crate::services::test_service::TestService;
use rust_decimal::Decimal;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
    tests: TestService,
}

/// A test attempt composed with its section attempts, ordered by the
/// catalog's section order and then by attempt number (retakes last).
#[derive(Debug, Clone, serde::Serialize)]
pub struct AttemptDetail {
    pub attempt: TestAttempt,
    pub sections: Vec<SectionAttempt>,
}

impl AttemptService {
    pub fn new(pool: PgPool) -> Self {
        let tests = TestService::new(pool.clone());
        Self { pool, tests }
    }

    /// Creates a TestAttempt and one SectionAttempt per catalog section in a
    /// single transaction. Either the whole composed attempt exists
    /// afterwards or nothing does.
    pub async fn start_attempt(&self, user_id: i64, test_id: i64) -> Result<AttemptDetail> {
        let user_exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND is_active = TRUE)"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        if !user_exists {
            return Err(Error::NotFound(format!("User {} not found", user_id)));
        }

        let test = self.tests.get_active_test(test_id).await?;
        let sections = self.tests.list_sections(test.id).await?;
        if sections.is_empty() {
            // A test without sections would be vacuously "all completed";
            // surface the catalog problem instead of persisting it.
            return Err(Error::Config(format!(
                "Test {} has no sections and cannot be attempted",
                test.id
            )));
        }

        let mut question_counts = Vec::with_capacity(sections.len());
        for section in &sections {
            question_counts.push(self.tests.section_question_count(section.id).await?);
        }

        let mut tx = self.pool.begin().await?;

        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"
            INSERT INTO test_attempts (user_id, test_id, is_completed, started_at)
            VALUES ($1, $2, FALSE, NOW())
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(test.id)
        .fetch_one(&mut *tx)
        .await?;

        let mut section_attempts = Vec::with_capacity(sections.len());
        for (section, question_count) in sections.iter().zip(question_counts) {
            let sa = sqlx::query_as::<_, SectionAttempt>(
                r#"
                INSERT INTO section_attempts
                    (test_attempt_id, section_id, status, question_count,
                     time_remaining_seconds, attempt_number)
                VALUES ($1, $2, $3, $4, $5, 1)
                RETURNING *
                "#,
            )
            .bind(attempt.id)
            .bind(section.id)
            .bind(SectionStatus::NotStarted.as_str())
            .bind(question_count as i32)
            .bind(section.time_limit_minutes * 60)
            .fetch_one(&mut *tx)
            .await?;
            section_attempts.push(sa);
        }

        tx.commit().await?;

        tracing::info!(
            user_id,
            test_id = test.id,
            attempt_id = attempt.id,
            sections = section_attempts.len(),
            "test attempt started"
        );

        Ok(AttemptDetail {
            attempt,
            sections: section_attempts,
        })
    }

    /// Records or replaces the answer for one question of a non-terminal
    /// section attempt. Correctness is resolved against the question's
    /// current correct option and stored as a snapshot.
    pub async fn record_answer(
        &self,
        user_id: i64,
        section_attempt_id: i64,
        req: &RecordAnswerRequest,
    ) -> Result<UserAnswer> {
        let section_attempt = self.get_owned_section_attempt(user_id, section_attempt_id).await?;

        if section_attempt.is_terminal() {
            return Err(Error::InvalidState(format!(
                "Section attempt {} is {} and can no longer be modified",
                section_attempt.id, section_attempt.status
            )));
        }

        let belongs = self
            .tests
            .question_belongs_to_section(req.question_id, section_attempt.section_id)
            .await?;
        if !belongs {
            return Err(Error::BadRequest(format!(
                "Question {} is not part of the section being attempted",
                req.question_id
            )));
        }

        let is_correct = match req.selected_option_id {
            Some(option_id) => self.tests.option_correctness(req.question_id, option_id).await?,
            None => false,
        };

        let answer = sqlx::query_as::<_, UserAnswer>(
            r#"
            INSERT INTO user_answers
                (section_attempt_id, question_id, selected_option_id, is_correct,
                 marked_for_review, answered_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (section_attempt_id, question_id) DO UPDATE
            SET selected_option_id = EXCLUDED.selected_option_id,
                is_correct = EXCLUDED.is_correct,
                marked_for_review = EXCLUDED.marked_for_review,
                answered_at = EXCLUDED.answered_at
            RETURNING *
            "#,
        )
        .bind(section_attempt.id)
        .bind(req.question_id)
        .bind(req.selected_option_id)
        .bind(is_correct)
        .bind(req.marked_for_review.unwrap_or(false))
        .fetch_one(&self.pool)
        .await?;

        Ok(answer)
    }

    /// Applies a status transition and/or time budget update to a
    /// non-terminal section attempt. On reaching `completed` the correct
    /// answer count is tallied, a score is fixed, and the parent attempt's
    /// completion flag is re-derived.
    pub async fn update_section_progress(
        &self,
        user_id: i64,
        section_attempt_id: i64,
        req: &SectionProgressRequest,
    ) -> Result<SectionAttempt> {
        let section_attempt = self.get_owned_section_attempt(user_id, section_attempt_id).await?;

        let current = section_attempt.parsed_status().ok_or_else(|| {
            Error::Internal(format!(
                "Section attempt {} has unknown status '{}'",
                section_attempt.id, section_attempt.status
            ))
        })?;

        if current.is_terminal() {
            return Err(Error::InvalidState(format!(
                "Section attempt {} is {} and can no longer be modified",
                section_attempt.id, section_attempt.status
            )));
        }

        let next = match &req.status {
            Some(raw) => {
                let next = SectionStatus::parse(raw)
                    .ok_or_else(|| Error::BadRequest(format!("Unknown status '{}'", raw)))?;
                // Re-sending the current status is a no-op, not a violation.
                if next != current && !current.can_transition_to(next) {
                    return Err(Error::InvalidState(format!(
                        "Section attempt {} cannot move from {} to {}",
                        section_attempt.id, current, next
                    )));
                }
                next
            }
            None => current,
        };

        let time_remaining = req
            .time_remaining_seconds
            .unwrap_or(section_attempt.time_remaining_seconds);

        let (score, correct_answers) = if next == SectionStatus::Completed {
            let correct: i64 = sqlx::query_scalar(
                r#"SELECT COUNT(*) FROM user_answers
                   WHERE section_attempt_id = $1 AND is_correct = TRUE"#,
            )
            .bind(section_attempt.id)
            .fetch_one(&self.pool)
            .await?;
            let score = req.score.unwrap_or_else(|| Decimal::from(correct));
            (Some(score), Some(correct as i32))
        } else {
            (section_attempt.score, section_attempt.correct_answers)
        };

        let updated = sqlx::query_as::<_, SectionAttempt>(
            r#"
            UPDATE section_attempts
            SET status = $2, time_remaining_seconds = $3, score = $4,
                correct_answers = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(section_attempt.id)
        .bind(next.as_str())
        .bind(time_remaining)
        .bind(score)
        .bind(correct_answers)
        .fetch_one(&self.pool)
        .await?;

        if next.is_terminal() {
            // Completion is derived, never asserted: a terminal transition
            // is the moment the parent flag can become true.
            self.derive_completion(updated.test_attempt_id).await?;
            tracing::info!(
                section_attempt_id = updated.id,
                status = %next,
                "section attempt reached terminal state"
            );
        }

        Ok(updated)
    }

    /// Retake support: opens a fresh SectionAttempt for the same section
    /// with the next attempt number and a reseeded time budget. Only
    /// finished sections of a still-open test attempt can be retaken; the
    /// superseded row keeps its history.
    pub async fn restart_section(
        &self,
        user_id: i64,
        section_attempt_id: i64,
    ) -> Result<SectionAttempt> {
        let section_attempt = self.get_owned_section_attempt(user_id, section_attempt_id).await?;

        if !section_attempt.is_terminal() {
            return Err(Error::InvalidState(format!(
                "Section attempt {} is still {}; only finished sections can be retaken",
                section_attempt.id, section_attempt.status
            )));
        }

        let parent_completed: bool = sqlx::query_scalar(
            r#"SELECT is_completed FROM test_attempts WHERE id = $1"#,
        )
        .bind(section_attempt.test_attempt_id)
        .fetch_one(&self.pool)
        .await?;
        if parent_completed {
            return Err(Error::InvalidState(format!(
                "Test attempt {} is already completed",
                section_attempt.test_attempt_id
            )));
        }

        let time_limit_minutes: i32 = sqlx::query_scalar(
            r#"SELECT time_limit_minutes FROM sections WHERE id = $1"#,
        )
        .bind(section_attempt.section_id)
        .fetch_one(&self.pool)
        .await?;

        let question_count = self
            .tests
            .section_question_count(section_attempt.section_id)
            .await?;

        let next_number: i32 = sqlx::query_scalar::<_, Option<i32>>(
            r#"SELECT MAX(attempt_number) FROM section_attempts
               WHERE test_attempt_id = $1 AND section_id = $2"#,
        )
        .bind(section_attempt.test_attempt_id)
        .bind(section_attempt.section_id)
        .fetch_one(&self.pool)
        .await?
        .unwrap_or(0)
            + 1;

        let retake = sqlx::query_as::<_, SectionAttempt>(
            r#"
            INSERT INTO section_attempts
                (test_attempt_id, section_id, status, question_count,
                 time_remaining_seconds, attempt_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(section_attempt.test_attempt_id)
        .bind(section_attempt.section_id)
        .bind(SectionStatus::NotStarted.as_str())
        .bind(question_count as i32)
        .bind(time_limit_minutes * 60)
        .bind(next_number)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            section_attempt_id = retake.id,
            attempt_number = retake.attempt_number,
            "section retake opened"
        );

        Ok(retake)
    }

    /// Recomputes `is_completed` as the AND of the latest attempt per
    /// section being completed, and persists the flag when it becomes true.
    /// Idempotent; never flips a stored true back to false.
    pub async fn derive_completion(&self, test_attempt_id: i64) -> Result<bool> {
        let all_completed: bool = sqlx::query_scalar(
            r#"
            SELECT COALESCE(BOOL_AND(sa.status = 'completed'), FALSE)
            FROM section_attempts sa
            WHERE sa.test_attempt_id = $1
              AND sa.attempt_number = (
                  SELECT MAX(s2.attempt_number) FROM section_attempts s2
                  WHERE s2.test_attempt_id = sa.test_attempt_id
                    AND s2.section_id = sa.section_id)
            "#,
        )
        .bind(test_attempt_id)
        .fetch_one(&self.pool)
        .await?;

        if !all_completed {
            return Ok(false);
        }

        let section_total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(sa.score)
            FROM section_attempts sa
            WHERE sa.test_attempt_id = $1
              AND sa.attempt_number = (
                  SELECT MAX(s2.attempt_number) FROM section_attempts s2
                  WHERE s2.test_attempt_id = sa.test_attempt_id
                    AND s2.section_id = sa.section_id)
            "#,
        )
        .bind(test_attempt_id)
        .fetch_one(&self.pool)
        .await?;

        // The guard makes repeated derivation a no-op, and a grader-written
        // total_score is never overwritten.
        sqlx::query(
            r#"
            UPDATE test_attempts
            SET is_completed = TRUE,
                completed_at = COALESCE(completed_at, NOW()),
                total_score = COALESCE(total_score, $2),
                updated_at = NOW()
            WHERE id = $1 AND is_completed = FALSE
            "#,
        )
        .bind(test_attempt_id)
        .bind(section_total)
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    /// Write path for the external scoring collaborator: summary score and
    /// pass flag for an attempt that has finished all sections.
    pub async fn record_result(
        &self,
        user_id: i64,
        test_attempt_id: i64,
        req: &RecordResultRequest,
    ) -> Result<TestAttempt> {
        let attempt = self.get_owned_attempt(user_id, test_attempt_id).await?;
        self.derive_completion(attempt.id).await?;

        let updated = sqlx::query_as::<_, TestAttempt>(
            r#"
            UPDATE test_attempts
            SET total_score = COALESCE($2, total_score),
                passed = COALESCE($3, passed),
                updated_at = NOW()
            WHERE id = $1 AND is_completed = TRUE
            RETURNING *
            "#,
        )
        .bind(attempt.id)
        .bind(req.total_score)
        .bind(req.passed)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| {
            Error::InvalidState(format!(
                "Test attempt {} is not completed yet and cannot be scored",
                test_attempt_id
            ))
        })
    }

    pub async fn list_attempts(&self, user_id: i64) -> Result<Vec<AttemptDetail>> {
        let attempts = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE user_id = $1 ORDER BY started_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(attempts.len());
        for attempt in attempts {
            details.push(self.compose_detail(attempt).await?);
        }
        Ok(details)
    }

    pub async fn get_attempt(&self, user_id: i64, attempt_id: i64) -> Result<AttemptDetail> {
        let attempt = self.get_owned_attempt(user_id, attempt_id).await?;
        self.compose_detail(attempt).await
    }

    /// Reconciles completion before composing, so callers never observe a
    /// stale `is_completed = false` when every section is done.
    async fn compose_detail(&self, attempt: TestAttempt) -> Result<AttemptDetail> {
        self.derive_completion(attempt.id).await?;

        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE id = $1"#,
        )
        .bind(attempt.id)
        .fetch_one(&self.pool)
        .await?;

        let sections = sqlx::query_as::<_, SectionAttempt>(
            r#"
            SELECT sa.* FROM section_attempts sa
            JOIN sections s ON sa.section_id = s.id
            WHERE sa.test_attempt_id = $1
            ORDER BY s.order_index ASC, sa.attempt_number ASC
            "#,
        )
        .bind(attempt.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(AttemptDetail { attempt, sections })
    }

    /// Ownership-scoped fetch: an attempt of another user is
    /// indistinguishable from a missing one.
    async fn get_owned_attempt(&self, user_id: i64, attempt_id: i64) -> Result<TestAttempt> {
        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE id = $1 AND user_id = $2"#,
        )
        .bind(attempt_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        attempt.ok_or_else(|| Error::NotFound(format!("Test attempt {} not found", attempt_id)))
    }

    async fn get_owned_section_attempt(
        &self,
        user_id: i64,
        section_attempt_id: i64,
    ) -> Result<SectionAttempt> {
        let section_attempt = sqlx::query_as::<_, SectionAttempt>(
            r#"
            SELECT sa.* FROM section_attempts sa
            JOIN test_attempts ta ON sa.test_attempt_id = ta.id
            WHERE sa.id = $1 AND ta.user_id = $2
            "#,
        )
        .bind(section_attempt_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        section_attempt.ok_or_else(|| {
            Error::NotFound(format!("Section attempt {} not found", section_attempt_id))
        })
    }
}
