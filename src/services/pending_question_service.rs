use sqlx::PgPool;
use validator::Validate;

use crate::dto::question_dto::{
    BulkCreateResponse, BulkCreated, BulkFailure, QuestionPayload, QuestionListQuery,
};
use crate::error::{Error, Result};
use crate::models::question::{
    serialize_distractors, NewQuestion, PendingQuestion, PendingQuestionRow,
};

#[derive(Clone)]
pub struct PendingQuestionService {
    pool: PgPool,
}

impl PendingQuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, question: &NewQuestion) -> Result<PendingQuestion> {
        let row = sqlx::query_as::<_, PendingQuestionRow>(
            r#"
            INSERT INTO pending_questions (
                question_text, answer_format, correct_answer, distractors,
                topic_id, difficulty_id, explanation, is_llm_generated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&question.question_text)
        .bind(&question.answer_format)
        .bind(&question.correct_answer)
        .bind(serialize_distractors(&question.distractors))
        .bind(question.topic_id)
        .bind(question.difficulty_id)
        .bind(&question.explanation)
        .bind(question.is_llm_generated)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(id = row.pending_question_id, "pending question created");
        Ok(row.into())
    }

    /// Inserts each item independently; one bad item is reported and the rest
    /// still go in.
    pub async fn create_bulk(&self, items: Vec<serde_json::Value>) -> BulkCreateResponse {
        let mut report = BulkCreateResponse {
            total_processed: items.len(),
            ..Default::default()
        };

        for (index, item) in items.into_iter().enumerate() {
            let outcome = match serde_json::from_value::<QuestionPayload>(item.clone()) {
                Ok(payload) => match payload.validate() {
                    Ok(()) => self.create(&payload.into()).await,
                    Err(e) => Err(Error::from(e)),
                },
                Err(e) => Err(Error::from(e)),
            };

            match outcome {
                Ok(created) => report.successful.push(BulkCreated {
                    index,
                    pending_question_id: created.pending_question_id,
                    status: "success".to_string(),
                }),
                Err(e) => {
                    tracing::warn!(index, error = %e, "bulk pending question rejected");
                    report.failed.push(BulkFailure {
                        index,
                        question: item,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.success_count = report.successful.len();
        report.failure_count = report.failed.len();
        report
    }

    pub async fn list(&self, query: &QuestionListQuery) -> Result<Vec<PendingQuestion>> {
        let rows = sqlx::query_as::<_, PendingQuestionRow>(
            r#"
            SELECT * FROM pending_questions
            WHERE ($1::bigint IS NULL OR topic_id = $1)
              AND ($2::bigint IS NULL OR difficulty_id = $2)
            ORDER BY pending_question_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.topic_id)
        .bind(query.difficulty_id)
        .bind(query.pending_limit())
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PendingQuestion::from).collect())
    }

    pub async fn get(&self, id: i64) -> Result<PendingQuestion> {
        let row = sqlx::query_as::<_, PendingQuestionRow>(
            "SELECT * FROM pending_questions WHERE pending_question_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))?;

        Ok(row.into())
    }

    /// Replaces every editable field of a pending question.
    pub async fn update(&self, id: i64, question: &NewQuestion) -> Result<PendingQuestion> {
        let row = sqlx::query_as::<_, PendingQuestionRow>(
            r#"
            UPDATE pending_questions SET
                question_text = $2,
                answer_format = $3,
                correct_answer = $4,
                distractors = $5,
                topic_id = $6,
                difficulty_id = $7,
                explanation = $8,
                updated_at = NOW()
            WHERE pending_question_id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&question.question_text)
        .bind(&question.answer_format)
        .bind(&question.correct_answer)
        .bind(serialize_distractors(&question.distractors))
        .bind(question.topic_id)
        .bind(question.difficulty_id)
        .bind(&question.explanation)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))?;

        Ok(row.into())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM pending_questions WHERE pending_question_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Copies a pending question into the approved bank and removes it from
    /// review, atomically. Returns the new question id.
    pub async fn approve(&self, id: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let pending = sqlx::query_as::<_, PendingQuestionRow>(
            "SELECT * FROM pending_questions WHERE pending_question_id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found(id))?;

        let (question_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO questions (
                question_text, answer_format, correct_answer, distractors,
                topic_id, difficulty_id, explanation, is_llm_generated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING question_id
            "#,
        )
        .bind(&pending.question_text)
        .bind(&pending.answer_format)
        .bind(&pending.correct_answer)
        .bind(&pending.distractors)
        .bind(pending.topic_id)
        .bind(pending.difficulty_id)
        .bind(&pending.explanation)
        .bind(pending.is_llm_generated)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pending_questions WHERE pending_question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(pending_id = id, question_id, "pending question approved");
        Ok(question_id)
    }
}

fn not_found(id: i64) -> Error {
    Error::NotFound(format!("Pending question {} not found", id))
}
