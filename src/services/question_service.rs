use sqlx::PgPool;

use crate::dto::question_dto::QuestionListQuery;
use crate::error::{Error, Result};
use crate::models::question::{serialize_distractors, NewQuestion, Question, QuestionRow};

/// The approved question bank.
#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Adds a question straight to the bank, bypassing review.
    pub async fn create(&self, question: &NewQuestion) -> Result<i64> {
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

        tracing::info!(id = question_id, "question created");
        Ok(question_id)
    }

    pub async fn list(&self, query: &QuestionListQuery) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT * FROM questions
            WHERE ($1::bigint IS NULL OR topic_id = $1)
              AND ($2::bigint IS NULL OR difficulty_id = $2)
            ORDER BY question_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.topic_id)
        .bind(query.difficulty_id)
        .bind(query.question_limit())
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Question::from).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Question> {
        let row = sqlx::query_as::<_, QuestionRow>("SELECT * FROM questions WHERE question_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Question {} not found", id)))?;

        Ok(row.into())
    }
}
