use crate::error::Result;
use crate::models::question::{serialize_distractors, NewQuestion};
use crate::models::topic::{DifficultyLevel, Topic};
use crate::services::question_store::{QuestionSource, QuestionStore};
use async_trait::async_trait;
use sqlx::PgPool;

/// Postgres-backed `QuestionStore`.
#[derive(Clone)]
pub struct PgQuestionStore {
    pool: PgPool,
}

impl PgQuestionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionStore for PgQuestionStore {
    async fn find_topic_by_name(&self, name: &str) -> Result<Option<Topic>> {
        let topic = sqlx::query_as::<_, Topic>(
            "SELECT topic_id, topic_name FROM topics WHERE LOWER(topic_name) = LOWER(TRIM($1))",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(topic)
    }

    async fn find_difficulty_by_label(&self, label: &str) -> Result<Option<DifficultyLevel>> {
        let level = sqlx::query_as::<_, DifficultyLevel>(
            "SELECT difficulty_id, label FROM difficulty_levels WHERE LOWER(label) = LOWER(TRIM($1))",
        )
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;
        Ok(level)
    }

    async fn list_difficulty_labels(&self) -> Result<Vec<String>> {
        let labels: Vec<(String,)> =
            sqlx::query_as("SELECT label FROM difficulty_levels ORDER BY difficulty_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(labels.into_iter().map(|(label,)| label).collect())
    }

    async fn find_answer_match(
        &self,
        source: QuestionSource,
        topic_id: i64,
        normalized_answer: &str,
    ) -> Result<Option<i64>> {
        let sql = match source {
            QuestionSource::Approved => {
                r#"
                SELECT question_id FROM questions
                WHERE topic_id = $1
                  AND LOWER(TRIM(REGEXP_REPLACE(correct_answer, '\s+', ' ', 'g'))) = $2
                LIMIT 1
                "#
            }
            QuestionSource::Pending => {
                r#"
                SELECT pending_question_id FROM pending_questions
                WHERE topic_id = $1
                  AND LOWER(TRIM(REGEXP_REPLACE(correct_answer, '\s+', ' ', 'g'))) = $2
                LIMIT 1
                "#
            }
        };
        let row: Option<(i64,)> = sqlx::query_as(sql)
            .bind(topic_id)
            .bind(normalized_answer)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn question_texts(
        &self,
        source: QuestionSource,
        topic_id: i64,
    ) -> Result<Vec<(i64, String)>> {
        let sql = match source {
            QuestionSource::Approved => {
                "SELECT question_id, question_text FROM questions WHERE topic_id = $1 ORDER BY question_id"
            }
            QuestionSource::Pending => {
                "SELECT pending_question_id, question_text FROM pending_questions WHERE topic_id = $1 ORDER BY pending_question_id"
            }
        };
        let rows: Vec<(i64, String)> = sqlx::query_as(sql)
            .bind(topic_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn insert_pending(&self, question: &NewQuestion) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO pending_questions (
                question_text, answer_format, correct_answer, distractors,
                topic_id, difficulty_id, explanation, is_llm_generated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING pending_question_id
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
        Ok(id)
    }
}
