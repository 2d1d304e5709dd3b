use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

pub const DEFAULT_ANSWER_FORMAT: &str = "multiple_choice";
pub const DEFAULT_EXPLANATION: &str = "No explanation provided";

/// A question as produced by a completion source, before validation.
///
/// Every field is optional because completion output is untrusted; the batch
/// validator decides what is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CandidateQuestion {
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub distractors: Option<JsonValue>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub answer_format: Option<String>,
    /// Explicit word ladder, used instead of parsing the question text.
    #[serde(default, alias = "set", skip_serializing_if = "Option::is_none")]
    pub word_chain: Option<Vec<String>>,
}

impl CandidateQuestion {
    pub fn question_text(&self) -> &str {
        self.question_text.as_deref().unwrap_or("")
    }

    pub fn correct_answer(&self) -> &str {
        self.correct_answer.as_deref().unwrap_or("")
    }

    /// Distractors coerced to a list: arrays keep their string items, a bare
    /// string becomes a one-element list, anything else is empty.
    pub fn distractor_list(&self) -> Vec<String> {
        match &self.distractors {
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    JsonValue::String(s) => Some(s.clone()),
                    JsonValue::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.trim().is_empty())
                .collect(),
            Some(JsonValue::String(s)) if !s.trim().is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

/// Question fields before insertion, either an accepted candidate headed for
/// review or a manually entered question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewQuestion {
    pub question_text: String,
    pub answer_format: String,
    pub correct_answer: String,
    pub distractors: Vec<String>,
    pub topic_id: i64,
    pub difficulty_id: i64,
    pub explanation: String,
    pub is_llm_generated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingQuestionRow {
    pub pending_question_id: i64,
    pub question_text: String,
    pub answer_format: String,
    pub correct_answer: String,
    pub distractors: String,
    pub topic_id: i64,
    pub difficulty_id: i64,
    pub explanation: String,
    pub is_llm_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub pending_question_id: i64,
    pub question_text: String,
    pub answer_format: String,
    pub correct_answer: String,
    pub distractors: Vec<String>,
    pub topic_id: i64,
    pub difficulty_id: i64,
    pub explanation: String,
    pub is_llm_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PendingQuestionRow> for PendingQuestion {
    fn from(row: PendingQuestionRow) -> Self {
        Self {
            pending_question_id: row.pending_question_id,
            distractors: parse_distractors(&row.distractors),
            question_text: row.question_text,
            answer_format: row.answer_format,
            correct_answer: row.correct_answer,
            topic_id: row.topic_id,
            difficulty_id: row.difficulty_id,
            explanation: row.explanation,
            is_llm_generated: row.is_llm_generated,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionRow {
    pub question_id: i64,
    pub question_text: String,
    pub answer_format: String,
    pub correct_answer: String,
    pub distractors: String,
    pub topic_id: i64,
    pub difficulty_id: i64,
    pub explanation: String,
    pub is_llm_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: i64,
    pub question_text: String,
    pub answer_format: String,
    pub correct_answer: String,
    pub distractors: Vec<String>,
    pub topic_id: i64,
    pub difficulty_id: i64,
    pub explanation: String,
    pub is_llm_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Self {
            question_id: row.question_id,
            distractors: parse_distractors(&row.distractors),
            question_text: row.question_text,
            answer_format: row.answer_format,
            correct_answer: row.correct_answer,
            topic_id: row.topic_id,
            difficulty_id: row.difficulty_id,
            explanation: row.explanation,
            is_llm_generated: row.is_llm_generated,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Decodes a stored distractor column. A leading byte-order mark is ignored
/// and anything that is not a JSON array of strings yields an empty list.
pub fn parse_distractors(raw: &str) -> Vec<String> {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<JsonValue>>(trimmed) {
        Ok(items) => items
            .into_iter()
            .filter_map(|v| match v {
                JsonValue::String(s) => Some(s),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "unparsable distractors column, using empty list");
            Vec::new()
        }
    }
}

pub fn serialize_distractors(distractors: &[String]) -> String {
    serde_json::to_string(distractors).unwrap_or_else(|_| "[]".to_string())
}
