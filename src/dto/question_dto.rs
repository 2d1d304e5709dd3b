use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::models::question::{NewQuestion, DEFAULT_ANSWER_FORMAT};
use crate::models::verdict::SkippedQuestion;
use crate::services::generation_service::GenerationStats;

pub const PENDING_LIST_DEFAULT_LIMIT: i64 = 200;
pub const PENDING_LIST_MAX_LIMIT: i64 = 200;
pub const QUESTION_LIST_DEFAULT_LIMIT: i64 = 10;
pub const QUESTION_LIST_MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateQuestionsPayload {
    #[validate(length(min = 1, message = "question_types must contain at least one topic"))]
    pub question_types: Vec<String>,
    #[validate(length(min = 1))]
    pub difficulty_level: String,
    #[validate(range(min = 1))]
    pub num_questions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestionRef {
    pub id: i64,
    pub difficulty_level: String,
    pub status: String,
}

/// Result for one requested question type. A failure here does not fail the
/// whole request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationTypeResult {
    pub question_type: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_generated: usize,
    pub failed: usize,
    pub questions: Vec<GeneratedQuestionRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<GenerationStats>,
    pub skipped: Vec<SkippedQuestion>,
}

impl GenerationTypeResult {
    pub fn failure(question_type: &str, error: impl Into<String>) -> Self {
        Self {
            question_type: question_type.to_string(),
            success: false,
            error: Some(error.into()),
            total_generated: 0,
            failed: 0,
            questions: Vec::new(),
            stats: None,
            skipped: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateQuestionsResponse {
    pub success: bool,
    pub message: String,
    pub source: String,
    pub results: Vec<GenerationTypeResult>,
}

/// Full question body used for create and for whole-record updates.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionPayload {
    #[validate(length(min = 1))]
    pub question_text: String,
    #[serde(default = "default_answer_format")]
    #[validate(length(min = 1))]
    pub answer_format: String,
    #[validate(length(min = 1))]
    pub correct_answer: String,
    #[serde(deserialize_with = "one_or_many")]
    #[validate(length(min = 1, message = "at least one distractor is required"))]
    pub distractors: Vec<String>,
    #[validate(range(min = 1))]
    pub topic_id: i64,
    #[validate(range(min = 1))]
    pub difficulty_id: i64,
    #[validate(length(min = 1))]
    pub explanation: String,
    #[serde(default)]
    pub is_llm_generated: bool,
}

fn default_answer_format() -> String {
    DEFAULT_ANSWER_FORMAT.to_string()
}

/// Accepts a list of strings or a single bare string.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(items) => items,
    })
}

impl From<QuestionPayload> for NewQuestion {
    fn from(p: QuestionPayload) -> Self {
        Self {
            question_text: p.question_text.trim().to_string(),
            answer_format: p.answer_format.trim().to_string(),
            correct_answer: p.correct_answer.trim().to_string(),
            distractors: p.distractors.into_iter().map(|d| d.trim().to_string()).collect(),
            topic_id: p.topic_id,
            difficulty_id: p.difficulty_id,
            explanation: p.explanation.trim().to_string(),
            is_llm_generated: p.is_llm_generated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkPendingQuestionsPayload {
    pub questions: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkCreated {
    pub index: usize,
    pub pending_question_id: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub index: usize,
    pub question: serde_json::Value,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkCreateResponse {
    pub successful: Vec<BulkCreated>,
    pub failed: Vec<BulkFailure>,
    pub total_processed: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionListQuery {
    pub topic_id: Option<i64>,
    pub difficulty_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl QuestionListQuery {
    /// Page size for the review queue.
    pub fn pending_limit(&self) -> i64 {
        self.limit_within(PENDING_LIST_DEFAULT_LIMIT, PENDING_LIST_MAX_LIMIT)
    }

    /// Page size for the approved question bank.
    pub fn question_limit(&self) -> i64 {
        self.limit_within(QUESTION_LIST_DEFAULT_LIMIT, QUESTION_LIST_MAX_LIMIT)
    }

    // Missing or zero falls back to the default; anything else is clamped.
    fn limit_within(&self, default: i64, max: i64) -> i64 {
        match self.limit {
            None | Some(0) => default,
            Some(limit) => limit.clamp(1, max),
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApproveResponse {
    pub question_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedResponse {
    pub pending_question_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionCreatedResponse {
    pub question_id: i64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_query_clamps_limit_and_offset() {
        let q = QuestionListQuery::default();
        assert_eq!(q.pending_limit(), 200);
        assert_eq!(q.offset(), 0);

        let q = QuestionListQuery {
            limit: Some(500),
            offset: Some(-3),
            ..Default::default()
        };
        assert_eq!(q.pending_limit(), 200);
        assert_eq!(q.offset(), 0);

        let q = QuestionListQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(q.pending_limit(), 200);
    }

    #[test]
    fn approved_list_uses_smaller_pages() {
        assert_eq!(QuestionListQuery::default().question_limit(), 10);

        let q = QuestionListQuery {
            limit: Some(150),
            ..Default::default()
        };
        assert_eq!(q.question_limit(), 100);
        assert_eq!(q.pending_limit(), 150);

        let q = QuestionListQuery {
            limit: Some(-5),
            ..Default::default()
        };
        assert_eq!(q.question_limit(), 1);

        let q = QuestionListQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(q.question_limit(), 10);
    }

    #[test]
    fn payload_accepts_a_single_distractor_string() {
        let payload: QuestionPayload = serde_json::from_value(json!({
            "question_text": "tap (pod) nod son (?) rib",
            "correct_answer": "nib",
            "distractors": " bin ",
            "topic_id": 1,
            "difficulty_id": 1,
            "explanation": "Last letter then last two letters."
        }))
        .unwrap();
        assert!(payload.validate().is_ok());
        assert!(!payload.is_llm_generated);
        let question: NewQuestion = payload.into();
        assert_eq!(question.distractors, vec!["bin".to_string()]);

        let list: QuestionPayload = serde_json::from_value(json!({
            "question_text": "x",
            "correct_answer": "y",
            "distractors": ["a", "b"],
            "topic_id": 1,
            "difficulty_id": 1,
            "explanation": "z"
        }))
        .unwrap();
        assert_eq!(list.distractors.len(), 2);

        let bad = serde_json::from_value::<QuestionPayload>(json!({
            "question_text": "x",
            "correct_answer": "y",
            "distractors": 3,
            "topic_id": 1,
            "difficulty_id": 1,
            "explanation": "z"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn pending_payload_requires_fields() {
        let payload: QuestionPayload = serde_json::from_value(json!({
            "question_text": "CAME → ? → LIME",
            "correct_answer": "lame",
            "distractors": [],
            "topic_id": 4,
            "difficulty_id": 1,
            "explanation": "One letter at a time."
        }))
        .unwrap();
        assert_eq!(payload.answer_format, "multiple_choice");
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("distractors"));
    }

    #[test]
    fn generate_payload_rejects_empty_types() {
        let payload = GenerateQuestionsPayload {
            question_types: vec![],
            difficulty_level: "Easy".into(),
            num_questions: 0,
        };
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("question_types"));
        assert!(fields.contains_key("num_questions"));
    }
}
