use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Accepted,
    Rejected,
    Duplicate,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationVerdict {
    pub status: VerdictStatus,
    pub reason: Option<String>,
    #[serde(rename = "existingQuestionId", skip_serializing_if = "Option::is_none")]
    pub existing_question_id: Option<i64>,
}

impl ValidationVerdict {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Rejected,
            reason: Some(reason.into()),
            existing_question_id: None,
        }
    }

    pub fn duplicate(reason: impl Into<String>, existing_question_id: Option<i64>) -> Self {
        Self {
            status: VerdictStatus::Duplicate,
            reason: Some(reason.into()),
            existing_question_id,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Error,
            reason: Some(reason.into()),
            existing_question_id: None,
        }
    }
}

/// A candidate the batch validator did not accept, kept for operator review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedQuestion {
    pub question: JsonValue,
    #[serde(flatten)]
    pub verdict: ValidationVerdict,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skipped_question_flattens_its_verdict() {
        let skipped = SkippedQuestion {
            question: json!({"correct_answer": "nib"}),
            verdict: ValidationVerdict::duplicate("Exact answer match with approved question #12", Some(12)),
        };
        let value = serde_json::to_value(&skipped).unwrap();
        assert_eq!(value["status"], "duplicate");
        assert_eq!(value["existingQuestionId"], 12);
        assert_eq!(value["question"]["correct_answer"], "nib");

        let value = serde_json::to_value(ValidationVerdict::rejected("Missing required fields")).unwrap();
        assert_eq!(value["status"], "rejected");
        assert!(value.get("existingQuestionId").is_none());
    }
}
