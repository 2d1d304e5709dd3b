use crate::error::Result;
use crate::services::question_store::{QuestionSource, QuestionStore};
use crate::services::similarity::{normalize_answer, normalize_question_text, similarity};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub reason: Option<String>,
    pub existing_question_id: Option<i64>,
}

impl DuplicateCheck {
    fn unique() -> Self {
        Self {
            is_duplicate: false,
            reason: None,
            existing_question_id: None,
        }
    }

    fn duplicate(reason: String, existing_question_id: i64) -> Self {
        Self {
            is_duplicate: true,
            reason: Some(reason),
            existing_question_id: Some(existing_question_id),
        }
    }
}

#[derive(Clone)]
pub struct DuplicateDetector {
    store: Arc<dyn QuestionStore>,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn QuestionStore>) -> Self {
        Self { store }
    }

    /// Checks a candidate against approved, then pending, questions of the
    /// same topic: exact answers first, then question-text similarity.
    ///
    /// Lookup failures do not block generation; the candidate is reported as
    /// unique with a reason explaining the skipped check.
    pub async fn check(
        &self,
        topic_id: i64,
        question_text: &str,
        answer: &str,
        threshold: f64,
    ) -> DuplicateCheck {
        match self.run_checks(topic_id, question_text, answer, threshold).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, topic_id, "duplicate check failed, treating as unique");
                DuplicateCheck {
                    is_duplicate: false,
                    reason: Some(format!("Duplicate check skipped: {}", e)),
                    existing_question_id: None,
                }
            }
        }
    }

    async fn run_checks(
        &self,
        topic_id: i64,
        question_text: &str,
        answer: &str,
        threshold: f64,
    ) -> Result<DuplicateCheck> {
        let normalized_answer = normalize_answer(answer);
        for source in [QuestionSource::Approved, QuestionSource::Pending] {
            if let Some(id) = self
                .store
                .find_answer_match(source, topic_id, &normalized_answer)
                .await?
            {
                return Ok(DuplicateCheck::duplicate(
                    format!("Exact answer match with {} question #{}", source.label(), id),
                    id,
                ));
            }
        }

        let normalized_text = normalize_question_text(question_text);
        for source in [QuestionSource::Approved, QuestionSource::Pending] {
            let existing = self.store.question_texts(source, topic_id).await?;
            for (id, text) in existing {
                let score = similarity(&normalized_text, &normalize_question_text(&text));
                if score > threshold {
                    return Ok(DuplicateCheck::duplicate(
                        format!(
                            "Similar to {} question #{} ({:.0}% similar)",
                            source.label(),
                            id,
                            score * 100.0
                        ),
                        id,
                    ));
                }
            }
        }

        Ok(DuplicateCheck::unique())
    }
}
