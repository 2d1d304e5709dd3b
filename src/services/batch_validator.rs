use crate::models::question::{
    CandidateQuestion, NewQuestion, DEFAULT_ANSWER_FORMAT, DEFAULT_EXPLANATION,
};
use crate::models::topic::TopicKind;
use crate::models::verdict::{SkippedQuestion, ValidationVerdict, VerdictStatus};
use crate::services::duplicate_service::DuplicateDetector;
use crate::services::eval_service::EvaluatorRegistry;
use crate::services::extractors;
use crate::services::lexicon::WordOracle;
use crate::services::similarity::{collapse_whitespace, normalize_answer};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;

/// Where accepted candidates of a batch will be filed.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext {
    pub topic_id: i64,
    pub difficulty_id: i64,
    pub topic_kind: TopicKind,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct BatchStats {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub valid_questions: Vec<NewQuestion>,
    pub skipped_questions: Vec<SkippedQuestion>,
    pub stats: BatchStats,
}

#[derive(Clone)]
pub struct BatchValidator {
    oracle: Arc<dyn WordOracle>,
    evaluators: EvaluatorRegistry,
    duplicates: DuplicateDetector,
}

impl BatchValidator {
    pub fn new(
        oracle: Arc<dyn WordOracle>,
        evaluators: EvaluatorRegistry,
        duplicates: DuplicateDetector,
    ) -> Self {
        Self {
            oracle,
            evaluators,
            duplicates,
        }
    }

    /// Validates candidates one at a time. A failing candidate never stops
    /// the rest of the batch.
    ///
    /// `accepted_answers` carries normalized answers accepted earlier in the
    /// same generation call and is extended with this batch's acceptances.
    pub async fn validate_batch(
        &self,
        raw: Vec<JsonValue>,
        ctx: BatchContext,
        similarity_threshold: f64,
        accepted_answers: &mut HashSet<String>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        report.stats.total = raw.len();

        for item in raw {
            match self
                .validate_one(&item, ctx, similarity_threshold, accepted_answers)
                .await
            {
                Ok(question) => {
                    accepted_answers.insert(normalize_answer(&question.correct_answer));
                    report.stats.accepted += 1;
                    report.valid_questions.push(question);
                }
                Err(verdict) => {
                    match verdict.status {
                        VerdictStatus::Duplicate => report.stats.duplicates += 1,
                        _ => report.stats.rejected += 1,
                    }
                    tracing::warn!(
                        topic = %ctx.topic_kind,
                        status = ?verdict.status,
                        reason = verdict.reason.as_deref().unwrap_or(""),
                        "candidate skipped"
                    );
                    report.skipped_questions.push(SkippedQuestion {
                        question: item,
                        verdict,
                    });
                }
            }
        }

        report
    }

    async fn validate_one(
        &self,
        item: &JsonValue,
        ctx: BatchContext,
        similarity_threshold: f64,
        accepted_answers: &HashSet<String>,
    ) -> Result<NewQuestion, ValidationVerdict> {
        if !item.is_object() {
            return Err(ValidationVerdict::error("Candidate is not a JSON object"));
        }
        let mut candidate: CandidateQuestion = serde_json::from_value(item.clone())
            .map_err(|e| ValidationVerdict::error(format!("Malformed candidate: {}", e)))?;

        if candidate.question_text().trim().is_empty() || candidate.correct_answer().trim().is_empty()
        {
            return Err(ValidationVerdict::rejected("Missing required fields"));
        }

        if candidate.distractor_list().len() < 2 {
            return Err(ValidationVerdict::rejected("Insufficient distractors"));
        }

        if let Some(word) = self.first_unknown_word(candidate.correct_answer()) {
            return Err(ValidationVerdict::rejected(format!(
                "Invalid word detected: \"{}\"",
                word
            )));
        }

        if ctx.topic_kind != TopicKind::Other {
            candidate = self.check_structure(item, candidate, ctx.topic_kind).await?;
        }

        let check = self
            .duplicates
            .check(
                ctx.topic_id,
                candidate.question_text(),
                candidate.correct_answer(),
                similarity_threshold,
            )
            .await;
        if check.is_duplicate {
            return Err(ValidationVerdict::duplicate(
                check.reason.unwrap_or_else(|| "Duplicate question".to_string()),
                check.existing_question_id,
            ));
        }
        if accepted_answers.contains(&normalize_answer(candidate.correct_answer())) {
            return Err(ValidationVerdict::duplicate(
                "Answer already accepted earlier in this generation run",
                None,
            ));
        }

        Ok(normalize(candidate, ctx))
    }

    /// Tokens of one character, numbers and tokens with punctuation are not
    /// looked up.
    fn first_unknown_word<'a>(&self, answer: &'a str) -> Option<&'a str> {
        answer.split_whitespace().find(|word| {
            let checkable = word.chars().count() > 1
                && word.parse::<f64>().is_err()
                && word.chars().all(|c| c.is_alphanumeric() || c == '_');
            checkable && !self.oracle.is_known_word(word)
        })
    }

    async fn check_structure(
        &self,
        item: &JsonValue,
        candidate: CandidateQuestion,
        kind: TopicKind,
    ) -> Result<CandidateQuestion, ValidationVerdict> {
        let payload = extractors::extract(kind, &candidate)
            .map_err(|e| ValidationVerdict::rejected(e.to_string()))?;

        let evaluator = self.evaluators.get(kind).ok_or_else(|| {
            ValidationVerdict::error(format!("No structural validator registered for {}", kind))
        })?;
        let result = evaluator
            .evaluate(&payload)
            .await
            .map_err(|e| ValidationVerdict::rejected(e.to_string()))?;

        if kind != TopicKind::Anagram {
            return Ok(candidate);
        }

        let JsonValue::Object(rewritten) = result else {
            return Err(ValidationVerdict::error(
                "anagram validation failed: evaluator did not return an object",
            ));
        };
        let mut merged = item.clone();
        if let JsonValue::Object(fields) = &mut merged {
            fields.extend(rewritten);
        }
        serde_json::from_value(merged).map_err(|e| {
            ValidationVerdict::error(format!("anagram validation failed: {}", e))
        })
    }
}

fn normalize(candidate: CandidateQuestion, ctx: BatchContext) -> NewQuestion {
    let distractors = candidate
        .distractor_list()
        .iter()
        .map(|d| collapse_whitespace(d))
        .collect();
    let explanation = candidate
        .explanation
        .as_deref()
        .map(collapse_whitespace)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());
    let answer_format = candidate
        .answer_format
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_ANSWER_FORMAT)
        .to_string();

    NewQuestion {
        question_text: clean_question_text(candidate.question_text()),
        answer_format,
        correct_answer: collapse_whitespace(candidate.correct_answer()),
        distractors,
        topic_id: ctx.topic_id,
        difficulty_id: ctx.difficulty_id,
        explanation,
        is_llm_generated: true,
    }
}

/// Collapses runs of spaces inside each line but keeps line breaks, which
/// rewritten anagram questions use to list their options.
fn clean_question_text(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lexicon::{PermissiveOracle, WordListOracle};
    use crate::services::question_store::{InMemoryQuestionStore, StoredQuestion};
    use serde_json::json;

    fn validator_with(store: Arc<InMemoryQuestionStore>, oracle: Arc<dyn WordOracle>) -> BatchValidator {
        BatchValidator::new(
            oracle,
            EvaluatorRegistry::native(),
            DuplicateDetector::new(store),
        )
    }

    fn validator() -> BatchValidator {
        validator_with(
            Arc::new(InMemoryQuestionStore::with_default_catalog()),
            Arc::new(PermissiveOracle),
        )
    }

    fn ctx(kind: TopicKind, topic_id: i64) -> BatchContext {
        BatchContext {
            topic_id,
            difficulty_id: 1,
            topic_kind: kind,
        }
    }

    fn rule_question(answer: &str, distractors: JsonValue) -> JsonValue {
        json!({
            "question_text": "Find the missing word.  tap (pod) nod son (?) rib",
            "correct_answer": answer,
            "distractors": distractors,
            "explanation": "Take   letters from the outer words.",
            "answer_format": "multiple_choice"
        })
    }

    async fn run(v: &BatchValidator, raw: Vec<JsonValue>, ctx: BatchContext) -> BatchReport {
        let mut seen = HashSet::new();
        v.validate_batch(raw, ctx, 0.7, &mut seen).await
    }

    #[tokio::test]
    async fn missing_answer_is_rejected_before_duplicate_check() {
        let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
        store.set_fail_lookups(true);
        let v = validator_with(store, Arc::new(PermissiveOracle));
        let report = run(
            &v,
            vec![json!({"question_text": "tap (pod) nod son (?) rib", "distractors": ["a", "b"]})],
            ctx(TopicKind::Rule, 1),
        )
        .await;

        assert_eq!(report.stats.rejected, 1);
        let skipped = &report.skipped_questions[0];
        assert_eq!(skipped.verdict.status, VerdictStatus::Rejected);
        assert_eq!(skipped.verdict.reason.as_deref(), Some("Missing required fields"));
    }

    #[tokio::test]
    async fn distractor_count_boundary() {
        let v = validator();
        let one = run(&v, vec![rule_question("nib", json!(["rub"]))], ctx(TopicKind::Rule, 1)).await;
        assert_eq!(one.stats.rejected, 1);
        assert_eq!(
            one.skipped_questions[0].verdict.reason.as_deref(),
            Some("Insufficient distractors")
        );

        let single_string =
            run(&v, vec![rule_question("nib", json!("rub"))], ctx(TopicKind::Rule, 1)).await;
        assert_eq!(single_string.stats.rejected, 1);

        let two = run(&v, vec![rule_question("nib", json!(["rub", "cod"]))], ctx(TopicKind::Rule, 1)).await;
        assert_eq!(two.stats.accepted, 1);
    }

    #[tokio::test]
    async fn accepted_candidate_is_normalized_and_tagged() {
        let v = validator();
        let report = run(
            &v,
            vec![rule_question(" nib ", json!(["rub", "cod", "rid"]))],
            ctx(TopicKind::Rule, 1),
        )
        .await;

        let q = &report.valid_questions[0];
        assert_eq!(q.question_text, "Find the missing word. tap (pod) nod son (?) rib");
        assert_eq!(q.correct_answer, "nib");
        assert_eq!(q.explanation, "Take letters from the outer words.");
        assert_eq!(q.topic_id, 1);
        assert_eq!(q.difficulty_id, 1);
        assert!(q.is_llm_generated);
    }

    #[tokio::test]
    async fn unknown_words_are_rejected_and_numbers_skipped() {
        let oracle = Arc::new(WordListOracle::from_words(["nib"]));
        let v = validator_with(Arc::new(InMemoryQuestionStore::with_default_catalog()), oracle);

        let report = run(
            &v,
            vec![json!({
                "question_text": "What is it?",
                "correct_answer": "blorp",
                "distractors": ["a1", "b2"]
            })],
            ctx(TopicKind::Other, 9),
        )
        .await;
        assert!(report.skipped_questions[0]
            .verdict
            .reason
            .as_deref()
            .unwrap()
            .contains("blorp"));

        let report = run(
            &v,
            vec![json!({
                "question_text": "How many?",
                "correct_answer": "42 a nib",
                "distractors": ["7", "9"]
            })],
            ctx(TopicKind::Other, 9),
        )
        .await;
        assert_eq!(report.stats.accepted, 1);
    }

    #[tokio::test]
    async fn failed_structure_check_carries_topic_reason() {
        let v = validator();
        let report = run(
            &v,
            vec![rule_question("cat", json!(["rub", "cod"]))],
            ctx(TopicKind::Rule, 1),
        )
        .await;
        assert_eq!(report.stats.rejected, 1);
        assert!(report.skipped_questions[0]
            .verdict
            .reason
            .as_deref()
            .unwrap()
            .starts_with("rule validation failed"));
    }

    #[tokio::test]
    async fn malformed_items_do_not_stop_the_batch() {
        let v = validator();
        let report = run(
            &v,
            vec![
                json!("just a string"),
                json!({"question_text": 5, "correct_answer": "nib"}),
                rule_question("nib", json!(["rub", "cod"])),
            ],
            ctx(TopicKind::Rule, 1),
        )
        .await;

        assert_eq!(report.stats.total, 3);
        assert_eq!(report.stats.accepted, 1);
        assert_eq!(report.stats.rejected, 2);
        assert_eq!(report.skipped_questions[0].verdict.status, VerdictStatus::Error);
        assert_eq!(report.skipped_questions[1].verdict.status, VerdictStatus::Error);
    }

    #[tokio::test]
    async fn duplicates_against_store_and_within_run() {
        let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
        store.add_approved(StoredQuestion {
            id: 4,
            topic_id: 4,
            question_text: "Change one letter at a time. BOLD → ? → CORD".into(),
            correct_answer: "cold".into(),
        });
        let v = validator_with(store, Arc::new(PermissiveOracle));
        let ladder = |text: &str, answer: &str| {
            json!({
                "question_text": text,
                "correct_answer": answer,
                "distractors": ["cord", "bald"]
            })
        };

        let report = run(
            &v,
            vec![
                ladder("BOLD → ? → CORD", "cold"),
                ladder("CAME → ? → LIME", "lame"),
                ladder("Try this one: CAME -> ? -> LIME", "LAME"),
            ],
            ctx(TopicKind::WordLadders, 4),
        )
        .await;

        assert_eq!(report.stats.accepted, 1);
        assert_eq!(report.stats.duplicates, 2);
        assert_eq!(report.skipped_questions[0].verdict.existing_question_id, Some(4));
        assert!(report.skipped_questions[1]
            .verdict
            .reason
            .as_deref()
            .unwrap()
            .contains("earlier in this generation run"));
    }

    #[tokio::test]
    async fn anagram_rewrite_replaces_question_fields() {
        let v = validator();
        let report = run(
            &v,
            vec![json!({
                "question_text": "He carried the apples home in a BASKET.",
                "correct_answer": "placeholder",
                "distractors": ["x", "y"],
                "explanation": "Unscramble the word."
            })],
            ctx(TopicKind::Anagram, 3),
        )
        .await;

        assert_eq!(report.stats.accepted, 1);
        let q = &report.valid_questions[0];
        assert_eq!(q.correct_answer, "BASKET");
        assert_eq!(q.distractors.len(), 4);
        assert!(!q.question_text.starts_with("He carried the apples home in a BASKET"));
        assert!(q.question_text.contains("\nA) "));
        assert!(q.question_text.contains("\nE) "));
    }
}
