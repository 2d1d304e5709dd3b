use crate::config::GenerationSettings;
use crate::error::{Error, Result};
use crate::models::question::NewQuestion;
use crate::models::topic::{DifficultyLevel, Topic};
use crate::models::verdict::SkippedQuestion;
use crate::services::ai_service::{BatchRequest, CompletionSource};
use crate::services::batch_validator::{BatchContext, BatchValidator};
use crate::services::prompt_service::{PromptLibrary, SYSTEM_INSTRUCTION};
use crate::services::question_store::QuestionStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct GenerationTarget {
    pub topic: Topic,
    pub difficulty: DifficultyLevel,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct GenerationStats {
    pub total_generated: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub attempts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedInsert {
    pub question: NewQuestion,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub topic: String,
    pub difficulty: String,
    pub requested: usize,
    pub stats: GenerationStats,
    pub saved: Vec<i64>,
    pub failed: Vec<FailedInsert>,
    pub skipped: Vec<SkippedQuestion>,
}

#[derive(Clone)]
pub struct GenerationService {
    store: Arc<dyn QuestionStore>,
    prompts: Arc<PromptLibrary>,
    source: Arc<dyn CompletionSource>,
    validator: BatchValidator,
}

impl GenerationService {
    pub fn new(
        store: Arc<dyn QuestionStore>,
        prompts: Arc<PromptLibrary>,
        source: Arc<dyn CompletionSource>,
        validator: BatchValidator,
    ) -> Self {
        Self {
            store,
            prompts,
            source,
            validator,
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Requests batches until `requested` candidates are accepted or the
    /// attempt budget is spent, then stores the accepted ones as pending
    /// questions.
    ///
    /// A batch that accepts nothing ends the loop only once something has
    /// already been accepted; a failed completion request counts as an
    /// attempt that produced no candidates.
    pub async fn generate(
        &self,
        target: &GenerationTarget,
        requested: usize,
        settings: &GenerationSettings,
    ) -> Result<GenerationOutcome> {
        let per_batch = settings.max_questions_per_batch.max(1);
        let requested = requested.clamp(1, per_batch);
        let topic_key = target.topic.key();
        let difficulty_key = target.difficulty.key();
        let template = self.prompts.template(&topic_key, &difficulty_key)?;

        let ctx = BatchContext {
            topic_id: target.topic.topic_id,
            difficulty_id: target.difficulty.difficulty_id,
            topic_kind: target.topic.kind(),
        };

        tracing::info!(
            topic = %target.topic.topic_name,
            difficulty = %target.difficulty.label,
            requested,
            source = self.source.name(),
            "starting question generation"
        );

        let mut stats = GenerationStats::default();
        let mut accepted: Vec<NewQuestion> = Vec::new();
        let mut skipped: Vec<SkippedQuestion> = Vec::new();
        let mut seen_answers: HashSet<String> = HashSet::new();

        for attempt in 1..=settings.max_attempts {
            stats.attempts = attempt;
            let shortfall = requested - accepted.len();
            let batch_size = (shortfall * 2).min(per_batch);
            let request = BatchRequest {
                topic_key: topic_key.clone(),
                topic_kind: ctx.topic_kind,
                difficulty_key: difficulty_key.clone(),
                count: batch_size,
                system_instruction: SYSTEM_INSTRUCTION.to_string(),
                user_prompt: template.build_user_prompt(batch_size),
            };

            let raw = match self.source.request_batch(&request).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "completion request failed");
                    Vec::new()
                }
            };

            let report = self
                .validator
                .validate_batch(raw, ctx, settings.similarity_threshold, &mut seen_answers)
                .await;
            stats.total_generated += report.stats.total;
            stats.rejected += report.stats.rejected;
            stats.duplicates += report.stats.duplicates;
            let batch_accepted = report.stats.accepted;
            accepted.extend(report.valid_questions);
            skipped.extend(report.skipped_questions);

            tracing::info!(
                attempt,
                batch_size,
                batch_accepted,
                total_accepted = accepted.len(),
                "generation batch validated"
            );

            if accepted.len() >= requested {
                break;
            }
            if batch_accepted == 0 && !accepted.is_empty() {
                tracing::info!(attempt, "batch accepted nothing, stopping early");
                break;
            }
        }

        accepted.truncate(requested);
        stats.accepted = accepted.len();

        if accepted.is_empty() {
            tracing::error!(
                topic = %target.topic.topic_name,
                attempts = stats.attempts,
                "no valid questions generated"
            );
            return Err(Error::NoValidQuestions {
                attempts: stats.attempts,
            });
        }

        let mut saved = Vec::with_capacity(accepted.len());
        let mut failed = Vec::new();
        for question in accepted {
            match self.store.insert_pending(&question).await {
                Ok(id) => saved.push(id),
                Err(e) => {
                    tracing::error!(error = %e, "failed to store pending question");
                    failed.push(FailedInsert {
                        question,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            saved = saved.len(),
            failed = failed.len(),
            attempts = stats.attempts,
            "question generation finished"
        );

        Ok(GenerationOutcome {
            topic: target.topic.topic_name.clone(),
            difficulty: target.difficulty.label.clone(),
            requested,
            stats,
            saved,
            failed,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ai_service::{MockCompletionSource, StaticCompletionSource};
    use crate::services::duplicate_service::DuplicateDetector;
    use crate::services::eval_service::EvaluatorRegistry;
    use crate::services::lexicon::PermissiveOracle;
    use crate::services::question_store::InMemoryQuestionStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PROMPTS: &str = r#"
[[prompts]]
topic = "synonyms"
difficulty = "easy"
system_message = "Write synonym questions."
few_shot_examples = "big -> large"
assignment = "Keep it simple."

[[prompts]]
topic = "rule"
difficulty = "easy"
system_message = "Write rule questions."
few_shot_examples = "tap (pod) nod son (?) rib"
assignment = "Use three-letter words."
"#;

    fn service(store: Arc<InMemoryQuestionStore>, source: Arc<dyn CompletionSource>) -> GenerationService {
        let validator = BatchValidator::new(
            Arc::new(PermissiveOracle),
            EvaluatorRegistry::native(),
            DuplicateDetector::new(store.clone()),
        );
        GenerationService::new(
            store,
            Arc::new(PromptLibrary::from_toml(PROMPTS).unwrap()),
            source,
            validator,
        )
    }

    fn synonyms_target() -> GenerationTarget {
        GenerationTarget {
            topic: Topic {
                topic_id: 9,
                topic_name: "Synonyms".into(),
            },
            difficulty: DifficultyLevel {
                difficulty_id: 1,
                label: "Easy".into(),
            },
        }
    }

    fn unique_candidate(n: usize) -> serde_json::Value {
        json!({
            "question_text": format!("Which word means the same as item{}?", n),
            "correct_answer": format!("answer{}", n),
            "distractors": ["wrong", "other"],
            "explanation": "Synonyms."
        })
    }

    fn unique_source() -> MockCompletionSource {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut source = MockCompletionSource::new();
        source.expect_name().return_const("mock");
        source.expect_request_batch().returning(move |req| {
            Ok((0..req.count)
                .map(|_| unique_candidate(counter.fetch_add(1, Ordering::SeqCst)))
                .collect())
        });
        source
    }

    #[tokio::test]
    async fn returns_exactly_requested_and_stops_early() {
        let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
        let counter = Arc::new(AtomicUsize::new(0));
        let mut source = MockCompletionSource::new();
        source.expect_name().return_const("mock");
        source
            .expect_request_batch()
            .times(1)
            .returning(move |req| {
                assert_eq!(req.count, 8);
                assert!(req.user_prompt.ends_with("Generate exactly 8 questions in JSON format."));
                Ok((0..req.count)
                    .map(|_| unique_candidate(counter.fetch_add(1, Ordering::SeqCst)))
                    .collect())
            });
        let service = service(store.clone(), Arc::new(source));

        let outcome = service
            .generate(&synonyms_target(), 4, &GenerationSettings::default())
            .await
            .unwrap();

        assert_eq!(outcome.saved.len(), 4);
        assert_eq!(outcome.stats.accepted, 4);
        assert_eq!(outcome.stats.total_generated, 8);
        assert_eq!(outcome.stats.attempts, 1);
        assert_eq!(store.pending().len(), 4);
        assert!(store.pending().iter().all(|q| q.topic_id == 9 && q.is_llm_generated));
    }

    #[tokio::test]
    async fn unusable_source_fails_after_five_attempts() {
        let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
        let mut source = MockCompletionSource::new();
        source.expect_name().return_const("mock");
        source
            .expect_request_batch()
            .times(5)
            .returning(|_| Ok(vec![json!({"question_text": "no answer"})]));
        let service = service(store.clone(), Arc::new(source));

        let err = service
            .generate(&synonyms_target(), 3, &GenerationSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoValidQuestions { attempts: 5 }));
        assert!(store.pending().is_empty());
    }

    #[tokio::test]
    async fn completion_errors_count_as_empty_attempts() {
        let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
        let mut source = MockCompletionSource::new();
        source.expect_name().return_const("mock");
        source
            .expect_request_batch()
            .times(5)
            .returning(|_| Err(Error::Internal("upstream down".into())));
        let service = service(store, Arc::new(source));

        let err = service
            .generate(&synonyms_target(), 2, &GenerationSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoValidQuestions { attempts: 5 }));
    }

    #[tokio::test]
    async fn empty_batch_after_progress_stops_the_loop() {
        let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
        let mut source = MockCompletionSource::new();
        source.expect_name().return_const("mock");
        // The same candidate every time: the second batch only holds a repeat.
        source
            .expect_request_batch()
            .times(2)
            .returning(|_| Ok(vec![unique_candidate(1)]));
        let service = service(store, Arc::new(source));

        let outcome = service
            .generate(&synonyms_target(), 3, &GenerationSettings::default())
            .await
            .unwrap();
        assert_eq!(outcome.saved.len(), 1);
        assert_eq!(outcome.stats.attempts, 2);
        assert_eq!(outcome.stats.duplicates, 1);
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[tokio::test]
    async fn requested_count_is_capped_by_settings() {
        let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
        let service = service(store, Arc::new(unique_source()));
        let settings = GenerationSettings {
            max_questions_per_batch: 3,
            ..GenerationSettings::default()
        };

        let outcome = service.generate(&synonyms_target(), 50, &settings).await.unwrap();
        assert_eq!(outcome.requested, 3);
        assert_eq!(outcome.saved.len(), 3);
        assert_eq!(outcome.stats.total_generated, 3);
    }

    #[tokio::test]
    async fn missing_prompt_template_is_fatal() {
        let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
        let mut source = MockCompletionSource::new();
        source.expect_name().return_const("mock");
        source.expect_request_batch().never();
        let service = service(store, Arc::new(source));
        let mut target = synonyms_target();
        target.difficulty.label = "Hard".into();

        let err = service
            .generate(&target, 2, &GenerationSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn static_source_feeds_rule_questions_through_validation() {
        let store = Arc::new(InMemoryQuestionStore::with_default_catalog());
        let service = service(store.clone(), Arc::new(StaticCompletionSource::new()));
        let target = GenerationTarget {
            topic: Topic {
                topic_id: 1,
                topic_name: "Rule".into(),
            },
            difficulty: DifficultyLevel {
                difficulty_id: 1,
                label: "Easy".into(),
            },
        };

        let outcome = service
            .generate(&target, 3, &GenerationSettings::default())
            .await
            .unwrap();
        assert_eq!(outcome.saved.len(), 3);
        let answers: HashSet<String> = store
            .pending()
            .into_iter()
            .map(|q| q.correct_answer)
            .collect();
        assert_eq!(answers.len(), 3);
    }
}
