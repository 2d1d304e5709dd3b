pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use crate::config::{Config, EvaluatorMode, GenerationSettings};
use crate::error::Result;
use crate::services::{
    ai_service::{CompletionSource, OpenAiCompletionSource, StaticCompletionSource},
    batch_validator::BatchValidator,
    duplicate_service::DuplicateDetector,
    eval_service::EvaluatorRegistry,
    generation_service::GenerationService,
    lexicon::{PermissiveOracle, WordListOracle, WordOracle},
    pending_question_service::PendingQuestionService,
    prompt_service::PromptLibrary,
    question_repository::PgQuestionStore,
    question_service::QuestionService,
    question_store::QuestionStore,
};
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub question_store: Arc<dyn QuestionStore>,
    pub generation_service: GenerationService,
    pub pending_question_service: PendingQuestionService,
    pub question_service: QuestionService,
    pub generation_settings: GenerationSettings,
}

impl AppState {
    /// Wires the production pipeline: Postgres store, OpenAI source when a key
    /// is configured, prompt file, word list and evaluators from `config`.
    pub async fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let store: Arc<dyn QuestionStore> = Arc::new(PgQuestionStore::new(pool.clone()));

        let source: Arc<dyn CompletionSource> = match &config.openai_api_key {
            Some(key) => {
                let http_client = Client::builder()
                    .timeout(Duration::from_secs(config.completion_timeout_secs))
                    .build()?;
                Arc::new(OpenAiCompletionSource::new(
                    http_client,
                    key.clone(),
                    config.openai_base_url.clone(),
                    config.llm.clone(),
                    Duration::from_secs(config.completion_timeout_secs),
                ))
            }
            None => {
                tracing::warn!("OPENAI_API_KEY not set, using static example questions");
                Arc::new(StaticCompletionSource::new())
            }
        };

        let prompts = PromptLibrary::load(&config.prompts_path).await?;

        let oracle: Arc<dyn WordOracle> = match &config.wordlist_path {
            Some(path) => Arc::new(WordListOracle::load(path).await?),
            None => {
                tracing::warn!("WORDLIST_PATH not set, every answer word is accepted");
                Arc::new(PermissiveOracle)
            }
        };

        let evaluators = match config.evaluator_mode {
            EvaluatorMode::Native => EvaluatorRegistry::native(),
            EvaluatorMode::External => {
                if !config.evaluator_dir.is_dir() {
                    tracing::warn!(dir = %config.evaluator_dir.display(), "evaluator directory does not exist");
                }
                EvaluatorRegistry::external(
                    &config.evaluator_program,
                    &config.evaluator_dir,
                    Duration::from_secs(config.evaluator_timeout_secs),
                )
            }
        };

        Ok(Self::assemble(
            pool,
            store,
            source,
            prompts,
            oracle,
            evaluators,
            config.generation_settings(),
        ))
    }

    pub fn assemble(
        pool: PgPool,
        store: Arc<dyn QuestionStore>,
        source: Arc<dyn CompletionSource>,
        prompts: PromptLibrary,
        oracle: Arc<dyn WordOracle>,
        evaluators: EvaluatorRegistry,
        generation_settings: GenerationSettings,
    ) -> Self {
        let validator =
            BatchValidator::new(oracle, evaluators, DuplicateDetector::new(store.clone()));
        let generation_service =
            GenerationService::new(store.clone(), Arc::new(prompts), source, validator);

        Self {
            pending_question_service: PendingQuestionService::new(pool.clone()),
            question_service: QuestionService::new(pool.clone()),
            question_store: store,
            generation_service,
            generation_settings,
            pool,
        }
    }
}
