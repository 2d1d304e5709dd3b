use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Upper bound on completion requests per generation call.
pub const MAX_GENERATION_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorMode {
    Native,
    External,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub topic_models: HashMap<String, String>,
}

impl LlmSettings {
    pub fn model_for_topic(&self, topic_key: &str) -> &str {
        self.topic_models
            .get(topic_key)
            .map(String::as_str)
            .unwrap_or(&self.model)
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 3000,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            topic_models: HashMap::new(),
        }
    }
}

/// Per-call knobs for the generation loop. Snapshotted once per request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub similarity_threshold: f64,
    pub max_questions_per_batch: usize,
    pub max_attempts: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            max_questions_per_batch: 20,
            max_attempts: MAX_GENERATION_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub prompts_path: PathBuf,
    pub wordlist_path: Option<PathBuf>,
    pub evaluator_mode: EvaluatorMode,
    pub evaluator_program: String,
    pub evaluator_dir: PathBuf,
    pub evaluator_timeout_secs: u64,
    pub completion_timeout_secs: u64,
    pub similarity_threshold: f64,
    pub max_questions_per_batch: usize,
    pub llm: LlmSettings,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let evaluator_mode = match get_env_or("EVALUATOR_MODE", "native").as_str() {
            "native" => EvaluatorMode::Native,
            "external" => EvaluatorMode::External,
            other => {
                return Err(Error::Config(format!(
                    "Invalid value for EVALUATOR_MODE: {} (expected native or external)",
                    other
                )))
            }
        };

        let mut topic_models = HashMap::new();
        for (topic_key, var) in [
            ("anagram", "ANAGRAM_MODEL"),
            ("rule", "RULE_MODEL"),
            ("word_ladders", "LADDER_MODEL"),
            ("word_pair", "PAIR_MODEL"),
        ] {
            if let Some(model) = get_env_opt(var) {
                topic_models.insert(topic_key.to_string(), model);
            }
        }

        let similarity_threshold: f64 = get_env_parse_or("QUESTION_SIMILARITY_THRESHOLD", 0.7)?;
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(Error::Config(
                "QUESTION_SIMILARITY_THRESHOLD must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            openai_api_key: get_env_opt("OPENAI_API_KEY"),
            openai_base_url: get_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            prompts_path: PathBuf::from(get_env_or("PROMPTS_PATH", "prompts/prompts.toml")),
            wordlist_path: get_env_opt("WORDLIST_PATH").map(PathBuf::from),
            evaluator_mode,
            evaluator_program: get_env_or("EVALUATOR_PROGRAM", "python3"),
            evaluator_dir: PathBuf::from(get_env_or("EVALUATOR_DIR", "evaluators")),
            evaluator_timeout_secs: get_env_parse_or("EVALUATOR_TIMEOUT_SECS", 30)?,
            completion_timeout_secs: get_env_parse_or("COMPLETION_TIMEOUT_SECS", 120)?,
            similarity_threshold,
            max_questions_per_batch: get_env_parse_or("MAX_QUESTIONS_PER_BATCH", 20)?,
            llm: LlmSettings {
                model: get_env_or("LLM_MODEL", "gpt-4o"),
                temperature: get_env_parse_or("LLM_TEMPERATURE", 0.7)?,
                max_tokens: get_env_parse_or("LLM_MAX_TOKENS", 3000)?,
                top_p: get_env_parse_or("LLM_TOP_P", 1.0)?,
                frequency_penalty: get_env_parse_or("LLM_FREQUENCY_PENALTY", 0.0)?,
                presence_penalty: get_env_parse_or("LLM_PRESENCE_PENALTY", 0.0)?,
                topic_models,
            },
        })
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            similarity_threshold: self.similarity_threshold,
            max_questions_per_batch: self.max_questions_per_batch.max(1),
            max_attempts: MAX_GENERATION_ATTEMPTS,
        }
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or(name: &str, default: &str) -> String {
    get_env_opt(name).unwrap_or_else(|| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
