use crate::models::topic::TopicKind;
use crate::services::extractors::TopicPayload;
use crate::services::native_evaluators::{
    AnagramEvaluator, RuleEvaluator, WordLadderEvaluator, WordPairEvaluator,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{topic} validation failed: {message}")]
pub struct EvaluatorError {
    pub topic: TopicKind,
    pub message: String,
}

impl EvaluatorError {
    pub fn new(topic: TopicKind, message: impl Into<String>) -> Self {
        Self {
            topic,
            message: message.into(),
        }
    }
}

/// Structural check for one topic. The returned JSON replaces fields of the
/// candidate for anagrams; other topics only use success or failure.
#[async_trait]
pub trait TopicEvaluator: Send + Sync {
    async fn evaluate(&self, payload: &TopicPayload) -> Result<JsonValue, EvaluatorError>;
}

#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<TopicKind, Arc<dyn TopicEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// In-process evaluators for all four validated topics.
    pub fn native() -> Self {
        let mut registry = Self::new();
        registry.register(TopicKind::Rule, Arc::new(RuleEvaluator));
        registry.register(TopicKind::WordPair, Arc::new(WordPairEvaluator));
        registry.register(TopicKind::Anagram, Arc::new(AnagramEvaluator));
        registry.register(TopicKind::WordLadders, Arc::new(WordLadderEvaluator));
        registry
    }

    /// One evaluator script per topic under `script_dir`, run with `program`.
    pub fn external(program: &str, script_dir: &Path, timeout: Duration) -> Self {
        let mut registry = Self::new();
        for (kind, script) in [
            (TopicKind::Rule, "rule_eval.py"),
            (TopicKind::WordPair, "pair_eval.py"),
            (TopicKind::Anagram, "anagram.py"),
            (TopicKind::WordLadders, "ladder_eval.py"),
        ] {
            registry.register(
                kind,
                Arc::new(ProcessEvaluator::new(
                    kind,
                    program,
                    script_dir.join(script),
                    timeout,
                )),
            );
        }
        registry
    }

    pub fn register(&mut self, kind: TopicKind, evaluator: Arc<dyn TopicEvaluator>) {
        self.evaluators.insert(kind, evaluator);
    }

    pub fn get(&self, kind: TopicKind) -> Option<Arc<dyn TopicEvaluator>> {
        self.evaluators.get(&kind).cloned()
    }
}

/// Runs an external evaluator: `<program> <script> <input.json>`, expecting a
/// single JSON value on stdout.
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    topic: TopicKind,
    program: String,
    script: PathBuf,
    timeout: Duration,
    scratch_dir: PathBuf,
}

impl ProcessEvaluator {
    pub fn new(topic: TopicKind, program: &str, script: PathBuf, timeout: Duration) -> Self {
        Self {
            topic,
            program: program.to_string(),
            script,
            timeout,
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = dir;
        self
    }

    fn fail(&self, message: impl Into<String>) -> EvaluatorError {
        EvaluatorError::new(self.topic, message)
    }

    async fn run(&self, input_path: &Path) -> Result<JsonValue, EvaluatorError> {
        let child = Command::new(&self.program)
            .arg(&self.script)
            .arg(input_path)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return Err(self.fail(format!("failed to run evaluator: {}", e))),
            Err(_) => {
                return Err(self.fail(format!(
                    "evaluator timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !output.status.success() {
            return Err(self.fail(format!(
                "evaluator exited with {}: {}",
                output.status,
                if stderr.is_empty() { "no diagnostics" } else { stderr }
            )));
        }
        if !stderr.is_empty() {
            if is_warning_only(stderr) {
                tracing::warn!(topic = %self.topic, diagnostics = stderr, "evaluator warning");
            } else {
                return Err(self.fail(stderr.to_string()));
            }
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| self.fail(format!("evaluator output is not JSON: {}", e)))
    }
}

#[async_trait]
impl TopicEvaluator for ProcessEvaluator {
    async fn evaluate(&self, payload: &TopicPayload) -> Result<JsonValue, EvaluatorError> {
        let input_path = self
            .scratch_dir
            .join(format!("{}_input_{}.json", self.topic, uuid::Uuid::new_v4()));
        let body = serde_json::to_vec(payload)
            .map_err(|e| self.fail(format!("could not encode input: {}", e)))?;
        if let Err(e) = fs::write(&input_path, body).await {
            remove_input(&input_path).await;
            return Err(self.fail(format!("could not write input file: {}", e)));
        }

        let result = self.run(&input_path).await;
        remove_input(&input_path).await;
        result
    }
}

async fn remove_input(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = ?path, error = %e, "failed to remove evaluator input"),
    }
}

fn is_warning_only(diagnostics: &str) -> bool {
    diagnostics
        .lines()
        .filter(|l| !l.trim().is_empty())
        .all(|l| l.to_lowercase().contains("warning"))
}
