//! Prompt templates keyed by (topic key, difficulty key), loaded from TOML.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Fixed system instruction sent with every completion request.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant that generates educational questions.";

#[derive(Debug, Clone, Deserialize)]
struct PromptEntry {
    topic: String,
    difficulty: String,
    #[serde(default)]
    system_message: Option<String>,
    #[serde(default)]
    few_shot_examples: Option<String>,
    #[serde(default)]
    assignment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PromptDocument {
    #[serde(default)]
    prompts: Vec<PromptEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub system_message: String,
    pub few_shot_examples: String,
    pub assignment: String,
}

impl PromptTemplate {
    /// Template body followed by the explicit count line.
    pub fn build_user_prompt(&self, count: usize) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\nGenerate exactly {} questions in JSON format.",
            self.system_message.trim(),
            self.few_shot_examples.trim(),
            self.assignment.trim(),
            count
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    entries: Vec<PromptEntry>,
}

impl PromptLibrary {
    pub fn from_toml(source: &str) -> Result<Self> {
        let doc: PromptDocument = toml::from_str(source)
            .map_err(|e| Error::Config(format!("Invalid prompt document: {}", e)))?;
        Ok(Self {
            entries: doc.prompts,
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Cannot read prompts file {}: {}", path.display(), e))
        })?;
        let library = Self::from_toml(&source)?;
        tracing::info!(path = %path.display(), templates = library.len(), "prompt templates loaded");
        Ok(library)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup. A missing template, or a found template with an empty
    /// section, is a configuration error.
    pub fn template(&self, topic_key: &str, difficulty_key: &str) -> Result<PromptTemplate> {
        let entry = self
            .entries
            .iter()
            .find(|p| p.topic == topic_key && p.difficulty == difficulty_key)
            .ok_or_else(|| {
                Error::Config(format!(
                    "No prompt template for topic '{}' at difficulty '{}'",
                    topic_key, difficulty_key
                ))
            })?;

        let section = |value: &Option<String>, name: &str| -> Result<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "Prompt template {}/{} is missing {}",
                        topic_key, difficulty_key, name
                    ))
                })
        };

        Ok(PromptTemplate {
            system_message: section(&entry.system_message, "system_message")?,
            few_shot_examples: section(&entry.few_shot_examples, "few_shot_examples")?,
            assignment: section(&entry.assignment, "assignment")?,
        })
    }
}
