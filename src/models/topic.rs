use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Topic {
    pub topic_id: i64,
    pub topic_name: String,
}

impl Topic {
    /// Lookup key used for prompts and model overrides, e.g. "Word Ladders" -> "word_ladders".
    pub fn key(&self) -> String {
        topic_key(&self.topic_name)
    }

    pub fn kind(&self) -> TopicKind {
        TopicKind::from_key(&self.key())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DifficultyLevel {
    pub difficulty_id: i64,
    pub label: String,
}

impl DifficultyLevel {
    pub fn key(&self) -> String {
        self.label.trim().to_lowercase()
    }
}

/// Topic variants that carry a structural validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    Rule,
    WordPair,
    Anagram,
    WordLadders,
    Other,
}

impl TopicKind {
    pub fn from_key(key: &str) -> Self {
        match key {
            "rule" => TopicKind::Rule,
            "word_pair" => TopicKind::WordPair,
            "anagram" => TopicKind::Anagram,
            "word_ladders" => TopicKind::WordLadders,
            _ => TopicKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::Rule => "rule",
            TopicKind::WordPair => "word_pair",
            TopicKind::Anagram => "anagram",
            TopicKind::WordLadders => "word_ladders",
            TopicKind::Other => "other",
        }
    }
}

impl std::fmt::Display for TopicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn topic_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_keys_follow_names() {
        let topic = Topic {
            topic_id: 4,
            topic_name: "Word  Ladders".into(),
        };
        assert_eq!(topic.key(), "word_ladders");
        assert_eq!(topic.kind(), TopicKind::WordLadders);
        assert_eq!(TopicKind::from_key("synonyms"), TopicKind::Other);
    }
}
