use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::Path;

/// Answers whether a word is a real word.
pub trait WordOracle: Send + Sync {
    fn is_known_word(&self, word: &str) -> bool;
}

/// Word list loaded from a newline-separated file; lookups ignore case.
#[derive(Debug, Clone, Default)]
pub struct WordListOracle {
    words: HashSet<String>,
}

impl WordListOracle {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Cannot read word list {}: {}", path.display(), e))
        })?;
        let oracle = Self::from_words(contents.lines());
        tracing::info!(path = %path.display(), words = oracle.len(), "word list loaded");
        Ok(oracle)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl WordOracle for WordListOracle {
    fn is_known_word(&self, word: &str) -> bool {
        self.words.contains(&word.trim().to_lowercase())
    }
}

/// Accepts every word. Used when no word list is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveOracle;

impl WordOracle for PermissiveOracle {
    fn is_known_word(&self, _word: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_list_is_case_insensitive() {
        let oracle = WordListOracle::from_words(["Lame", " nib ", ""]);
        assert_eq!(oracle.len(), 2);
        assert!(oracle.is_known_word("LAME"));
        assert!(oracle.is_known_word("nib"));
        assert!(!oracle.is_known_word("xqz"));
    }

    #[tokio::test]
    async fn load_reads_file_and_reports_missing() {
        let path = std::env::temp_dir().join(format!("words_{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "cat\ndog\n\nbird\n").await.unwrap();
        let oracle = WordListOracle::load(&path).await.unwrap();
        assert_eq!(oracle.len(), 3);
        tokio::fs::remove_file(&path).await.unwrap();

        let err = WordListOracle::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
