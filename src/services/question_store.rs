use crate::error::{Error, Result};
use crate::models::question::NewQuestion;
use crate::models::topic::{DifficultyLevel, Topic};
use crate::services::similarity::normalize_answer;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    Approved,
    Pending,
}

impl QuestionSource {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionSource::Approved => "approved",
            QuestionSource::Pending => "pending",
        }
    }
}

/// Storage the generation pipeline reads from and writes to.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn find_topic_by_name(&self, name: &str) -> Result<Option<Topic>>;

    async fn find_difficulty_by_label(&self, label: &str) -> Result<Option<DifficultyLevel>>;

    async fn list_difficulty_labels(&self) -> Result<Vec<String>>;

    /// Id of a question in `topic_id` whose normalized answer equals `normalized_answer`.
    async fn find_answer_match(
        &self,
        source: QuestionSource,
        topic_id: i64,
        normalized_answer: &str,
    ) -> Result<Option<i64>>;

    async fn question_texts(&self, source: QuestionSource, topic_id: i64)
        -> Result<Vec<(i64, String)>>;

    async fn insert_pending(&self, question: &NewQuestion) -> Result<i64>;
}

#[derive(Debug, Clone)]
pub struct StoredQuestion {
    pub id: i64,
    pub topic_id: i64,
    pub question_text: String,
    pub correct_answer: String,
}

#[derive(Default)]
struct MemoryState {
    topics: Vec<Topic>,
    difficulties: Vec<DifficultyLevel>,
    approved: Vec<StoredQuestion>,
    pending: Vec<NewQuestion>,
    fail_lookups: bool,
}

/// Process-local store for offline runs and tests.
#[derive(Default)]
pub struct InMemoryQuestionStore {
    state: Mutex<MemoryState>,
}

impl InMemoryQuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the four validated topics and three difficulty levels.
    pub fn with_default_catalog() -> Self {
        let store = Self::new();
        for (id, name) in [
            (1, "Rule"),
            (2, "Word Pair"),
            (3, "Anagram"),
            (4, "Word Ladders"),
        ] {
            store.add_topic(id, name);
        }
        for (id, label) in [(1, "Easy"), (2, "Medium"), (3, "Hard")] {
            store.add_difficulty(id, label);
        }
        store
    }

    pub fn add_topic(&self, topic_id: i64, topic_name: &str) {
        self.lock().topics.push(Topic {
            topic_id,
            topic_name: topic_name.to_string(),
        });
    }

    pub fn add_difficulty(&self, difficulty_id: i64, label: &str) {
        self.lock().difficulties.push(DifficultyLevel {
            difficulty_id,
            label: label.to_string(),
        });
    }

    pub fn add_approved(&self, question: StoredQuestion) {
        self.lock().approved.push(question);
    }

    pub fn pending(&self) -> Vec<NewQuestion> {
        self.lock().pending.clone()
    }

    /// Makes every duplicate lookup fail, to exercise fail-open paths.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.lock().fail_lookups = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("question store mutex poisoned")
    }

    fn rows(state: &MemoryState, source: QuestionSource, topic_id: i64) -> Vec<StoredQuestion> {
        match source {
            QuestionSource::Approved => state
                .approved
                .iter()
                .filter(|q| q.topic_id == topic_id)
                .cloned()
                .collect(),
            QuestionSource::Pending => state
                .pending
                .iter()
                .enumerate()
                .filter(|(_, q)| q.topic_id == topic_id)
                .map(|(idx, q)| StoredQuestion {
                    id: idx as i64 + 1,
                    topic_id: q.topic_id,
                    question_text: q.question_text.clone(),
                    correct_answer: q.correct_answer.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl QuestionStore for InMemoryQuestionStore {
    async fn find_topic_by_name(&self, name: &str) -> Result<Option<Topic>> {
        Ok(self
            .lock()
            .topics
            .iter()
            .find(|t| t.topic_name.trim().eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    async fn find_difficulty_by_label(&self, label: &str) -> Result<Option<DifficultyLevel>> {
        Ok(self
            .lock()
            .difficulties
            .iter()
            .find(|d| d.label.trim().eq_ignore_ascii_case(label.trim()))
            .cloned())
    }

    async fn list_difficulty_labels(&self) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .difficulties
            .iter()
            .map(|d| d.label.clone())
            .collect())
    }

    async fn find_answer_match(
        &self,
        source: QuestionSource,
        topic_id: i64,
        normalized_answer: &str,
    ) -> Result<Option<i64>> {
        let state = self.lock();
        if state.fail_lookups {
            return Err(Error::Internal("question store unavailable".to_string()));
        }
        Ok(Self::rows(&state, source, topic_id)
            .into_iter()
            .find(|q| normalize_answer(&q.correct_answer) == normalized_answer)
            .map(|q| q.id))
    }

    async fn question_texts(
        &self,
        source: QuestionSource,
        topic_id: i64,
    ) -> Result<Vec<(i64, String)>> {
        let state = self.lock();
        if state.fail_lookups {
            return Err(Error::Internal("question store unavailable".to_string()));
        }
        Ok(Self::rows(&state, source, topic_id)
            .into_iter()
            .map(|q| (q.id, q.question_text))
            .collect())
    }

    async fn insert_pending(&self, question: &NewQuestion) -> Result<i64> {
        let mut state = self.lock();
        state.pending.push(question.clone());
        Ok(state.pending.len() as i64)
    }
}
