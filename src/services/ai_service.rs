use crate::config::LlmSettings;
use crate::error::Result;
use crate::models::topic::TopicKind;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One completion request: a system instruction plus the user prompt that
/// already ends with the requested count.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub topic_key: String,
    pub topic_kind: TopicKind,
    pub difficulty_key: String,
    pub count: usize,
    pub system_instruction: String,
    pub user_prompt: String,
}

/// Produces raw, unvalidated question candidates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionSource: Send + Sync {
    async fn request_batch(&self, request: &BatchRequest) -> Result<Vec<JsonValue>>;

    fn name(&self) -> &'static str;
}

/// Chat completion client for an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompletionSource {
    client: Client,
    api_key: String,
    base_url: String,
    llm: LlmSettings,
    timeout: Duration,
}

impl OpenAiCompletionSource {
    pub fn new(
        client: Client,
        api_key: String,
        base_url: String,
        llm: LlmSettings,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            llm,
            timeout,
        }
    }

    pub fn build_payload(&self, request: &BatchRequest) -> JsonValue {
        json!({
            "model": self.llm.model_for_topic(&request.topic_key),
            "messages": [
                {"role": "system", "content": request.system_instruction},
                {"role": "user", "content": request.user_prompt}
            ],
            "temperature": self.llm.temperature,
            "max_tokens": self.llm.max_tokens,
            "top_p": self.llm.top_p,
            "frequency_penalty": self.llm.frequency_penalty,
            "presence_penalty": self.llm.presence_penalty,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "question_batch",
                    "strict": true,
                    "schema": question_batch_schema()
                }
            }
        })
    }

    async fn chat_openai(&self, payload: JsonValue) -> Result<JsonValue> {
        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("OpenAI API Error {}: {}", status, text).into());
        }

        let body: JsonValue = res.json().await?;

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .and_then(|s| serde_json::from_str(s).ok())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response format").into())
    }
}

#[async_trait]
impl CompletionSource for OpenAiCompletionSource {
    async fn request_batch(&self, request: &BatchRequest) -> Result<Vec<JsonValue>> {
        tracing::info!(
            topic = %request.topic_key,
            difficulty = %request.difficulty_key,
            count = request.count,
            model = self.llm.model_for_topic(&request.topic_key),
            "requesting completion batch"
        );
        let content = self.chat_openai(self.build_payload(request)).await?;
        extract_questions(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Fixed JSON schema every completion must follow.
pub fn question_batch_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "question_text": {"type": "string"},
                        "answer_format": {"type": "string", "enum": ["multiple_choice"]},
                        "correct_answer": {"type": "string"},
                        "explanation": {"type": "string"},
                        "distractors": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["question_text", "answer_format", "correct_answer", "explanation", "distractors"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["questions"],
        "additionalProperties": false
    })
}

/// Accepts either a bare array or an object wrapping it in `questions`.
pub fn extract_questions(content: JsonValue) -> Result<Vec<JsonValue>> {
    match content {
        JsonValue::Array(items) => Ok(items),
        JsonValue::Object(mut obj) => match obj.remove("questions") {
            Some(JsonValue::Array(items)) => Ok(items),
            _ => Err(anyhow::anyhow!("Completion response has no questions array").into()),
        },
        _ => Err(anyhow::anyhow!("Completion response is not a JSON object or array").into()),
    }
}

/// Offline source used when no API key is configured. Cycles a small set of
/// known-good examples per topic to fill any requested count.
#[derive(Debug, Default)]
pub struct StaticCompletionSource {
    cursor: AtomicUsize,
}

impl StaticCompletionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn examples(kind: TopicKind) -> Vec<JsonValue> {
        match kind {
            TopicKind::Rule | TopicKind::Other => vec![
                rule_example("tap (pod) nod son (?) rib", "nib", &["bin", "nab", "sob", "rob"],
                    "Take the last letter of the first word and the last two letters of the third word."),
                rule_example("pin (pit) hat rod (?) cub", "rob", &["rub", "cod", "rid", "cob"],
                    "Take the first two letters of the first word and the last letter of the third word."),
                rule_example("cup (pen) hen him (?) fat", "mat", &["map", "hat", "fit", "him"],
                    "Take the last letter of the first word and the last two letters of the third word."),
            ],
            TopicKind::WordPair => vec![
                pair_example("bold (old) cart (art) feel (?)", "eel", &["fee", "elf", "lee"]),
                pair_example("slip (lip) brag (rag) clad (?)", "lad", &["cad", "lap", "lid"]),
                pair_example("scar (car) spin (pin) trip (?)", "rip", &["tip", "rap", "pit"]),
            ],
            TopicKind::Anagram => vec![
                anagram_example("The children were EXCITED about the school trip.", "EXCITED"),
                anagram_example("He carried the apples home in a BASKET.", "BASKET"),
                anagram_example("We planted tomatoes in the GARDEN behind the house.", "GARDEN"),
                anagram_example("Mars is the red PLANET next to Earth.", "PLANET"),
            ],
            TopicKind::WordLadders => vec![
                ladder_example("CAME → ? → LIME", "lame", &["lane", "came", "mime"]),
                ladder_example("BOLD → ? → CORD", "cold", &["bird", "cord", "bald"]),
                ladder_example("FAST → ? → LOST", "last", &["fist", "list", "lust"]),
                ladder_example("WARM → ? → WORD", "ward", &["worm", "card", "wore"]),
            ],
        }
    }
}

#[async_trait]
impl CompletionSource for StaticCompletionSource {
    async fn request_batch(&self, request: &BatchRequest) -> Result<Vec<JsonValue>> {
        let examples = Self::examples(request.topic_kind);
        let start = self.cursor.fetch_add(request.count, Ordering::Relaxed);
        tracing::info!(topic = %request.topic_key, count = request.count, "using static completion examples");
        Ok((0..request.count)
            .map(|i| examples[(start + i) % examples.len()].clone())
            .collect())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

fn rule_example(sets: &str, answer: &str, distractors: &[&str], explanation: &str) -> JsonValue {
    json!({
        "question_text": format!(
            "The words in the second set follow the same pattern as the first set. What word completes the second set? {}",
            sets
        ),
        "answer_format": "multiple_choice",
        "correct_answer": answer,
        "explanation": explanation,
        "distractors": distractors,
    })
}

fn pair_example(pairs: &str, answer: &str, distractors: &[&str]) -> JsonValue {
    json!({
        "question_text": format!(
            "Find the word that completes the third pair in the same way as the first two. {}",
            pairs
        ),
        "answer_format": "multiple_choice",
        "correct_answer": answer,
        "explanation": "Remove the first letter of the word.",
        "distractors": distractors,
    })
}

fn anagram_example(sentence: &str, word: &str) -> JsonValue {
    json!({
        "question_text": sentence,
        "answer_format": "multiple_choice",
        "correct_answer": word,
        "explanation": format!("The letters rearrange to spell {}.", word),
        "distractors": ["placeholder", "placeholder"],
    })
}

fn ladder_example(ladder: &str, answer: &str, distractors: &[&str]) -> JsonValue {
    json!({
        "question_text": format!(
            "Change one letter at a time to get from the first word to the last. {}",
            ladder
        ),
        "answer_format": "multiple_choice",
        "correct_answer": answer,
        "explanation": "Each step changes exactly one letter.",
        "distractors": distractors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: TopicKind, count: usize) -> BatchRequest {
        BatchRequest {
            topic_key: kind.as_str().to_string(),
            topic_kind: kind,
            difficulty_key: "easy".into(),
            count,
            system_instruction: "sys".into(),
            user_prompt: "prompt".into(),
        }
    }

    #[tokio::test]
    async fn static_source_cycles_to_fill_count() {
        let source = StaticCompletionSource::new();
        let batch = source.request_batch(&request(TopicKind::WordPair, 7)).await.unwrap();
        assert_eq!(batch.len(), 7);
        assert_eq!(batch[0], batch[3]);
        assert_eq!(batch[1], batch[4]);
    }

    #[test]
    fn payload_uses_topic_model_and_strict_schema() {
        let mut llm = LlmSettings::default();
        llm.topic_models.insert("anagram".into(), "gpt-4o-mini".into());
        let source = OpenAiCompletionSource::new(
            Client::new(),
            "key".into(),
            "https://example.invalid/v1/".into(),
            llm,
            Duration::from_secs(5),
        );
        let payload = source.build_payload(&request(TopicKind::Anagram, 4));
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["response_format"]["json_schema"]["strict"], true);
        let item = &payload["response_format"]["json_schema"]["schema"]["properties"]["questions"]["items"];
        assert_eq!(item["additionalProperties"], false);
        assert_eq!(item["required"].as_array().unwrap().len(), 5);

        let payload = source.build_payload(&request(TopicKind::Rule, 4));
        assert_eq!(payload["model"], "gpt-4o");
    }

    #[test]
    fn extract_questions_accepts_array_or_wrapper() {
        assert_eq!(extract_questions(json!([{"a": 1}])).unwrap().len(), 1);
        assert_eq!(
            extract_questions(json!({"questions": [{"a": 1}, {"b": 2}]})).unwrap().len(),
            2
        );
        assert!(extract_questions(json!({"items": []})).is_err());
        assert!(extract_questions(json!("text")).is_err());
    }
}
