//! Pull the structured fields each topic validator needs out of free-form
//! question text.

use crate::models::question::CandidateQuestion;
use crate::models::topic::TopicKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Literal token marking the hidden word in rule and word-pair questions.
pub const PLACEHOLDER: &str = "(?)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicPayload {
    Rule {
        solved_set: Vec<String>,
        unsolved_set: Vec<String>,
    },
    /// `set` holds three (base, derived) pairs flattened in order.
    WordPair { set: Vec<String> },
    Anagram {
        question_text: String,
        answer_format: String,
        explanation: String,
        word: String,
    },
    WordLadder { set: Vec<String> },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExtractionError {
    #[error("rule question has no solved example in the form 'word (word) word'")]
    MissingSolvedSet,
    #[error("rule question has no unsolved pattern in the form 'word (?) word'")]
    MissingUnsolvedSet,
    #[error("word pair question has no '(?)' placeholder")]
    MissingPlaceholder,
    #[error("word pair question needs 5 words before the placeholder, found {0}")]
    TooFewPairWords(usize),
    #[error("anagram question has no capitalised word of at least 6 letters")]
    MissingAnagramWord,
    #[error("word ladder must have exactly 3 words, found {0}")]
    LadderLength(usize),
    #[error("word ladder question has no 'WORD → ? → WORD' pattern")]
    MissingLadder,
    #[error("topic '{0}' has no extractor")]
    Unsupported(TopicKind),
}

fn solved_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z]+)\s*\(([A-Za-z]+)\)\s*([A-Za-z]+)\b").expect("solved pattern")
    })
}

fn unsolved_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z]+)\s*\(\?\)\s*([A-Za-z]+)\b").expect("unsolved pattern"))
}

fn anagram_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Z]{6,})\b").expect("anagram pattern"))
}

fn ladder_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z]{4})\b\s*(?:→|->)\s*(?:\?|_+)\s*(?:→|->)\s*\b([A-Za-z]{4})\b")
            .expect("ladder pattern")
    })
}

pub fn extract(kind: TopicKind, question: &CandidateQuestion) -> Result<TopicPayload, ExtractionError> {
    match kind {
        TopicKind::Rule => extract_rule(question),
        TopicKind::WordPair => extract_word_pair(question),
        TopicKind::Anagram => extract_anagram(question),
        TopicKind::WordLadders => extract_word_ladder(question),
        TopicKind::Other => Err(ExtractionError::Unsupported(kind)),
    }
}

/// `tap (pod) nod son (?) rib` with answer `nib` gives
/// solved `[tap, pod, nod]` and unsolved `[son, nib, rib]`.
pub fn extract_rule(question: &CandidateQuestion) -> Result<TopicPayload, ExtractionError> {
    let text = question.question_text();
    let solved = solved_pattern()
        .captures(text)
        .ok_or(ExtractionError::MissingSolvedSet)?;
    let unsolved = unsolved_pattern()
        .captures(text)
        .ok_or(ExtractionError::MissingUnsolvedSet)?;

    Ok(TopicPayload::Rule {
        solved_set: vec![
            solved[1].to_lowercase(),
            solved[2].to_lowercase(),
            solved[3].to_lowercase(),
        ],
        unsolved_set: vec![
            unsolved[1].to_lowercase(),
            clean_word(question.correct_answer()),
            unsolved[2].to_lowercase(),
        ],
    })
}

pub fn extract_word_pair(question: &CandidateQuestion) -> Result<TopicPayload, ExtractionError> {
    let tokens: Vec<&str> = question.question_text().split_whitespace().collect();
    let placeholder_at = tokens
        .iter()
        .position(|t| t.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?')) == PLACEHOLDER)
        .ok_or(ExtractionError::MissingPlaceholder)?;

    if placeholder_at < 5 {
        return Err(ExtractionError::TooFewPairWords(placeholder_at));
    }

    let mut set: Vec<String> = tokens[placeholder_at - 5..placeholder_at]
        .iter()
        .map(|t| clean_word(t))
        .collect();
    set.push(clean_word(question.correct_answer()));
    Ok(TopicPayload::WordPair { set })
}

pub fn extract_anagram(question: &CandidateQuestion) -> Result<TopicPayload, ExtractionError> {
    let text = question.question_text();
    let word = anagram_pattern()
        .captures(text)
        .map(|c| c[1].to_string())
        .ok_or(ExtractionError::MissingAnagramWord)?;

    Ok(TopicPayload::Anagram {
        question_text: text.to_string(),
        answer_format: question
            .answer_format
            .clone()
            .unwrap_or_else(|| crate::models::question::DEFAULT_ANSWER_FORMAT.to_string()),
        explanation: question.explanation.clone().unwrap_or_default(),
        word,
    })
}

pub fn extract_word_ladder(question: &CandidateQuestion) -> Result<TopicPayload, ExtractionError> {
    if let Some(chain) = &question.word_chain {
        if chain.len() != 3 {
            return Err(ExtractionError::LadderLength(chain.len()));
        }
        return Ok(TopicPayload::WordLadder {
            set: chain.iter().map(|w| clean_word(w)).collect(),
        });
    }

    let caps = ladder_pattern()
        .captures(question.question_text())
        .ok_or(ExtractionError::MissingLadder)?;
    let set = vec![
        caps[1].to_lowercase(),
        clean_word(question.correct_answer()),
        caps[2].to_lowercase(),
    ];
    if set.iter().any(|w| w.is_empty()) {
        return Err(ExtractionError::LadderLength(
            set.iter().filter(|w| !w.is_empty()).count(),
        ));
    }
    Ok(TopicPayload::WordLadder { set })
}

fn clean_word(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase()
}
