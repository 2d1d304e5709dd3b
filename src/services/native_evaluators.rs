use crate::models::topic::TopicKind;
use crate::services::eval_service::{EvaluatorError, TopicEvaluator};
use crate::services::extractors::TopicPayload;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, HashSet};

const ANAGRAM_DISTRACTORS: usize = 4;
const MAX_JUMBLE_ATTEMPTS: usize = 100;

fn wrong_payload(topic: TopicKind) -> EvaluatorError {
    EvaluatorError::new(topic, "payload does not belong to this topic")
}

/// The unsolved set must build its middle word from the same letter
/// positions of its outer words as the solved set does.
pub struct RuleEvaluator;

#[async_trait]
impl TopicEvaluator for RuleEvaluator {
    async fn evaluate(&self, payload: &TopicPayload) -> Result<JsonValue, EvaluatorError> {
        let TopicPayload::Rule {
            solved_set,
            unsolved_set,
        } = payload
        else {
            return Err(wrong_payload(TopicKind::Rule));
        };
        check_rule(solved_set, unsolved_set)
            .map_err(|msg| EvaluatorError::new(TopicKind::Rule, msg))?;
        Ok(json!({}))
    }
}

#[derive(Default)]
struct OuterPositions {
    front: HashSet<usize>,
    back: HashSet<usize>,
}

fn letter_positions(front: &[char], middle: &[char], back: &[char]) -> HashMap<char, OuterPositions> {
    let mut positions: HashMap<char, OuterPositions> = HashMap::new();
    for &letter in middle {
        let entry = positions.entry(letter).or_default();
        entry.front.extend(front.iter().enumerate().filter(|&(_, &c)| c == letter).map(|(i, _)| i));
        entry.back.extend(back.iter().enumerate().filter(|&(_, &c)| c == letter).map(|(i, _)| i));
    }
    positions
}

pub fn check_rule(solved: &[String], unsolved: &[String]) -> Result<(), String> {
    if solved.len() != 3 || unsolved.len() != 3 {
        return Err("solved and unsolved sets must have three words each".to_string());
    }
    let s: Vec<Vec<char>> = solved.iter().map(|w| w.chars().collect()).collect();
    let u: Vec<Vec<char>> = unsolved.iter().map(|w| w.chars().collect()).collect();
    if s[1].len() != u[1].len() {
        return Err("solved and unsolved middle words differ in length".to_string());
    }

    let solved_positions = letter_positions(&s[0], &s[1], &s[2]);
    let unsolved_positions = letter_positions(&u[0], &u[1], &u[2]);
    let empty = OuterPositions::default();

    for (solved_letter, unsolved_letter) in s[1].iter().zip(u[1].iter()) {
        let p1 = solved_positions.get(solved_letter).unwrap_or(&empty);
        let p2 = unsolved_positions.get(unsolved_letter).unwrap_or(&empty);

        let front_ok = !p1.front.is_empty() && !p2.front.is_empty() && p2.front.is_subset(&p1.front);
        let back_ok = !p1.back.is_empty() && !p2.back.is_empty() && p2.back.is_subset(&p1.back);
        if !(front_ok || back_ok) {
            return Err("solved and unsolved sets do not follow the same rule".to_string());
        }
    }
    Ok(())
}

/// Three (base, derived) pairs must take their letters from the same
/// positions of the base word.
pub struct WordPairEvaluator;

#[async_trait]
impl TopicEvaluator for WordPairEvaluator {
    async fn evaluate(&self, payload: &TopicPayload) -> Result<JsonValue, EvaluatorError> {
        let TopicPayload::WordPair { set } = payload else {
            return Err(wrong_payload(TopicKind::WordPair));
        };
        check_word_pairs(set).map_err(|msg| EvaluatorError::new(TopicKind::WordPair, msg))?;
        Ok(json!({}))
    }
}

pub fn check_word_pairs(set: &[String]) -> Result<(), String> {
    if set.len() != 6 {
        return Err(format!("expected 6 words, found {}", set.len()));
    }
    let words: Vec<Vec<char>> = set.iter().map(|w| w.chars().collect()).collect();
    let pairs = [(&words[0], &words[1]), (&words[2], &words[3]), (&words[4], &words[5])];

    let base_lengths: HashSet<usize> = pairs.iter().map(|(b, _)| b.len()).collect();
    let derived_lengths: HashSet<usize> = pairs.iter().map(|(_, d)| d.len()).collect();
    if base_lengths.len() != 1 || derived_lengths.len() != 1 {
        return Err("length of words are inconsistent".to_string());
    }

    let mut mapped: Vec<Vec<HashSet<usize>>> = Vec::with_capacity(3);
    for (base, derived) in pairs {
        let positions: Vec<HashSet<usize>> = derived
            .iter()
            .map(|letter| {
                base.iter()
                    .enumerate()
                    .filter(|(_, c)| *c == letter)
                    .map(|(i, _)| i)
                    .collect::<HashSet<usize>>()
            })
            .filter(|p| !p.is_empty())
            .collect();
        if positions.len() != derived.len() {
            return Err("inconsistent letter mapping".to_string());
        }
        mapped.push(positions);
    }

    for i in 0..mapped[0].len() {
        let (first, second, third) = (&mapped[0][i], &mapped[1][i], &mapped[2][i]);
        let consistent = !first.is_disjoint(second)
            && !first.is_disjoint(third)
            && !second.is_disjoint(third);
        if !consistent {
            return Err(format!(
                "letter positions are inconsistent across pairs at position {}",
                i + 1
            ));
        }
    }
    Ok(())
}

/// Each step of the ladder changes exactly one letter.
pub struct WordLadderEvaluator;

#[async_trait]
impl TopicEvaluator for WordLadderEvaluator {
    async fn evaluate(&self, payload: &TopicPayload) -> Result<JsonValue, EvaluatorError> {
        let TopicPayload::WordLadder { set } = payload else {
            return Err(wrong_payload(TopicKind::WordLadders));
        };
        for step in set.windows(2) {
            if !one_letter_change(&step[0], &step[1]) {
                return Err(EvaluatorError::new(
                    TopicKind::WordLadders,
                    format!("invalid transition: {} → {}", step[0], step[1]),
                ));
            }
        }
        Ok(json!({}))
    }
}

pub fn one_letter_change(from: &str, to: &str) -> bool {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    from.len() == to.len() && from.iter().zip(to.iter()).filter(|(a, b)| a != b).count() == 1
}

/// Rewrites an anagram candidate: the capitalised word is jumbled in the
/// sentence and four distinct jumbles become the distractors.
pub struct AnagramEvaluator;

#[async_trait]
impl TopicEvaluator for AnagramEvaluator {
    async fn evaluate(&self, payload: &TopicPayload) -> Result<JsonValue, EvaluatorError> {
        let TopicPayload::Anagram {
            question_text,
            answer_format,
            explanation,
            word,
        } = payload
        else {
            return Err(wrong_payload(TopicKind::Anagram));
        };
        let mut rng = rand::thread_rng();
        rewrite_anagram(&mut rng, question_text, answer_format, explanation, word)
            .map_err(|msg| EvaluatorError::new(TopicKind::Anagram, msg))
    }
}

fn jumble(rng: &mut impl Rng, word: &str, taken: &[String]) -> Result<String, String> {
    let mut letters: Vec<char> = word.chars().collect();
    for _ in 0..MAX_JUMBLE_ATTEMPTS {
        letters.shuffle(rng);
        let candidate: String = letters.iter().collect();
        if candidate != word && !taken.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(format!("unable to generate a unique jumble of {}", word))
}

fn sorted_letters(word: &str) -> Vec<char> {
    let mut letters: Vec<char> = word.chars().collect();
    letters.sort_unstable();
    letters
}

pub fn rewrite_anagram(
    rng: &mut impl Rng,
    question_text: &str,
    answer_format: &str,
    explanation: &str,
    word: &str,
) -> Result<JsonValue, String> {
    let mut distractors: Vec<String> = Vec::with_capacity(ANAGRAM_DISTRACTORS);
    while distractors.len() < ANAGRAM_DISTRACTORS {
        let next = jumble(rng, word, &distractors)?;
        distractors.push(next);
    }

    let mut options = distractors.clone();
    options.push(word.to_string());
    let unique: HashSet<&String> = options.iter().collect();
    if unique.len() != options.len() {
        return Err("duplicate words detected among options".to_string());
    }
    let expected = sorted_letters(word);
    if let Some(bad) = options.iter().find(|o| sorted_letters(o) != expected) {
        return Err(format!("{} is not an anagram of {}", bad, word));
    }

    let sentence = question_text.replacen(word, &distractors[0], 1);
    options.shuffle(rng);
    let listed = options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}) {}", (b'A' + i as u8) as char, option))
        .collect::<Vec<_>>()
        .join("\n");

    let explanation = if explanation.trim().is_empty() {
        "No explanation provided."
    } else {
        explanation
    };

    Ok(json!({
        "question_text": format!("{}\n\nWhich of the following is the correct answer?\n{}", sentence, listed),
        "answer_format": answer_format,
        "explanation": explanation,
        "correct_answer": word,
        "distractors": distractors,
    }))
}
