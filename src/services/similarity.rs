use std::collections::HashSet;

/// Word-overlap (Jaccard) score between two texts.
///
/// Tokens are whitespace separated; tokens of two characters or fewer are
/// ignored. Comparison is case-sensitive, so callers normalize first.
/// Returns 0.0 when neither text has a usable token.
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = token_set(a);
    let right = token_set(b);

    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    intersection as f64 / union as f64
}

fn token_set(text: &str) -> HashSet<&str> {
    text.split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .collect()
}

/// Lowercases, replaces punctuation with spaces and collapses whitespace.
pub fn normalize_question_text(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    collapse_whitespace(&cleaned)
}

/// Case- and whitespace-insensitive form of an answer.
pub fn normalize_answer(answer: &str) -> String {
    collapse_whitespace(&answer.to_lowercase())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
