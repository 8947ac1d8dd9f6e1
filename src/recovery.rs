//! Hints for lines that could not be evaluated.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::math;
use crate::types::{PartialResult, RecoveryInfo};

const MAX_UNKNOWN_TOKENS: usize = 8;
const MAX_PARTIALS: usize = 5;
const MAX_SUGGESTIONS: usize = 5;

const STOPWORDS: [&str; 12] =
    ["and", "of", "on", "off", "each", "per", "at", "to", "in", "from", "next", "between"];

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_]+").unwrap());

/// Alphabetic runs left in the text, lowercased, in order of appearance.
pub fn find_unknown_tokens(input: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for m in WORD.find_iter(input) {
        let word = m.as_str().to_lowercase();
        if word.len() < 2 || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        if seen.insert(word.clone()) {
            out.push(word);
        }
        if out.len() == MAX_UNKNOWN_TOKENS {
            break;
        }
    }
    out
}

/// Evaluate whatever numeric fragments sit between the unknown words.
pub fn evaluate_partials(text: &str) -> Vec<PartialResult> {
    let mut out = Vec::new();
    for chunk in WORD.split(text).map(str::trim).filter(|c| !c.is_empty()) {
        if !chunk.chars().any(|c| c.is_ascii_digit() || c == '(' || c == ')') {
            continue;
        }
        if let Ok(value) = math::evaluate(chunk) {
            out.push(PartialResult { expr: chunk.to_string(), value });
        }
        if out.len() >= MAX_PARTIALS {
            break;
        }
    }
    out
}

static FOR_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfor\s+\d").unwrap());
static NUMBER_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b\d+(?:\.\d+)?\s+[a-z]").unwrap());
static AT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\s*\d").unwrap());
static PER_PHYSICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)/(?:kg|g|lb|oz|l|ml|m|cm|mm)\b").unwrap());
static PHYSICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:kg|g|lb|oz|l|ml|m|cm|mm)\b").unwrap());
static PERCENT_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bof\b|\bon\b|\boff\b").unwrap());
static RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\s*\.\.\s*\d+").unwrap());
static LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\s*,\s*\d+").unwrap());
static BETWEEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)between\s+").unwrap());
static NEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)next\s+").unwrap());

/// Rule-based hints keyed on what the raw line looks like.
pub fn build_suggestions(input: &str) -> Vec<String> {
    let mut s = Vec::new();
    if FOR_NUMBER.is_match(input) && NUMBER_WORD.is_match(input) {
        s.push("Try something like `5 bags for 400 USD` or `5 @ 80 USD`.".to_string());
    }
    if AT_NUMBER.is_match(input) && !PER_PHYSICAL.is_match(input) && PHYSICAL.is_match(input) {
        s.push("For a price per physical unit use `/kg`, `/g`, `/l`, e.g. `2.5 kg @ 15 BRL/kg`.".to_string());
    }
    if input.contains('%') && !PERCENT_WORDS.is_match(input) {
        s.push("Percentages: `10% of 250`, `15% on 200` or `20% off 300`.".to_string());
    }
    if RANGE.is_match(input) {
        s.push("To add up a range: `sum 1..10`. Average: `avg 1..10`.".to_string());
    }
    if LIST.is_match(input) {
        s.push("Lists: `sum 2, 5, 9` or `avg 2, 5, 9`.".to_string());
    }
    if BETWEEN.is_match(input) {
        s.push("Dates: `between 2024-01-03 and 2025-02-10` gives the duration.".to_string());
    }
    if NEXT.is_match(input) {
        s.push("Relative dates: `next monday + 3w`.".to_string());
    }
    s.truncate(MAX_SUGGESTIONS);
    s
}

/// Full recovery report for an "Invalid calculation".
pub fn recover(raw_input: &str, normalized: &str, with_partials: bool) -> RecoveryInfo {
    let trimmed = normalized.trim();
    RecoveryInfo {
        unknown_tokens: find_unknown_tokens(normalized),
        partial: if with_partials { evaluate_partials(normalized) } else { Vec::new() },
        suggestions: build_suggestions(raw_input),
        normalized_expression: (!trimmed.is_empty()).then(|| trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tokens_skip_stopwords() {
        assert_eq!(find_unknown_tokens("5 apples and 3 pears of x"), vec!["apples", "pears"]);
        let many = "aa bb cc dd ee ff gg hh ii jj";
        assert_eq!(find_unknown_tokens(many).len(), 8);
        assert_eq!(find_unknown_tokens("Foo foo FOO"), vec!["foo"]);
    }

    #[test]
    fn test_partials() {
        let partial = evaluate_partials("2 + 3 banana 4 * 5");
        assert_eq!(partial.len(), 2);
        assert_eq!(partial[0], PartialResult { expr: "2 + 3".into(), value: 5.0 });
        assert_eq!(partial[1].value, 20.0);
    }

    #[test]
    fn test_suggestions() {
        let hints = build_suggestions("5 bags for 400 zzz");
        assert!(hints[0].contains("5 bags for 400 USD"));
        assert!(build_suggestions("12% blah").iter().any(|h| h.contains("10% of 250")));
        assert!(build_suggestions("between x and y").iter().any(|h| h.starts_with("Dates")));
        assert!(build_suggestions("2 + 2").is_empty());
    }

    #[test]
    fn test_recover_report() {
        let info = recover("5 zorbs + 2", "5 zorbs + 2", true);
        assert_eq!(info.unknown_tokens, vec!["zorbs"]);
        assert_eq!(info.normalized_expression.as_deref(), Some("5 zorbs + 2"));
        let values: Vec<f64> = info.partial.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5.0, 2.0]);
    }
}
