//! Rule validator — meaning-preservation checks that run independently of
//! the similarity score.
//!
//! Each rule compares what the ORIGINAL asserts against what the CANDIDATE
//! retains: negations, conditional markers, named entities, numbers, and
//! core content nouns. Violations are cheap lexical findings, not
//! semantics — the similarity gate handles meaning drift the rules can't
//! see; the rules catch the specific drift embeddings are famously blind
//! to (a dropped "not" barely moves a similarity score).

use crate::overlap::stem;
use gradelit_core::RuleViolation;
use std::collections::HashSet;

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nothing", "neither", "nor", "cannot", "without",
];

const CONDITIONALS: &[&str] = &["if", "unless", "until", "whether", "otherwise", "except"];

/// Pronouns and function words that are capitalized mid-sentence without
/// being entities.
const NON_ENTITY_CAPITALS: &[&str] = &["I", "I'm", "I'll", "I've", "I'd", "God"];

fn raw_tokens(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

fn clean(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .to_string()
}

/// Lowercased token set of a text, with "n't" contractions expanded so
/// "don't" counts as a negation.
fn lower_set(text: &str) -> HashSet<String> {
    let mut set = HashSet::new();
    for token in raw_tokens(text) {
        let cleaned = clean(token).to_lowercase();
        if cleaned.is_empty() {
            continue;
        }
        if cleaned.ends_with("n't") {
            set.insert("not".to_string());
        }
        set.insert(cleaned);
    }
    set
}

/// Stemmed lowercased token set, for content-noun presence checks.
fn stemmed_set(text: &str) -> HashSet<String> {
    raw_tokens(text)
        .iter()
        .map(|t| clean(t).to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| stem(&t).to_string())
        .collect()
}

/// Capitalized tokens that are not sentence-initial: the entity heuristic.
fn named_entities(text: &str) -> Vec<String> {
    let tokens = raw_tokens(text);
    let mut entities = Vec::new();
    let mut sentence_start = true;

    for token in tokens {
        let cleaned = clean(token);
        if cleaned.is_empty() {
            continue;
        }
        let is_capitalized = cleaned.chars().next().is_some_and(char::is_uppercase);
        if is_capitalized && !sentence_start && !NON_ENTITY_CAPITALS.contains(&cleaned.as_str()) {
            entities.push(cleaned.clone());
        }
        sentence_start = token.ends_with(['.', '!', '?', ':']);
    }
    entities
}

/// Numeric tokens (digit-bearing) of a text.
fn numbers(text: &str) -> Vec<String> {
    raw_tokens(text)
        .iter()
        .map(|t| clean(t))
        .filter(|t| !t.is_empty() && t.chars().any(|c| c.is_ascii_digit()))
        .collect()
}

/// Core content nouns: the most frequent long tokens of the original.
/// Dropping one of these means dropping a subject the text is about.
fn content_nouns(text: &str) -> Vec<String> {
    use std::collections::HashMap;

    let mut freq: HashMap<String, usize> = HashMap::new();
    for token in raw_tokens(text) {
        let cleaned = clean(token).to_lowercase();
        if cleaned.len() >= 5 && !NEGATIONS.contains(&cleaned.as_str()) {
            *freq.entry(stem(&cleaned).to_string()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.len().cmp(&a.0.len())).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .take(3)
        .map(|(term, _)| term)
        .collect()
}

/// Validate a candidate rewrite against the original. Returns every rule
/// the candidate breaks; an empty result means a clean candidate.
pub fn validate(original: &str, candidate: &str) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    let orig_lower = lower_set(original);
    let cand_lower = lower_set(candidate);
    let cand_stemmed = stemmed_set(candidate);

    for negation in NEGATIONS {
        if orig_lower.contains(*negation) && !cand_lower.contains(*negation) {
            violations.push(RuleViolation::NegationDropped {
                word: (*negation).to_string(),
            });
        }
    }

    for marker in CONDITIONALS {
        if orig_lower.contains(*marker) && !cand_lower.contains(*marker) {
            violations.push(RuleViolation::ConditionalDropped {
                word: (*marker).to_string(),
            });
        }
    }

    let mut seen_entities = HashSet::new();
    for entity in named_entities(original) {
        if !seen_entities.insert(entity.to_lowercase()) {
            continue;
        }
        if !cand_lower.contains(&entity.to_lowercase()) {
            violations.push(RuleViolation::EntityChanged { entity });
        }
    }

    let mut seen_numbers = HashSet::new();
    for number in numbers(original) {
        if !seen_numbers.insert(number.clone()) {
            continue;
        }
        if !cand_lower.contains(&number.to_lowercase()) {
            violations.push(RuleViolation::NumberChanged { number });
        }
    }

    for noun in content_nouns(original) {
        if !cand_stemmed.contains(&noun) {
            violations.push(RuleViolation::ContentNounDropped { noun });
        }
    }

    violations
}
