//! Coarse lexical-overlap pre-check.
//!
//! A term-frequency cosine over lowercased, suffix-stripped tokens. Not a
//! semantic measure — its only job is to catch garbled, truncated, or
//! wrong-language output cheaply before the embedding call, so stopwords
//! stay in the vector (a wrong-language candidate shares none of them).

use std::collections::HashMap;

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Crude suffix strip so inflection differences ("passenger"/"passengers",
/// "walked"/"walking") still overlap.
pub(crate) fn stem(token: &str) -> &str {
    for suffix in ["ing", "ed", "es", "s"] {
        if token.len() > suffix.len() + 2 {
            if let Some(stripped) = token.strip_suffix(suffix) {
                return stripped;
            }
        }
    }
    token
}

fn term_frequencies(tokens: &[String]) -> HashMap<String, f64> {
    let mut tf = HashMap::new();
    for token in tokens {
        *tf.entry(stem(token).to_string()).or_insert(0.0) += 1.0;
    }
    tf
}

/// Term-frequency cosine overlap of two texts in `[0.0, 1.0]`.
///
/// 1.0 = same vocabulary, 0.0 = disjoint. An empty candidate against a
/// non-empty original scores 0.0.
pub fn overlap_score(original: &str, candidate: &str) -> f32 {
    let orig_tokens = tokenize(original);
    let cand_tokens = tokenize(candidate);

    if orig_tokens.is_empty() && cand_tokens.is_empty() {
        return 1.0;
    }
    if orig_tokens.is_empty() || cand_tokens.is_empty() {
        return 0.0;
    }

    let tf_a = term_frequencies(&orig_tokens);
    let tf_b = term_frequencies(&cand_tokens);

    let mut dot = 0.0f64;
    for (term, weight_a) in &tf_a {
        if let Some(weight_b) = tf_b.get(term) {
            dot += weight_a * weight_b;
        }
    }

    let norm_a: f64 = tf_a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = tf_b.values().map(|w| w * w).sum::<f64>().sqrt();

    let denom = norm_a * norm_b;
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}
