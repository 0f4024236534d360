//! Sentence-safe chunker — splits full text into ordered, size-bounded
//! chunks with no boundary inside a sentence.
//!
//! Deterministic and idempotent: the same text and target always produce
//! the same spans, and concatenating all chunks reproduces the original
//! text modulo whitespace.

use serde::{Deserialize, Serialize};

/// One emitted chunk with its position in the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub index: u32,
    pub text: String,
    pub word_count: usize,
}

/// Abbreviations whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "rev", "st", "mt", "capt", "col", "gen", "lt", "sgt",
    "vs", "etc", "i.e", "e.g", "jr", "sr", "no", "vol", "ch", "pp",
];

/// Split text into sentences. A sentence ends at `.`, `!`, or `?`
/// (optionally followed by closing quotes/brackets) when the next
/// non-space character starts a new sentence and the preceding token is
/// not a known abbreviation or a single initial.
fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c == '.' || c == '!' || c == '?' {
            // Swallow runs of terminators ("?!", "...") and trailing quotes.
            let mut end = i + 1;
            while end < chars.len() && matches!(chars[end], '.' | '!' | '?' | '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}') {
                end += 1;
            }

            let boundary = if c == '.' {
                !is_abbreviation_before(&chars, i) && next_starts_sentence(&chars, end)
            } else {
                next_starts_sentence(&chars, end)
            };

            if boundary {
                let sentence: String = chars[start..end].iter().collect();
                let trimmed = sentence.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                start = end;
            }
            i = end;
        } else {
            i += 1;
        }
    }

    // Trailing text without a terminator is still a sentence.
    if start < chars.len() {
        let rest: String = chars[start..].iter().collect();
        let trimmed = rest.trim();
        if !trimmed.is_empty() {
            sentences.push(trimmed.to_string());
        }
    }

    sentences
}

/// Whether the token ending at the period at `dot` is an abbreviation or a
/// single initial ("J." in "J. Smith").
fn is_abbreviation_before(chars: &[char], dot: usize) -> bool {
    let mut start = dot;
    while start > 0 && (chars[start - 1].is_alphanumeric() || chars[start - 1] == '.') {
        start -= 1;
    }
    let token: String = chars[start..dot].iter().collect::<String>().to_lowercase();
    if token.len() == 1 && token.chars().all(char::is_alphabetic) {
        return true;
    }
    ABBREVIATIONS.contains(&token.as_str())
}

/// Whether position `pos` (after a terminator run) is followed by the
/// start of a new sentence: end of text, or whitespace then an uppercase
/// letter, digit, or opening quote.
fn next_starts_sentence(chars: &[char], pos: usize) -> bool {
    let mut j = pos;
    if j >= chars.len() {
        return true;
    }
    if !chars[j].is_whitespace() {
        return false;
    }
    while j < chars.len() && chars[j].is_whitespace() {
        j += 1;
    }
    if j >= chars.len() {
        return true;
    }
    let c = chars[j];
    c.is_uppercase() || c.is_ascii_digit() || matches!(c, '"' | '\'' | '\u{201c}' | '\u{2018}')
}

/// Split `text` into sentence-aligned chunks around `target_words`, with
/// chunk sizes kept within ±20% of the target where sentence boundaries
/// allow.
///
/// A single sentence longer than the upper band is emitted as one
/// oversized chunk rather than split mid-sentence. The final partial chunk
/// is always retained.
pub fn chunk_text(text: &str, target_words: usize) -> Vec<ChunkSpan> {
    let target = target_words.max(1);
    let upper = target + target / 5;

    let sentences = split_sentences(text);
    let mut chunks: Vec<ChunkSpan> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0usize;

    let mut flush = |current: &mut Vec<String>, current_words: &mut usize, chunks: &mut Vec<ChunkSpan>| {
        if current.is_empty() {
            return;
        }
        let text = current.join(" ");
        chunks.push(ChunkSpan {
            index: chunks.len() as u32,
            word_count: *current_words,
            text,
        });
        current.clear();
        *current_words = 0;
    };

    for sentence in sentences {
        let words = sentence.split_whitespace().count();

        // A lone over-band sentence becomes one oversized chunk.
        if words > upper && current.is_empty() {
            current.push(sentence);
            current_words = words;
            flush(&mut current, &mut current_words, &mut chunks);
            continue;
        }

        if current_words + words > upper {
            flush(&mut current, &mut current_words, &mut chunks);
            if words > upper {
                current.push(sentence);
                current_words = words;
                flush(&mut current, &mut current_words, &mut chunks);
                continue;
            }
        }

        current_words += words;
        current.push(sentence);

        if current_words >= target {
            flush(&mut current, &mut current_words, &mut chunks);
        }
    }

    flush(&mut current, &mut current_words, &mut chunks);
    chunks
}
