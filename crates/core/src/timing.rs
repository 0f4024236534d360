//! Word-level timing records produced by speech synthesis.

use serde::{Deserialize, Serialize};

/// One word's position in a chunk's audio track. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl WordTiming {
    pub fn new(word: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            word: word.into(),
            start_ms,
            end_ms,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Check that a timing sequence is monotonically non-decreasing and
/// non-overlapping: each word ends no earlier than it starts, and no word
/// starts before the previous one ends.
pub fn timings_are_monotonic(timings: &[WordTiming]) -> bool {
    let mut prev_end = 0u64;
    for t in timings {
        if t.end_ms < t.start_ms || t.start_ms < prev_end {
            return false;
        }
        prev_end = t.end_ms;
    }
    true
}

/// Evenly distribute a chunk's words over a known duration, weighted by
/// word length. Used as the elapsed-time heuristic while a fallback speech
/// provider's own timing stream has not yet stabilized.
pub fn heuristic_timings(text: &str, duration_ms: u64) -> Vec<WordTiming> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || duration_ms == 0 {
        return Vec::new();
    }
    let total_weight: usize = words.iter().map(|w| w.len().max(1)).sum();

    let mut timings = Vec::with_capacity(words.len());
    let mut cursor_weight = 0usize;
    for word in &words {
        let weight = word.len().max(1);
        let start = (cursor_weight as u64 * duration_ms) / total_weight as u64;
        cursor_weight += weight;
        let end = (cursor_weight as u64 * duration_ms) / total_weight as u64;
        timings.push(WordTiming::new(*word, start, end));
    }
    timings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_sequence_passes() {
        let timings = vec![
            WordTiming::new("it", 0, 200),
            WordTiming::new("was", 200, 450),
            WordTiming::new("night", 450, 900),
        ];
        assert!(timings_are_monotonic(&timings));
    }

    #[test]
    fn overlapping_sequence_fails() {
        let timings = vec![
            WordTiming::new("it", 0, 300),
            WordTiming::new("was", 250, 500),
        ];
        assert!(!timings_are_monotonic(&timings));
    }

    #[test]
    fn inverted_word_fails() {
        let timings = vec![WordTiming::new("it", 300, 100)];
        assert!(!timings_are_monotonic(&timings));
    }

    #[test]
    fn heuristic_timings_are_monotonic_and_cover_duration() {
        let timings = heuristic_timings("the whale surfaced slowly beside the boat", 3500);
        assert_eq!(timings.len(), 7);
        assert!(timings_are_monotonic(&timings));
        assert_eq!(timings.first().unwrap().start_ms, 0);
        assert_eq!(timings.last().unwrap().end_ms, 3500);
        // Longer words get more time than shorter ones
        let the = timings.iter().find(|t| t.word == "the").unwrap();
        let surfaced = timings.iter().find(|t| t.word == "surfaced").unwrap();
        assert!(surfaced.duration_ms() > the.duration_ms());
    }

    #[test]
    fn heuristic_timings_empty_text() {
        assert!(heuristic_timings("", 1000).is_empty());
        assert!(heuristic_timings("words here", 0).is_empty());
    }
}
