use crate::ml::text;
use crate::ml::vectorizer::ReferenceSpace;

/// Longest candidate window, in words
pub const MAX_WINDOW: usize = 4;

/// Every contiguous window of 1..=`max_len` words, ordered by start then length
pub fn candidate_windows(normalized: &str, max_len: usize) -> Vec<String> {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let mut windows = Vec::new();

    for start in 0..words.len() {
        for len in 1..=max_len {
            if start + len > words.len() {
                break;
            }
            windows.push(words[start..start + len].join(" "));
        }
    }
    windows
}

/// Longest first; a phrase contained in an already kept phrase is dropped.
/// The sort is stable so equal-length phrases keep their input order.
pub fn remove_overlapping(mut phrases: Vec<String>, limit: usize) -> Vec<String> {
    phrases.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

    let mut kept: Vec<String> = Vec::new();
    for phrase in phrases {
        if kept.len() >= limit {
            break;
        }
        if !kept.iter().any(|k| k.contains(phrase.as_str())) {
            kept.push(phrase);
        }
    }
    kept
}

/// Finds the phrases of a text that look like blocker language
pub struct PhraseExtractor<'a> {
    space: &'a ReferenceSpace,
    threshold: f64,
    limit: usize,
}

impl<'a> PhraseExtractor<'a> {
    pub fn new(space: &'a ReferenceSpace, threshold: f64, limit: usize) -> Self {
        Self {
            space,
            threshold,
            limit,
        }
    }

    /// Windows of the normalized text that score at or above the phrase threshold
    pub fn extract(&self, normalized: &str) -> Vec<String> {
        let qualifying = candidate_windows(normalized, MAX_WINDOW)
            .into_iter()
            .filter(|w| self.space.max_similarity(w) >= self.threshold)
            .collect();

        remove_overlapping(qualifying, self.limit)
    }

    /// Raw sentences scoring at or above `threshold`, kept verbatim
    pub fn qualifying_sentences(&self, raw: &str, threshold: f64) -> Vec<String> {
        let sentences = text::split_sentences(raw)
            .into_iter()
            .filter(|s| self.space.max_similarity(s) >= threshold)
            .collect();

        remove_overlapping(sentences, self.limit)
    }
}
