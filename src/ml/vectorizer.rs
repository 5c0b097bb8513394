use crate::error::{AppError, Result};
use crate::ml::text;
use ndarray::{Array1, Array2};
use std::collections::{BTreeSet, HashMap};

/// Term-frequency / inverse-document-frequency vectorizer
///
/// Raw term counts weighted by the smoothed idf `ln((1 + n) / (1 + df)) + 1`,
/// rows L2-normalized. Terms absent from the fitted vocabulary are ignored.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    ngram_range: (usize, usize),
    vocabulary: HashMap<String, usize>,
    idf: Array1<f64>,
}

impl TfidfVectorizer {
    /// Fit vocabulary and idf weights on a corpus
    pub fn fit<S: AsRef<str>>(documents: &[S], ngram_range: (usize, usize)) -> Self {
        let analyzed: Vec<Vec<String>> = documents
            .iter()
            .map(|d| text::analyze(d.as_ref(), ngram_range))
            .collect();

        let terms: BTreeSet<&str> = analyzed.iter().flatten().map(String::as_str).collect();
        let vocabulary: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();

        let mut doc_freq = vec![0usize; vocabulary.len()];
        for doc in &analyzed {
            let unique: BTreeSet<usize> = doc.iter().filter_map(|t| vocabulary.get(t).copied()).collect();
            for idx in unique {
                doc_freq[idx] += 1;
            }
        }

        let n = documents.len() as f64;
        let idf = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect::<Array1<f64>>();

        Self {
            ngram_range,
            vocabulary,
            idf,
        }
    }

    /// Rebuild a vectorizer from a persisted vocabulary and idf weights
    pub fn from_parts(terms: Vec<String>, idf: Vec<f64>, ngram_range: (usize, usize)) -> Result<Self> {
        if terms.len() != idf.len() {
            return Err(AppError::Artifact(format!(
                "vocabulary has {} terms but {} idf weights",
                terms.len(),
                idf.len()
            )));
        }

        let vocabulary = terms.into_iter().enumerate().map(|(i, t)| (t, i)).collect();
        Ok(Self {
            ngram_range,
            vocabulary,
            idf: Array1::from_vec(idf),
        })
    }

    /// Number of known terms
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    /// Known terms present in a text
    pub fn known_terms(&self, text: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        text::analyze(text, self.ngram_range)
            .into_iter()
            .filter(|t| self.vocabulary.contains_key(t) && seen.insert(t.clone()))
            .collect()
    }

    /// L2-normalized tf-idf vector; all zeros when no term is known
    pub fn transform(&self, text: &str) -> Array1<f64> {
        let mut vector = Array1::<f64>::zeros(self.vocabulary.len());
        for term in text::analyze(text, self.ngram_range) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                vector[idx] += 1.0;
            }
        }

        vector *= &self.idf;
        l2_normalize(vector)
    }

    /// Transform a batch of documents into a row matrix
    pub fn transform_batch<S: AsRef<str>>(&self, documents: &[S]) -> Array2<f64> {
        let mut matrix = Array2::<f64>::zeros((documents.len(), self.vocabulary.len()));
        for (i, doc) in documents.iter().enumerate() {
            matrix.row_mut(i).assign(&self.transform(doc.as_ref()));
        }
        matrix
    }
}

fn l2_normalize(vector: Array1<f64>) -> Array1<f64> {
    let norm = vector.dot(&vector).sqrt();
    if norm > 0.0 {
        vector / norm
    } else {
        vector
    }
}

/// A fixed reference corpus embedded in its own tf-idf space
#[derive(Debug, Clone)]
pub struct ReferenceSpace {
    vectorizer: TfidfVectorizer,
    rows: Array2<f64>,
}

impl ReferenceSpace {
    /// Fit a 1..=3-gram space on `phrases`, each repeated `replicate` times
    pub fn fit(phrases: &[&str], replicate: usize) -> Self {
        let corpus: Vec<&str> = (0..replicate.max(1))
            .flat_map(|_| phrases.iter().copied())
            .collect();

        let vectorizer = TfidfVectorizer::fit(&corpus, (1, 3));
        let rows = vectorizer.transform_batch(phrases);

        Self { vectorizer, rows }
    }

    /// Highest cosine similarity between `text` and any reference row (0.0 - 1.0)
    pub fn max_similarity(&self, text: &str) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }

        let query = self.vectorizer.transform(text);
        self.rows
            .dot(&query)
            .iter()
            .fold(0.0_f64, |best, &s| best.max(s))
            .clamp(0.0, 1.0)
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_builds_ngram_vocabulary() {
        let vectorizer = TfidfVectorizer::fit(&["waiting approval", "blocked"], (1, 3));

        assert_eq!(vectorizer.vocab_size(), 4);
        assert!(vectorizer.term_index("waiting approval").is_some());
        assert!(vectorizer.term_index("blocked").is_some());
    }

    #[test]
    fn test_transform_is_unit_length() {
        let vectorizer = TfidfVectorizer::fit(&["waiting approval", "blocked", "need help"], (1, 3));
        let vector = vectorizer.transform("still waiting for approval, need help");

        let norm = vector.dot(&vector).sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_terms_give_zero_vector() {
        let vectorizer = TfidfVectorizer::fit(&["blocked"], (1, 3));
        let vector = vectorizer.transform("everything is fine");

        assert!(vector.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_idf_is_smoothed() {
        let vectorizer = TfidfVectorizer::fit(&["blocked", "blocked waiting"], (1, 1));
        let blocked = vectorizer.term_index("blocked").unwrap();
        let waiting = vectorizer.term_index("waiting").unwrap();

        assert!((vectorizer.idf[blocked] - 1.0).abs() < 1e-9);
        assert!((vectorizer.idf[waiting] - ((3.0_f64 / 2.0).ln() + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_from_parts_rejects_mismatched_lengths() {
        let result = TfidfVectorizer::from_parts(vec!["a".into(), "b".into()], vec![1.0], (1, 1));
        assert!(matches!(result, Err(AppError::Artifact(_))));
    }

    #[test]
    fn test_reference_space_similarity() {
        let space = ReferenceSpace::fit(&["blocked", "waiting"], 3);

        assert!((space.max_similarity("blocked") - 1.0).abs() < 1e-9);
        assert!((space.max_similarity("blocked, waiting") - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        assert_eq!(space.max_similarity("all good"), 0.0);
        assert_eq!(space.max_similarity(""), 0.0);
    }
}
