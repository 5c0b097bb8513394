use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));
static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(\s+|$)").expect("valid regex"));

/// English stop words
const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
    "nor", "not", "only", "own", "same", "so", "than", "too", "very", "can", "will", "just",
    "don", "should", "now", "ll", "re", "ve", "ain", "aren", "couldn", "didn", "doesn",
    "hadn", "hasn", "haven", "isn", "ma", "mightn", "mustn", "needn", "shan", "shouldn",
    "wasn", "weren", "won", "wouldn",
];

/// Indonesian function words. Negation cues and words carrying blocker or
/// resolution meaning are deliberately absent.
const INDONESIAN_STOPWORDS: &[&str] = &[
    "ada", "adalah", "agar", "akan", "aku", "anda", "apa", "atau", "bagi", "bahwa", "beberapa",
    "bisa", "dalam", "dan", "dapat", "dari", "dengan", "di", "dia", "harus", "hanya", "ia",
    "ini", "itu", "jika", "juga", "kalau", "kami", "kamu", "karena", "ke", "kemudian", "kita",
    "lagi", "lalu", "lebih", "masih", "mereka", "namun", "oleh", "pada", "para", "saat", "saja",
    "sangat", "saya", "sebagai", "sebelum", "sedang", "sehingga", "sejak", "setelah", "sudah",
    "telah", "tentang", "tersebut", "untuk", "yang",
];

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ENGLISH_STOPWORDS
        .iter()
        .chain(INDONESIAN_STOPWORDS.iter())
        .copied()
        .collect()
});

/// Lowercase, strip punctuation and collapse whitespace.
///
/// Deterministic and idempotent: `normalize(normalize(t)) == normalize(t)`.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split raw text into trimmed, non-empty sentences on `.`, `!` and `?`
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whitespace word count
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Terms of a text as seen by the vector space: lowercase tokens of two or
/// more word characters, stop words removed, expanded into n-grams.
pub fn analyze(text: &str, ngram_range: (usize, usize)) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !is_stopword(t))
        .collect();

    let (min_n, max_n) = ngram_range;
    let mut terms = Vec::new();
    for n in min_n.max(1)..=max_n {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}
