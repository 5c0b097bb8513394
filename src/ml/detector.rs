use crate::ml::models::{BlockerResult, ClassProbabilities, Comment, DetectionConfig};
use crate::ml::phrases::{remove_overlapping, PhraseExtractor};
use crate::ml::text;
use crate::ml::text_classifier::TextClassifier;
use crate::ml::vectorizer::ReferenceSpace;
use serde::Serialize;
use std::collections::BTreeSet;
use strum::{AsRefStr, Display};
use tracing::{debug, info, warn};

/// Phrases that indicate a task cannot proceed (Indonesian and English)
pub const BLOCKER_KEYWORDS: &[&str] = &[
    // Indonesian
    "terhambat", "susah", "tertunda", "menunggu", "butuh bantuan", "tidak bisa dilanjutkan",
    "kendala", "masalah", "blocker", "terkendala", "tertahan", "belum bisa", "belum tersedia",
    "menghambat", "menunggu persetujuan", "kesulitan", "gagal", "error", "stuck", "buntu",
    "bingung", "perlu akses", "perlu dibantu", "tolong bantu", "ada rintangan",
    "tidak dapat melanjutkan",
    // English
    "blocked", "waiting", "dependency", "need help", "cannot proceed", "obstacle", "issue",
    "problem", "stalled", "pending", "delayed", "assistance required", "failed", "error",
    "stuck", "blocker", "urgent", "need access", "need approval", "need review",
    "cannot continue", "roadblock", "bottleneck", "need assistance", "question", "concern",
    "difficult",
];

/// Cues that may reverse the meaning of a blocker phrase
pub const NEGATION_WORDS: &[&str] = &[
    // Indonesian
    "tidak", "bukan", "tanpa", "jangan", "belum", "sudah tidak",
    // English
    "not", "no", "never", "without", "don't", "doesn't", "didn't", "won't", "wouldn't",
    "can't", "cannot", "couldn't", "shouldn't", "isn't", "aren't", "wasn't", "weren't",
];

/// Phrases that indicate a blocker has been cleared
pub const RESOLUTION_KEYWORDS: &[&str] = &[
    // Indonesian
    "sudah selesai", "teratasi", "diselesaikan", "sudah tidak menunggu", "sudah terjawab",
    "berhasil", "beres", "fixed", "solve", "terselesaikan",
    // English
    "resolved", "fixed", "solved", "completed", "done", "working now", "no longer blocked",
    "unblocked", "finished", "addressed", "cleared",
];

/// Blocker keywords are repeated this many times when fitting the space
const BLOCKER_REPLICATION: usize = 3;

const RESOLVED_RECOMMENDATION: &str = "The blocker appears to be resolved.";
const RECENTLY_RESOLVED_RECOMMENDATION: &str =
    "The latest blocker appears to be resolved according to the most recent comment.";

/// How blocker confidence is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DetectionStrategy {
    /// Max cosine similarity against the blocker reference corpus
    Similarity,
    /// Probability from a pretrained text classifier
    Pretrained,
}

/// Keyword lists used by the detector
#[derive(Debug, Clone, Serialize)]
pub struct KeywordLists {
    pub blocker_keywords: Vec<String>,
    pub negation_words: Vec<String>,
    pub resolution_keywords: Vec<String>,
}

/// Blocker detector
///
/// Scores free text against a blocker reference corpus (or a pretrained
/// classifier when one is attached), extracts the phrases responsible and
/// applies the negation and resolution overrides.
pub struct BlockerDetector {
    config: DetectionConfig,
    blocker_space: ReferenceSpace,
    resolution_space: ReferenceSpace,
    classifier: Option<TextClassifier>,
}

impl BlockerDetector {
    /// Build the reference spaces and, if configured, load the pretrained classifier
    pub fn new(config: DetectionConfig) -> Self {
        let classifier = config.classifier_path.as_deref().and_then(|path| {
            match TextClassifier::load(path) {
                Ok(classifier) => {
                    info!(path = %path, "Loaded pretrained blocker classifier");
                    Some(classifier)
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Pretrained blocker classifier unavailable, using similarity");
                    None
                }
            }
        });

        Self {
            config,
            blocker_space: ReferenceSpace::fit(BLOCKER_KEYWORDS, BLOCKER_REPLICATION),
            resolution_space: ReferenceSpace::fit(RESOLUTION_KEYWORDS, 1),
            classifier,
        }
    }

    /// Attach a pretrained classifier; it takes precedence over similarity
    pub fn with_classifier(mut self, classifier: TextClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn strategy(&self) -> DetectionStrategy {
        if self.classifier.is_some() {
            DetectionStrategy::Pretrained
        } else {
            DetectionStrategy::Similarity
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detect a blocker with the configured threshold
    pub fn detect(&self, text: &str) -> BlockerResult {
        self.detect_with_threshold(text, self.config.threshold)
    }

    /// Detect a blocker in a single text
    pub fn detect_with_threshold(&self, text: &str, threshold: f64) -> BlockerResult {
        if text.trim().is_empty() {
            return BlockerResult::empty();
        }

        let normalized = text::normalize(text);

        let (mut confidence, flagged_phrases, probabilities) = match &self.classifier {
            Some(classifier) => {
                let p = classifier.predict_proba(&normalized);
                let phrases = if p >= threshold {
                    remove_overlapping(
                        classifier.top_terms(&normalized, self.config.max_flagged_phrases),
                        self.config.max_flagged_phrases,
                    )
                } else {
                    Vec::new()
                };
                (p, phrases, Some(ClassProbabilities::from_blocker(p)))
            }
            None => {
                let similarity = self.blocker_space.max_similarity(&normalized);
                let phrases = if similarity >= threshold {
                    self.flag_phrases(text, &normalized, threshold)
                } else {
                    Vec::new()
                };
                (similarity, phrases, None)
            }
        };

        if self.has_negation(&normalized) && flagged_phrases.len() <= 2 {
            debug!(confidence, "Negation cue present, discounting confidence");
            confidence *= self.config.negation_discount;
        }

        if flagged_phrases.is_empty() && self.check_resolution(&normalized) {
            return BlockerResult::resolved(RESOLVED_RECOMMENDATION);
        }

        let confidence = confidence.clamp(0.0, 1.0);
        BlockerResult {
            is_blocker: confidence >= threshold,
            confidence,
            recommendation: Self::recommendation(confidence, &flagged_phrases),
            flagged_phrases,
            probabilities,
        }
    }

    fn flag_phrases(&self, raw: &str, normalized: &str, threshold: f64) -> Vec<String> {
        let extractor = PhraseExtractor::new(
            &self.blocker_space,
            self.config.phrase_threshold,
            self.config.max_flagged_phrases,
        );

        let phrases = extractor.extract(normalized);
        if !phrases.is_empty() {
            return phrases;
        }
        extractor.qualifying_sentences(raw, threshold)
    }

    /// Whether a normalized text contains a negation cue as a standalone word
    pub fn has_negation(&self, normalized: &str) -> bool {
        let padded = format!(" {} ", normalized);
        NEGATION_WORDS
            .iter()
            .any(|word| padded.contains(&format!(" {} ", word)))
    }

    /// Whether the text reads like a resolved blocker
    pub fn check_resolution(&self, text: &str) -> bool {
        let normalized = text::normalize(text);
        if normalized.is_empty() {
            return false;
        }
        self.resolution_space.max_similarity(&normalized) > self.config.resolution_threshold
    }

    /// Follow-up advice for a confidence level; empty when nothing was flagged
    pub fn recommendation(confidence: f64, flagged_phrases: &[String]) -> String {
        if flagged_phrases.is_empty() {
            return String::new();
        }

        if confidence >= 0.6 {
            "This task appears to have a serious blocker. Escalate or discuss it with the team soon."
                .to_string()
        } else if confidence >= 0.4 {
            "This task is likely facing an obstacle. Follow up with the assignee.".to_string()
        } else {
            "This task may be facing a minor obstacle. Review it in the next progress update."
                .to_string()
        }
    }

    /// Aggregate blocker evidence across a task's comments, newest first
    pub fn analyze_comments(&self, comments: &[Comment], threshold: f64) -> BlockerResult {
        if comments.is_empty() {
            return BlockerResult::empty();
        }

        let mut ordered: Vec<&Comment> = comments.iter().collect();
        // Stable, so equal timestamps keep their input order
        ordered.sort_by(|a, b| {
            let a = a.created_at.as_deref().unwrap_or("");
            let b = b.created_at.as_deref().unwrap_or("");
            b.cmp(a)
        });

        if self.check_resolution(&ordered[0].content) {
            debug!("Most recent comment resolves the blocker");
            return BlockerResult::resolved(RECENTLY_RESOLVED_RECOMMENDATION);
        }

        let mut weight = 1.0;
        let mut best_confidence = 0.0;
        let mut best_is_blocker = false;
        let mut phrases = BTreeSet::new();

        for comment in ordered.iter().filter(|c| !c.content.trim().is_empty()) {
            let result = self.detect_with_threshold(&comment.content, threshold);
            let weighted = result.confidence * weight;

            if weighted > best_confidence {
                best_confidence = weighted;
                best_is_blocker = result.is_blocker;
            }
            phrases.extend(result.flagged_phrases);

            weight *= self.config.recency_decay;
        }

        let flagged_phrases = remove_overlapping(
            phrases.into_iter().collect(),
            self.config.max_flagged_phrases,
        );

        BlockerResult {
            is_blocker: best_is_blocker,
            confidence: best_confidence,
            recommendation: Self::recommendation(best_confidence, &flagged_phrases),
            flagged_phrases,
            probabilities: None,
        }
    }

    /// Blocker analysis of a whole task: name, description and comments
    pub fn analyze_task(
        &self,
        name: &str,
        description: &str,
        comments: &[Comment],
        threshold: f64,
    ) -> BlockerResult {
        let text = format!("{} {}", name, description);
        let text_result = self.detect_with_threshold(text.trim(), threshold);

        if comments.is_empty() {
            return text_result;
        }

        let comment_result = self.analyze_comments(comments, threshold);
        if comment_result.is_blocker {
            comment_result
        } else if text_result.is_blocker {
            text_result
        } else if comment_result.confidence > text_result.confidence {
            comment_result
        } else {
            text_result
        }
    }

    pub fn keywords() -> KeywordLists {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        KeywordLists {
            blocker_keywords: owned(BLOCKER_KEYWORDS),
            negation_words: owned(NEGATION_WORDS),
            resolution_keywords: owned(RESOLUTION_KEYWORDS),
        }
    }
}

impl Default for BlockerDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}
