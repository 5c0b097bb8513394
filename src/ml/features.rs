use crate::error::Result;
use crate::ml::models::{Priority, TaskFeatures, TaskType, TeamSize};
use crate::ml::task::TaskRecord;
use crate::ml::text;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, warn};

/// Keyword scan table for priority, checked in order
const PRIORITY_KEYWORDS: &[(Priority, &[&str])] = &[
    (
        Priority::High,
        &["urgent", "penting", "segera", "critical", "high", "tinggi"],
    ),
    (
        Priority::Low,
        &["optional", "opsional", "jika ada waktu", "low", "rendah"],
    ),
];

/// Keyword scan table for task type, checked in order
const TASK_TYPE_KEYWORDS: &[(TaskType, &[&str])] = &[
    (
        TaskType::Development,
        &["develop", "code", "implement", "programming", "coding", "development"],
    ),
    (TaskType::Design, &["design", "ui", "ux", "interface", "visual"]),
    (
        TaskType::Testing,
        &["test", "qa", "bug", "debug", "verification", "validasi"],
    ),
    (
        TaskType::Documentation,
        &["doc", "documentation", "dokumentasi", "write", "tulis"],
    ),
    (
        TaskType::Meeting,
        &["meeting", "rapat", "diskusi", "discuss", "pertemuan"],
    ),
];

/// Feature extractor for task records
///
/// Explicit categorical values win when they name a known variant; otherwise
/// priority and task type come from a first-match keyword scan of the name
/// and description.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract features, reporting malformed input
    pub fn try_extract(&self, task: &Value) -> Result<TaskFeatures> {
        let record = TaskRecord::from_value(task)?;
        Ok(self.from_record(&record))
    }

    /// Extract features, falling back to the safe defaults on malformed input
    pub fn extract(&self, task: &Value) -> TaskFeatures {
        match self.try_extract(task) {
            Ok(features) => features,
            Err(e) => {
                warn!(error = %e, "Feature extraction failed, using safe defaults");
                TaskFeatures::safe_default()
            }
        }
    }

    /// Features of an already normalized record
    pub fn from_record(&self, record: &TaskRecord) -> TaskFeatures {
        let combined = record.combined_text();

        let priority = record
            .priority
            .as_deref()
            .and_then(|p| Priority::from_str(p).ok())
            .unwrap_or_else(|| Self::infer_priority(&combined));

        let task_type = record
            .task_type
            .as_deref()
            .and_then(|t| TaskType::from_str(t).ok())
            .unwrap_or_else(|| Self::infer_task_type(&combined));

        let team_size = record
            .team_size
            .as_deref()
            .and_then(|t| TeamSize::from_str(t).ok())
            .unwrap_or(TeamSize::Small);

        let word_count = record.word_count.unwrap_or_else(|| {
            (text::word_count(&record.name) + text::word_count(&record.description)) as u32
        });

        let features = TaskFeatures {
            priority,
            team_size,
            task_type,
            estimated_hours: record.estimated_hours.unwrap_or(0.0),
            word_count,
            dependency_count: record.dependency_count.unwrap_or(0),
        };

        debug!(?features, "Extracted task features");
        features
    }

    pub fn infer_priority(text: &str) -> Priority {
        first_match(text, PRIORITY_KEYWORDS).unwrap_or(Priority::Medium)
    }

    pub fn infer_task_type(text: &str) -> TaskType {
        first_match(text, TASK_TYPE_KEYWORDS).unwrap_or(TaskType::Other)
    }
}

/// Label of the first table row with a keyword present in the text.
///
/// Single-word keywords match the start of a word ("test" matches "testing"
/// but "ui" does not match "build"); multi-word keywords match as a phrase.
fn first_match<T: Copy>(text: &str, table: &[(T, &[&str])]) -> Option<T> {
    let normalized = text::normalize(text);
    if normalized.is_empty() {
        return None;
    }
    let words: Vec<&str> = normalized.split(' ').collect();
    let padded = format!(" {} ", normalized);

    table
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|kw| {
                if kw.contains(' ') {
                    padded.contains(&format!(" {} ", kw))
                } else {
                    words.iter().any(|w| w.starts_with(kw))
                }
            })
        })
        .map(|(label, _)| *label)
}
