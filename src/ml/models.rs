use chrono::{DateTime, FixedOffset, Utc};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Blocker detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Whole-text similarity needed to call a text a blocker (0.0 - 1.0)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Similarity a candidate phrase needs to be flagged
    #[serde(default = "default_phrase_threshold")]
    pub phrase_threshold: f64,

    /// Similarity to the resolution corpus that marks a text as resolved
    #[serde(default = "default_resolution_threshold")]
    pub resolution_threshold: f64,

    /// Confidence multiplier applied when a negation cue is present
    #[serde(default = "default_negation_discount")]
    pub negation_discount: f64,

    /// Maximum number of flagged phrases reported
    #[serde(default = "default_max_flagged_phrases")]
    pub max_flagged_phrases: usize,

    /// Weight multiplier per older comment
    #[serde(default = "default_recency_decay")]
    pub recency_decay: f64,

    /// Optional pretrained text classifier artifact
    #[serde(default)]
    pub classifier_path: Option<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            phrase_threshold: default_phrase_threshold(),
            resolution_threshold: default_resolution_threshold(),
            negation_discount: default_negation_discount(),
            max_flagged_phrases: default_max_flagged_phrases(),
            recency_decay: default_recency_decay(),
            classifier_path: None,
        }
    }
}

/// Timeline prediction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Model artifact location
    #[serde(default)]
    pub model_path: Option<String>,

    /// Preprocessor artifact location
    #[serde(default)]
    pub preprocessor_path: Option<String>,

    /// Minimum usable completed tasks required to train
    #[serde(default = "default_min_training_samples")]
    pub min_training_samples: usize,

    /// Maximum tasks accepted by a bulk prediction
    #[serde(default = "default_max_bulk_tasks")]
    pub max_bulk_tasks: usize,

    /// Trees in the random forest
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Share of samples held out for evaluation
    #[serde(default = "default_test_split")]
    pub test_split: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            preprocessor_path: None,
            min_training_samples: default_min_training_samples(),
            max_bulk_tasks: default_max_bulk_tasks(),
            n_trees: default_n_trees(),
            test_split: default_test_split(),
        }
    }
}

fn default_threshold() -> f64 {
    0.2
}

fn default_phrase_threshold() -> f64 {
    0.3
}

fn default_resolution_threshold() -> f64 {
    0.65
}

fn default_negation_discount() -> f64 {
    0.5
}

fn default_max_flagged_phrases() -> usize {
    5
}

fn default_recency_decay() -> f64 {
    0.7
}

fn default_min_training_samples() -> usize {
    5
}

fn default_max_bulk_tasks() -> usize {
    50
}

fn default_n_trees() -> usize {
    100
}

fn default_test_split() -> f64 {
    0.2
}

/// Class probabilities reported by a pretrained classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub not_blocker: f64,
    pub blocker: f64,
}

impl ClassProbabilities {
    pub fn from_blocker(p: f64) -> Self {
        let blocker = p.clamp(0.0, 1.0);
        Self {
            not_blocker: 1.0 - blocker,
            blocker,
        }
    }
}

/// Outcome of blocker detection for a text or a set of comments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerResult {
    /// Whether the text describes a blocker
    pub is_blocker: bool,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,

    /// Phrases that triggered the verdict (at most 5, none contained in another)
    pub flagged_phrases: Vec<String>,

    /// Human readable follow-up advice
    pub recommendation: String,

    /// Class probabilities (pretrained classifier only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<ClassProbabilities>,
}

impl BlockerResult {
    /// Result for empty input
    pub fn empty() -> Self {
        Self {
            is_blocker: false,
            confidence: 0.0,
            flagged_phrases: Vec::new(),
            recommendation: String::new(),
            probabilities: None,
        }
    }

    /// Fixed non-blocker result used when a resolution cue wins
    pub fn resolved(recommendation: &str) -> Self {
        Self {
            recommendation: recommendation.to_string(),
            ..Self::empty()
        }
    }
}

/// A task comment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub content: String,

    /// Sortable creation timestamp
    #[serde(default, rename = "createdAt", alias = "created_at")]
    pub created_at: Option<String>,

    #[serde(
        default,
        rename = "authorId",
        alias = "userId",
        alias = "author_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub author_id: Option<serde_json::Value>,
}

impl Comment {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }
}

/// Blocker analysis of a whole task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub task_id: i64,
    pub analysis: BlockerResult,
}

/// Task priority
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Team size bucket
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum TeamSize {
    Large,
    Medium,
    Small,
}

/// Kind of work a task represents
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum TaskType {
    Development,
    Testing,
    Meeting,
    Research,
    Documentation,
    Design,
    Other,
}

/// Features the timeline models consume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFeatures {
    pub priority: Priority,
    pub team_size: TeamSize,
    pub task_type: TaskType,
    pub estimated_hours: f64,
    pub word_count: u32,
    pub dependency_count: u32,
}

impl TaskFeatures {
    /// Feature set used whenever extraction fails
    pub fn safe_default() -> Self {
        Self {
            priority: Priority::Medium,
            team_size: TeamSize::Small,
            task_type: TaskType::Other,
            estimated_hours: 8.0,
            word_count: 10,
            dependency_count: 0,
        }
    }
}

/// Which cascade tier produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PredictionMethod {
    Ml,
    RuleBased,
    Emergency,
    Default,
}

/// Timeline prediction for a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted duration in business days (>= 1)
    pub predicted_days: u32,

    /// Confidence score
    pub confidence: f64,

    /// Start date advanced by the predicted business days
    pub predicted_completion_date: Option<DateTime<FixedOffset>>,

    /// Rationale, most relevant first (at most 5)
    pub factors: Vec<String>,

    /// Producing tier
    pub method: PredictionMethod,
}

/// Suggestions derived from comparing a prediction with the planned window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleAdvice {
    pub suggest_earlier_start: bool,
    pub suggest_later_end: bool,
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Random forest regressor
    RandomForest,

    /// Linear text classifier
    LogisticRegression,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForest => write!(f, "Random Forest"),
            ModelType::LogisticRegression => write!(f, "Logistic Regression"),
        }
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: DateTime<Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Coefficient of determination on the training split
    #[serde(default)]
    pub train_r2: Option<f64>,

    /// Coefficient of determination on the held-out split
    #[serde(default)]
    pub test_r2: Option<f64>,

    /// Hyperparameters
    #[serde(default)]
    pub hyperparameters: HashMap<String, String>,
}

/// Summary returned by a successful training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub train_r2: Option<f64>,
    pub test_r2: Option<f64>,
    pub trained_at: DateTime<Utc>,
    pub persisted: bool,
}

/// Training sample for the timeline regressor
#[derive(Debug, Clone)]
pub struct TrainingSample {
    /// Task features
    pub features: TaskFeatures,

    /// Observed duration in days
    pub actual_days: f64,
}

/// Training dataset
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Observed durations
    pub targets: Array1<f64>,

    /// Number of samples
    pub n_samples: usize,

    /// Number of features
    pub n_features: usize,
}

impl TrainingDataset {
    /// Build a dataset from already transformed rows
    pub fn from_rows(rows: Vec<Vec<f64>>, targets: Vec<f64>) -> Self {
        let n_samples = rows.len();
        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);

        let mut features = Array2::zeros((n_samples, n_features));
        for (i, row) in rows.iter().enumerate() {
            for (j, &val) in row.iter().enumerate().take(n_features) {
                features[[i, j]] = val;
            }
        }

        Self {
            features,
            targets: Array1::from_vec(targets),
            n_samples,
            n_features,
        }
    }

    /// Split dataset into train/test sets, keeping at least one training row.
    ///
    /// Test rows are spread evenly over the input, so history given in
    /// chronological order puts both old and recent tasks in each set.
    pub fn train_test_split(&self, test_size: f64) -> (TrainingDataset, TrainingDataset) {
        let n_test = ((self.n_samples as f64 * test_size) as usize).min(self.n_samples.saturating_sub(1));

        let test_rows: Vec<usize> = if n_test == 0 {
            Vec::new()
        } else {
            let step = self.n_samples as f64 / n_test as f64;
            (0..n_test)
                .map(|j| ((j as f64 + 0.5) * step) as usize)
                .collect()
        };
        let train_rows: Vec<usize> = (0..self.n_samples)
            .filter(|i| !test_rows.contains(i))
            .collect();

        (self.subset(&train_rows), self.subset(&test_rows))
    }

    fn subset(&self, rows: &[usize]) -> TrainingDataset {
        TrainingDataset {
            features: self.features.select(Axis(0), rows),
            targets: self.targets.select(Axis(0), rows),
            n_samples: rows.len(),
            n_features: self.n_features,
        }
    }
}
