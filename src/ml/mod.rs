/// Machine learning core of the planner service
///
/// This module provides:
/// - Blocker detection over free text and task comments
/// - Phrase extraction with negation and resolution overrides
/// - Task feature extraction from loosely shaped task records
/// - Cascading timeline prediction with business-day completion dates
/// - Versioned model artifacts and a fallback loading chain

pub mod artifact;
pub mod detector;
pub mod features;
pub mod loader;
pub mod models;
pub mod phrases;
pub mod predictor;
pub mod regressor;
pub mod service;
pub mod task;
pub mod text;
pub mod text_classifier;
pub mod vectorizer;

pub use detector::{BlockerDetector, DetectionStrategy, KeywordLists};
pub use features::FeatureExtractor;
pub use loader::{ArtifactPaths, LoadStrategy, LoaderState, ModelLoader};
pub use models::{
    BlockerResult, Comment, DetectionConfig, ModelMetadata, ModelType, PredictionConfig,
    PredictionMethod, PredictionResult, Priority, ScheduleAdvice, TaskAnalysis, TaskFeatures,
    TaskType, TeamSize, TrainingReport,
};
pub use predictor::{BulkPrediction, TimelinePredictor};
pub use regressor::TimelineModel;
pub use service::{PlannerService, ServiceStatus, TimelinePrediction};
pub use task::TaskRecord;
pub use text_classifier::TextClassifier;
