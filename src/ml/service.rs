use crate::error::{AppError, Result};
use crate::metrics::{
    DETECTIONS_TOTAL, DETECTION_DURATION_SECONDS, MODEL_LOADED, PREDICTIONS_TOTAL,
    TRAINING_RUNS_TOTAL,
};
use crate::ml::detector::{BlockerDetector, DetectionStrategy};
use crate::ml::loader::LoaderState;
use crate::ml::models::{
    BlockerResult, Comment, DetectionConfig, ModelMetadata, PredictionConfig, PredictionResult,
    ScheduleAdvice, TaskAnalysis, TrainingReport,
};
use crate::ml::predictor::{self, BulkPrediction, TimelinePredictor};
use crate::ml::task::TaskRecord;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Prediction for a single task together with schedule advice
#[derive(Debug, Clone, Serialize)]
pub struct TimelinePrediction {
    pub task_id: i64,
    #[serde(flatten)]
    pub prediction: PredictionResult,
    #[serde(flatten)]
    pub advice: ScheduleAdvice,
}

/// Snapshot of what the engines currently run with
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub detection_strategy: DetectionStrategy,
    pub model_trained: bool,
    pub loader: LoaderState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelMetadata>,
}

/// Planner service
///
/// Front door over the blocker detector and the timeline predictor. Both
/// engines are synchronous; training runs on the blocking pool.
#[derive(Clone)]
pub struct PlannerService {
    detector: Arc<BlockerDetector>,
    predictor: Arc<TimelinePredictor>,
}

impl PlannerService {
    /// Build both engines from configuration
    pub fn new(detection: DetectionConfig, prediction: PredictionConfig) -> Self {
        Self::from_parts(
            Arc::new(BlockerDetector::new(detection)),
            Arc::new(TimelinePredictor::new(prediction)),
        )
    }

    pub fn from_parts(detector: Arc<BlockerDetector>, predictor: Arc<TimelinePredictor>) -> Self {
        let service = Self {
            detector,
            predictor,
        };
        service.refresh_model_gauge();
        service
    }

    pub fn detector(&self) -> &BlockerDetector {
        &self.detector
    }

    pub fn predictor(&self) -> &TimelinePredictor {
        &self.predictor
    }

    fn threshold(&self, threshold: Option<f64>) -> f64 {
        threshold.unwrap_or(self.detector.config().threshold)
    }

    fn observe_detection(&self, operation: &str, result: &BlockerResult, start: Instant) {
        let verdict = if result.is_blocker { "blocker" } else { "clear" };
        DETECTIONS_TOTAL
            .with_label_values(&[self.detector.strategy().as_ref(), verdict])
            .inc();
        DETECTION_DURATION_SECONDS
            .with_label_values(&[operation])
            .observe(start.elapsed().as_secs_f64());
    }

    fn refresh_model_gauge(&self) {
        MODEL_LOADED.set(i64::from(self.predictor.is_trained()));
    }

    /// Detect a blocker in free text
    pub fn detect_blockers(&self, text: &str, threshold: Option<f64>) -> BlockerResult {
        let start = Instant::now();
        let result = self
            .detector
            .detect_with_threshold(text, self.threshold(threshold));
        self.observe_detection("text", &result, start);

        debug!(
            is_blocker = result.is_blocker,
            confidence = result.confidence,
            "Blocker detection finished"
        );
        result
    }

    /// Aggregate blocker evidence across comments
    pub fn analyze_comments(&self, comments: &[Comment], threshold: Option<f64>) -> BlockerResult {
        let start = Instant::now();
        let result = self
            .detector
            .analyze_comments(comments, self.threshold(threshold));
        self.observe_detection("comments", &result, start);
        result
    }

    /// Blocker analysis of a task's text and comments
    pub fn analyze_task(
        &self,
        task_id: i64,
        name: &str,
        description: &str,
        comments: &[Comment],
        threshold: Option<f64>,
    ) -> TaskAnalysis {
        let start = Instant::now();
        let analysis =
            self.detector
                .analyze_task(name, description, comments, self.threshold(threshold));
        self.observe_detection("task", &analysis, start);

        TaskAnalysis { task_id, analysis }
    }

    /// Train the timeline model on historical tasks
    pub async fn train(&self, tasks: Vec<Value>) -> Result<TrainingReport> {
        let predictor = self.predictor.clone();
        let result = tokio::task::spawn_blocking(move || predictor.train(&tasks))
            .await
            .map_err(|e| AppError::Internal(format!("Training task failed: {}", e)))?;

        let outcome = match &result {
            Ok(_) => "success",
            Err(AppError::InsufficientData { .. }) => "insufficient_data",
            Err(_) => "error",
        };
        TRAINING_RUNS_TOTAL.with_label_values(&[outcome]).inc();
        self.refresh_model_gauge();

        result
    }

    /// Predict a task's timeline, training first when enough history is given
    pub async fn predict_timeline(
        &self,
        task: Value,
        historical_tasks: Vec<Value>,
    ) -> Result<TimelinePrediction> {
        if historical_tasks.len() >= self.predictor.config().min_training_samples {
            match self.train(historical_tasks).await {
                Ok(report) => info!(samples = report.samples, "Retrained timeline model"),
                Err(e) => warn!(error = %e, "Training on historical tasks failed, predicting with the current model"),
            }
        }

        let prediction = self.predictor.predict(&task);
        PREDICTIONS_TOTAL
            .with_label_values(&[prediction.method.as_ref()])
            .inc();

        let advice = TaskRecord::schedule(&task)
            .map(|record| predictor::schedule_advice(&record, prediction.predicted_days))
            .unwrap_or_default();

        Ok(TimelinePrediction {
            task_id: task.get("id").and_then(Value::as_i64).unwrap_or(0),
            prediction,
            advice,
        })
    }

    /// Predict a batch of tasks with the trained model
    pub fn predict_bulk(&self, tasks: &[Value]) -> Result<Vec<BulkPrediction>> {
        let predictions = self.predictor.predict_bulk(tasks)?;
        for item in &predictions {
            PREDICTIONS_TOTAL
                .with_label_values(&[item.prediction.method.as_ref()])
                .inc();
        }
        Ok(predictions)
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            detection_strategy: self.detector.strategy(),
            model_trained: self.predictor.is_trained(),
            loader: self.predictor.loader_state(),
            model: self.predictor.model_metadata(),
        }
    }
}
