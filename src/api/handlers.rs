use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::{
    BlockerDetector, BlockerResult, BulkPrediction, Comment, DetectionStrategy, KeywordLists,
    LoaderState, TaskAnalysis, TimelinePrediction,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn non_empty_task(task: &Value) -> std::result::Result<(), ValidationError> {
    match task {
        Value::Object(map) if !map.is_empty() => Ok(()),
        _ => Err(ValidationError::new("empty_task")),
    }
}

/// Service banner
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Welcome to the planner ML API".to_string(),
        status: "online".to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let status = state.service.status();
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now(),
        detection_strategy: status.detection_strategy,
        model_trained: status.model_trained,
        model_loader: status.loader,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub detection_strategy: DetectionStrategy,
    pub model_trained: bool,
    pub model_loader: LoaderState,
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}

/// Keyword lists used by the detector
pub async fn keywords() -> Json<KeywordLists> {
    Json(BlockerDetector::keywords())
}

/// Detect blockers in free text
pub async fn detect_blockers(
    State(state): State<AppState>,
    Json(request): Json<DetectBlockersRequest>,
) -> Result<Json<BlockerResult>> {
    request.validate()?;

    Ok(Json(
        state.service.detect_blockers(&request.text, request.threshold),
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct DetectBlockersRequest {
    #[validate(custom(function = "not_blank"))]
    pub text: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: Option<f64>,
}

/// Analyze a task's comments for blockers
pub async fn analyze_comments(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeCommentsRequest>,
) -> Result<Json<BlockerResult>> {
    request.validate()?;

    Ok(Json(
        state
            .service
            .analyze_comments(&request.comments, request.threshold),
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeCommentsRequest {
    #[validate(length(min = 1))]
    pub comments: Vec<Comment>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: Option<f64>,
}

/// Analyze a task's name, description and comments for blockers
pub async fn analyze_task(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeTaskRequest>,
) -> Result<Json<TaskAnalysis>> {
    request.validate()?;

    Ok(Json(state.service.analyze_task(
        request.task_id,
        &request.name,
        request.description.as_deref().unwrap_or_default(),
        &request.comments,
        request.threshold,
    )))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeTaskRequest {
    pub task_id: i64,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: Option<f64>,
}

/// Predict a task's timeline, optionally retraining on historical tasks first
pub async fn predict_timeline(
    State(state): State<AppState>,
    Json(request): Json<PredictTimelineRequest>,
) -> Result<Json<TimelinePrediction>> {
    request.validate()?;

    let prediction = state
        .service
        .predict_timeline(request.task, request.historical_tasks)
        .await?;
    Ok(Json(prediction))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PredictTimelineRequest {
    #[validate(custom(function = "non_empty_task"))]
    pub task: Value,
    #[serde(default)]
    pub historical_tasks: Vec<Value>,
}

/// Predict timelines for a batch of tasks
pub async fn predict_bulk(
    State(state): State<AppState>,
    Json(tasks): Json<Vec<Value>>,
) -> Result<Json<BulkPredictionResponse>> {
    if tasks.iter().any(|t| !t.is_object()) {
        return Err(AppError::Validation(
            "every task must be a JSON object".to_string(),
        ));
    }

    let predictions = state.service.predict_bulk(&tasks)?;
    Ok(Json(BulkPredictionResponse {
        total: predictions.len(),
        predictions,
    }))
}

#[derive(Debug, Serialize)]
pub struct BulkPredictionResponse {
    pub predictions: Vec<BulkPrediction>,
    pub total: usize,
}
