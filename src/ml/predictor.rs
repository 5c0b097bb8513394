use crate::error::{AppError, Result};
use crate::ml::features::FeatureExtractor;
use crate::ml::loader::{ArtifactPaths, LoaderState, ModelLoader};
use crate::ml::models::{
    ModelMetadata, PredictionConfig, PredictionMethod, PredictionResult, Priority,
    ScheduleAdvice, TaskFeatures, TaskType, TeamSize, TrainingReport, TrainingSample,
};
use crate::ml::regressor::TimelineModel;
use crate::ml::task::TaskRecord;
use chrono::{DateTime, Datelike, Duration, FixedOffset, Weekday};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

const ML_BASE_CONFIDENCE: f64 = 0.82;
const RULE_BASE_CONFIDENCE: f64 = 0.68;
const EMERGENCY_CONFIDENCE: f64 = 0.5;
const DEFAULT_CONFIDENCE: f64 = 0.3;
const DEFAULT_DAYS: u32 = 3;
const MIN_CONFIDENCE: f64 = 0.4;
const MAX_CONFIDENCE: f64 = 0.95;

const HOURS_PER_DAY: f64 = 8.0;
const EMERGENCY_HOURS_PER_DAY: f64 = 6.0;
const EMERGENCY_DEFAULT_HOURS: f64 = 16.0;
const MAX_FACTORS: usize = 5;
const BULK_FACTORS: usize = 3;

/// Ceiling for any predicted duration, ten years of calendar days
pub const MAX_PREDICTED_DAYS: u32 = 3650;

/// Larger spans are past the end of chrono's calendar from any start
const MAX_SPAN_WEEKS: u32 = 10_000_000;

/// Loaded model state, replaced wholesale on retrain
#[derive(Debug)]
pub struct ModelSnapshot {
    pub model: Option<Arc<TimelineModel>>,
    pub state: LoaderState,
}

/// Prediction for one task of a bulk request
#[derive(Debug, Clone, Serialize)]
pub struct BulkPrediction {
    pub task_id: Option<i64>,
    #[serde(flatten)]
    pub prediction: PredictionResult,
}

/// Timeline prediction engine
///
/// Cascade: trained model, then rule-based estimate, then an emergency
/// estimate from the raw hours, then a fixed default. `predict` never fails.
pub struct TimelinePredictor {
    config: PredictionConfig,
    extractor: FeatureExtractor,
    paths: Option<ArtifactPaths>,
    snapshot: RwLock<Arc<ModelSnapshot>>,
    train_lock: Mutex<()>,
}

impl TimelinePredictor {
    /// Create a predictor, loading persisted artifacts when paths are configured
    pub fn new(config: PredictionConfig) -> Self {
        Self::with_loader(config, &ModelLoader::new())
    }

    pub fn with_loader(config: PredictionConfig, loader: &ModelLoader) -> Self {
        let paths = match (&config.model_path, &config.preprocessor_path) {
            (Some(model), Some(preprocessor)) => Some(ArtifactPaths::new(model, preprocessor)),
            _ => None,
        };

        let snapshot = match &paths {
            Some(paths) => {
                let outcome = loader.load(paths);
                ModelSnapshot {
                    model: outcome.model.map(Arc::new),
                    state: outcome.state,
                }
            }
            None => ModelSnapshot {
                model: None,
                state: LoaderState::Fallback {
                    reason: "no artifact paths configured".to_string(),
                },
            },
        };

        Self {
            config,
            extractor: FeatureExtractor::new(),
            paths,
            snapshot: RwLock::new(Arc::new(snapshot)),
            train_lock: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn is_trained(&self) -> bool {
        self.snapshot().model.is_some()
    }

    pub fn loader_state(&self) -> LoaderState {
        self.snapshot().state.clone()
    }

    pub fn model_metadata(&self) -> Option<ModelMetadata> {
        self.snapshot().model.as_ref().map(|m| m.metadata().clone())
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Predict the duration of a task
    pub fn predict(&self, task: &Value) -> PredictionResult {
        let features = match self.extractor.try_extract(task) {
            Ok(features) => features,
            Err(e) => {
                warn!(error = %e, "Feature preparation failed, using emergency estimate");
                return match Self::emergency_tier(task) {
                    Ok(result) => result,
                    Err(e) => {
                        error!(error = %e, "Emergency estimate failed, using default");
                        Self::default_tier()
                    }
                };
            }
        };

        let start = TaskRecord::schedule(task).and_then(|record| record.start_date);

        if let Some(model) = &self.snapshot().model {
            match Self::ml_tier(model, &features, start) {
                Ok(result) => return result,
                Err(e) => warn!(error = %e, "ML prediction failed, using rule-based estimate"),
            }
        }

        Self::rule_based_tier(&features, start)
    }

    /// Predict a batch; requires a trained model
    pub fn predict_bulk(&self, tasks: &[Value]) -> Result<Vec<BulkPrediction>> {
        if !self.is_trained() {
            return Err(AppError::ServiceUnavailable(
                "timeline model is not trained".to_string(),
            ));
        }
        if tasks.len() > self.config.max_bulk_tasks {
            return Err(AppError::Capacity(format!(
                "at most {} tasks per request, got {}",
                self.config.max_bulk_tasks,
                tasks.len()
            )));
        }

        Ok(tasks
            .iter()
            .map(|task| {
                let mut prediction = self.predict(task);
                prediction.factors.truncate(BULK_FACTORS);
                BulkPrediction {
                    task_id: task.get("id").and_then(Value::as_i64),
                    prediction,
                }
            })
            .collect())
    }

    /// Completed tasks with a positive observed duration.
    ///
    /// Status and dates are read on their own, so a task whose other fields
    /// are unreadable is kept with the safe default features.
    pub fn training_samples(&self, tasks: &[Value]) -> Vec<TrainingSample> {
        tasks
            .iter()
            .filter_map(|task| {
                let schedule = TaskRecord::schedule(task)?;
                if !schedule.is_completed() {
                    return None;
                }
                let actual_days = schedule.actual_days();
                (actual_days > 0.0).then(|| TrainingSample {
                    features: self.extractor.extract(task),
                    actual_days,
                })
            })
            .collect()
    }

    /// Fit a new model on historical tasks and swap it in.
    ///
    /// Refuses without touching the current model when too few usable
    /// samples are given.
    pub fn train(&self, tasks: &[Value]) -> Result<TrainingReport> {
        let _guard = self.train_lock.lock();

        let samples = self.training_samples(tasks);
        if samples.len() < self.config.min_training_samples {
            warn!(
                usable = samples.len(),
                required = self.config.min_training_samples,
                "Not enough data to train"
            );
            return Err(AppError::InsufficientData {
                usable: samples.len(),
                required: self.config.min_training_samples,
            });
        }

        info!(samples = samples.len(), "Training timeline model");
        let model = TimelineModel::fit(&samples, self.config.n_trees, self.config.test_split)?;
        let metadata = model.metadata().clone();
        info!(
            train_r2 = ?metadata.train_r2,
            test_r2 = ?metadata.test_r2,
            "Timeline model trained"
        );

        let persisted = match &self.paths {
            Some(paths) => match paths.persist(&model) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Failed to persist timeline model");
                    false
                }
            },
            None => false,
        };

        *self.snapshot.write() = Arc::new(ModelSnapshot {
            model: Some(Arc::new(model)),
            state: LoaderState::Loaded {
                strategy: "trained".to_string(),
            },
        });

        Ok(TrainingReport {
            samples: samples.len(),
            train_r2: metadata.train_r2,
            test_r2: metadata.test_r2,
            trained_at: metadata.trained_at,
            persisted,
        })
    }

    fn ml_tier(
        model: &TimelineModel,
        features: &TaskFeatures,
        start: Option<DateTime<FixedOffset>>,
    ) -> Result<PredictionResult> {
        let mut input = features.clone();
        if input.estimated_hours <= 0.0 {
            input.estimated_hours = HOURS_PER_DAY;
        }

        let raw = model.predict_days(&input)?;
        if !raw.is_finite() {
            return Err(AppError::Transform(format!("model produced {}", raw)));
        }
        let days = clamp_days(raw);

        let mut confidence = ML_BASE_CONFIDENCE + deviation_adjustment(days, input.estimated_hours);
        if input.dependency_count > 5 {
            confidence -= 0.05;
        }
        if input.word_count > 50 {
            confidence += 0.03;
        } else if input.word_count < 10 {
            confidence -= 0.03;
        }

        Ok(PredictionResult {
            predicted_days: days,
            confidence: confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
            predicted_completion_date: start.and_then(|s| add_business_days(s, days)),
            factors: rationale(&input),
            method: PredictionMethod::Ml,
        })
    }

    /// Heuristic estimate from hours and feature multipliers
    pub fn rule_based_tier(
        features: &TaskFeatures,
        start: Option<DateTime<FixedOffset>>,
    ) -> PredictionResult {
        let base = (features.estimated_hours / HOURS_PER_DAY).round();
        let multiplier = priority_factor(features.priority)
            * team_size_factor(features.team_size)
            * task_type_factor(features.task_type)
            * dependency_factor(features.dependency_count)
            * word_count_factor(features.word_count);
        let days = clamp_days(base * multiplier);

        let confidence = RULE_BASE_CONFIDENCE + deviation_adjustment(days, features.estimated_hours);

        PredictionResult {
            predicted_days: days,
            confidence: confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
            predicted_completion_date: start.and_then(|s| add_business_days(s, days)),
            factors: rationale(features),
            method: PredictionMethod::RuleBased,
        }
    }

    fn emergency_tier(task: &Value) -> Result<PredictionResult> {
        let hours = emergency_hours(task)?;
        let days = clamp_days(hours / EMERGENCY_HOURS_PER_DAY);

        Ok(PredictionResult {
            predicted_days: days,
            confidence: EMERGENCY_CONFIDENCE,
            predicted_completion_date: None,
            factors: vec![
                "Task details could not be processed".to_string(),
                format!(
                    "Estimated from {} hours at {} hours per day",
                    format_hours(hours),
                    EMERGENCY_HOURS_PER_DAY
                ),
            ],
            method: PredictionMethod::Emergency,
        })
    }

    fn default_tier() -> PredictionResult {
        PredictionResult {
            predicted_days: DEFAULT_DAYS,
            confidence: DEFAULT_CONFIDENCE,
            predicted_completion_date: None,
            factors: vec!["Default estimate used because the task data was unreadable".to_string()],
            method: PredictionMethod::Default,
        }
    }
}

/// Whole days in `1..=MAX_PREDICTED_DAYS`
fn clamp_days(raw: f64) -> u32 {
    if raw.is_nan() {
        return 1;
    }
    raw.round().clamp(1.0, f64::from(MAX_PREDICTED_DAYS)) as u32
}

/// Raw estimated hours for the emergency tier; 16 when absent
fn emergency_hours(task: &Value) -> Result<f64> {
    let raw = ["estimatedHours", "estimated_hours"]
        .iter()
        .filter_map(|key| task.get(*key))
        .find(|v| !v.is_null());

    let hours = match raw {
        None => return Ok(EMERGENCY_DEFAULT_HOURS),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    hours
        .filter(|h| h.is_finite())
        .map(|h| h.max(0.0))
        .ok_or_else(|| AppError::Transform("estimated hours are not numeric".to_string()))
}

/// Confidence adjustment for how far the prediction strays from hours / 8
pub fn deviation_adjustment(predicted_days: u32, estimated_hours: f64) -> f64 {
    let deviation = (predicted_days as f64 - estimated_hours / HOURS_PER_DAY).abs();
    if deviation <= 2.0 {
        0.08
    } else if deviation <= 5.0 {
        0.0
    } else {
        -0.1
    }
}

fn priority_factor(priority: Priority) -> f64 {
    match priority {
        Priority::High => 0.85,
        Priority::Medium => 1.0,
        Priority::Low => 1.15,
    }
}

fn team_size_factor(team_size: TeamSize) -> f64 {
    match team_size {
        TeamSize::Large => 1.25,
        TeamSize::Medium => 1.0,
        TeamSize::Small => 0.9,
    }
}

fn task_type_factor(task_type: TaskType) -> f64 {
    match task_type {
        TaskType::Development => 1.3,
        TaskType::Testing => 1.1,
        TaskType::Research => 1.5,
        TaskType::Documentation => 0.8,
        TaskType::Meeting => 0.6,
        TaskType::Design | TaskType::Other => 1.0,
    }
}

fn dependency_factor(dependency_count: u32) -> f64 {
    match dependency_count {
        0 => 0.95,
        n if n > 5 => 1.4,
        n if n > 2 => 1.2,
        _ => 1.0,
    }
}

fn word_count_factor(word_count: u32) -> f64 {
    if word_count > 100 {
        1.15
    } else if word_count > 50 {
        1.05
    } else if word_count < 10 {
        0.9
    } else {
        1.0
    }
}

/// Ordered rationale from the bands that fired
fn rationale(features: &TaskFeatures) -> Vec<String> {
    let mut factors = Vec::new();

    match features.dependency_count {
        0 => factors.push("No dependencies on other tasks".to_string()),
        n if n > 5 => factors.push(format!("Many dependencies ({}) significantly extend the timeline", n)),
        n if n > 2 => factors.push(format!("Several dependencies ({}) extend the timeline", n)),
        _ => {}
    }

    if features.estimated_hours > 0.0 {
        factors.push(format!(
            "Based on an estimate of {} hours",
            format_hours(features.estimated_hours)
        ));
    }

    match features.priority {
        Priority::High => factors.push("High priority tasks tend to finish faster".to_string()),
        Priority::Low => factors.push("Low priority tasks tend to take longer".to_string()),
        Priority::Medium => {}
    }

    if task_type_factor(features.task_type) != 1.0 {
        factors.push(format!("Task type: {}", features.task_type));
    }

    if features.word_count > 100 {
        factors.push(format!("Very detailed description ({} words)", features.word_count));
    } else if features.word_count > 50 {
        factors.push(format!("Detailed description ({} words)", features.word_count));
    } else if features.word_count < 10 {
        factors.push(format!("Brief description ({} words)", features.word_count));
    }

    factors.truncate(MAX_FACTORS);
    factors
}

fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{:.0}", hours)
    } else {
        format!("{:.1}", hours)
    }
}

/// Advance `days` business days (Monday to Friday) from `start`.
///
/// `None` when the result falls outside chrono's calendar.
pub fn add_business_days(
    start: DateTime<FixedOffset>,
    days: u32,
) -> Option<DateTime<FixedOffset>> {
    if days == 0 {
        return Some(start);
    }

    // Any 7 consecutive days hold exactly 5 business days
    let weeks = (days - 1) / 5;
    if weeks > MAX_SPAN_WEEKS {
        return None;
    }
    let mut remaining = days - weeks * 5;
    let mut current = start.checked_add_signed(Duration::weeks(i64::from(weeks)))?;

    while remaining > 0 {
        current = current.checked_add_signed(Duration::days(1))?;
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    Some(current)
}

/// Compare a prediction with the planned window of a task
pub fn schedule_advice(record: &TaskRecord, predicted_days: u32) -> ScheduleAdvice {
    ScheduleAdvice {
        suggest_earlier_start: false,
        suggest_later_end: record
            .planned_days()
            .map(|planned| i64::from(predicted_days) > planned)
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn untrained() -> TimelinePredictor {
        TimelinePredictor::new(PredictionConfig::default())
    }

    fn completed_task(i: i64, hours: f64, days: i64) -> Value {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = start + Duration::days(days - 1);
        let priority = if i % 2 == 0 { "High" } else { "Low" };
        json!({
            "id": i,
            "name": format!("Implement feature {}", i),
            "status": "Completed",
            "priority": priority,
            "estimatedHours": hours,
            "startDate": format!("{}T00:00:00Z", start),
            "endDate": format!("{}T00:00:00Z", end)
        })
    }

    #[test]
    fn test_rule_based_example() {
        let result = untrained().predict(&json!({
            "priority": "High",
            "team_size": "Large",
            "task_type": "Development",
            "estimated_hours": 40,
            "dependency_count": 3,
            "word_count": 60
        }));

        assert_eq!(result.predicted_days, 9);
        assert_eq!(result.method, PredictionMethod::RuleBased);
        assert!((result.confidence - 0.68).abs() < 1e-9);
        assert_eq!(
            result.factors,
            vec![
                "Several dependencies (3) extend the timeline",
                "Based on an estimate of 40 hours",
                "High priority tasks tend to finish faster",
                "Task type: Development",
                "Detailed description (60 words)",
            ]
        );
    }

    #[test]
    fn test_rule_based_floor_is_one_day() {
        let result = untrained().predict(&json!({ "name": "Quick sync meeting", "estimated_hours": 1 }));
        assert_eq!(result.predicted_days, 1);
        assert!(result.confidence >= 0.4 && result.confidence <= 0.95);
    }

    #[test]
    fn test_emergency_tier() {
        let result = untrained().predict(&json!({ "estimatedHours": 30, "word_count": "lots" }));
        assert_eq!(result.method, PredictionMethod::Emergency);
        assert_eq!(result.predicted_days, 5);
        assert_eq!(result.confidence, 0.5);
        assert!(result.predicted_completion_date.is_none());

        let result = untrained().predict(&json!([1, 2, 3]));
        assert_eq!(result.method, PredictionMethod::Emergency);
        assert_eq!(result.predicted_days, 3);
    }

    #[test]
    fn test_default_tier() {
        let result = untrained().predict(&json!({ "estimatedHours": "unknown" }));
        assert_eq!(result.method, PredictionMethod::Default);
        assert_eq!(result.predicted_days, 3);
        assert_eq!(result.confidence, 0.3);
    }

    #[test]
    fn test_business_days_skip_weekend() {
        let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap();
        let monday = at("2024-03-04T09:00:00Z");

        assert_eq!(add_business_days(monday, 5), Some(at("2024-03-11T09:00:00Z")));
        assert_eq!(add_business_days(monday, 10), Some(at("2024-03-18T09:00:00Z")));
        assert_eq!(add_business_days(monday, 11), Some(at("2024-03-19T09:00:00Z")));
        assert_eq!(
            add_business_days(at("2024-03-08T09:00:00Z"), 1),
            Some(at("2024-03-11T09:00:00Z"))
        );
        assert_eq!(
            add_business_days(at("2024-03-09T09:00:00Z"), 5),
            Some(at("2024-03-15T09:00:00Z"))
        );
        assert_eq!(add_business_days(monday, 0), Some(monday));
    }

    #[test]
    fn test_business_days_match_day_by_day_count() {
        let saturday = DateTime::parse_from_rfc3339("2024-03-02T12:00:00+07:00").unwrap();
        for offset in 0..7 {
            let start = saturday + Duration::days(offset);
            let mut current = start;
            for days in 1..=40 {
                current = current + Duration::days(1);
                while matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                    current = current + Duration::days(1);
                }
                assert_eq!(add_business_days(start, days), Some(current), "{start} + {days}");
            }
        }
    }

    #[test]
    fn test_business_days_past_calendar_end() {
        let start = DateTime::parse_from_rfc3339("2024-03-04T00:00:00Z").unwrap();
        assert_eq!(add_business_days(start, u32::MAX), None);

        let utc = FixedOffset::east_opt(0).unwrap();
        let last_day = utc.from_utc_datetime(&chrono::NaiveDate::MAX.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(add_business_days(last_day, 1), None);
        assert_eq!(add_business_days(last_day, 30), None);
    }

    #[test]
    fn test_huge_estimate_is_bounded() {
        let predictor = untrained();
        let result = predictor.predict(&json!({
            "estimated_hours": 1e12,
            "startDate": "2024-03-04T00:00:00Z"
        }));

        assert_eq!(result.method, PredictionMethod::RuleBased);
        assert_eq!(result.predicted_days, MAX_PREDICTED_DAYS);
        let date = result.predicted_completion_date.unwrap();
        assert!(!matches!(date.weekday(), Weekday::Sat | Weekday::Sun));

        let emergency = predictor.predict(&json!({ "estimated_hours": 1e300, "word_count": "many" }));
        assert_eq!(emergency.method, PredictionMethod::Emergency);
        assert_eq!(emergency.predicted_days, MAX_PREDICTED_DAYS);
    }

    #[test]
    fn test_completion_date_uses_business_days() {
        let result = untrained().predict(&json!({
            "estimated_hours": 40,
            "priority": "Medium",
            "team_size": "Medium",
            "task_type": "Design",
            "dependency_count": 1,
            "word_count": 20,
            "startDate": "2024-03-04T00:00:00Z"
        }));

        assert_eq!(result.predicted_days, 5);
        assert_eq!(
            result.predicted_completion_date,
            Some(DateTime::parse_from_rfc3339("2024-03-11T00:00:00Z").unwrap())
        );
    }

    #[test]
    fn test_deviation_adjustment() {
        assert_eq!(deviation_adjustment(5, 40.0), 0.08);
        assert_eq!(deviation_adjustment(9, 40.0), 0.0);
        assert_eq!(deviation_adjustment(20, 40.0), -0.1);
    }

    #[test]
    fn test_train_refuses_small_dataset() {
        let predictor = untrained();
        let tasks: Vec<Value> = (0..4).map(|i| completed_task(i, 16.0, 3)).collect();

        let state_before = predictor.loader_state();
        let result = predictor.train(&tasks);

        assert!(matches!(
            result,
            Err(AppError::InsufficientData { usable: 4, required: 5 })
        ));
        assert!(!predictor.is_trained());
        assert_eq!(predictor.loader_state(), state_before);
    }

    #[test]
    fn test_training_samples_filter() {
        let predictor = untrained();
        let mut not_done = completed_task(1, 8.0, 2);
        not_done["status"] = json!("In Progress");
        let mut no_dates = completed_task(2, 8.0, 2);
        no_dates.as_object_mut().unwrap().remove("startDate");

        let tasks = vec![completed_task(0, 8.0, 2), not_done, no_dates];
        let samples = predictor.training_samples(&tasks);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].actual_days, 2.0);
    }

    #[test]
    fn test_unreadable_fields_keep_training_sample() {
        let predictor = untrained();
        let mut tasks: Vec<Value> = (0..5).map(|i| completed_task(i, 8.0 * (i + 1) as f64, i + 1)).collect();
        tasks[2]["word_count"] = json!("n/a");

        let samples = predictor.training_samples(&tasks);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[2].features, TaskFeatures::safe_default());
        assert_eq!(samples[2].actual_days, 3.0);

        let report = predictor.train(&tasks).unwrap();
        assert_eq!(report.samples, 5);
    }

    #[test]
    fn test_train_then_predict_with_model() {
        let predictor = untrained();
        let tasks: Vec<Value> = (0..10)
            .map(|i| completed_task(i, 8.0 * (i + 1) as f64, i + 1))
            .collect();

        let report = predictor.train(&tasks).unwrap();
        assert_eq!(report.samples, 10);
        assert!(!report.persisted);
        assert!(predictor.is_trained());
        assert_eq!(
            predictor.loader_state(),
            LoaderState::Loaded {
                strategy: "trained".to_string()
            }
        );

        let result = predictor.predict(&json!({ "name": "Implement export", "estimatedHours": 24 }));
        assert_eq!(result.method, PredictionMethod::Ml);
        assert!(result.predicted_days >= 1);
        assert!(result.confidence >= 0.4 && result.confidence <= 0.95);
        assert!(result.factors.len() <= 5);
    }

    #[test]
    fn test_bulk_requires_model() {
        let result = untrained().predict_bulk(&[json!({ "id": 1 })]);
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    }

    #[test]
    fn test_bulk_caps_and_truncates_factors() {
        let predictor = untrained();
        let tasks: Vec<Value> = (0..8).map(|i| completed_task(i, 8.0 * (i + 1) as f64, i + 1)).collect();
        predictor.train(&tasks).unwrap();

        let too_many: Vec<Value> = (0..51).map(|i| json!({ "id": i })).collect();
        assert!(matches!(predictor.predict_bulk(&too_many), Err(AppError::Capacity(_))));

        let results = predictor
            .predict_bulk(&[json!({
                "id": 7,
                "priority": "High",
                "task_type": "Development",
                "estimated_hours": 40,
                "dependency_count": 3,
                "word_count": 60
            })])
            .unwrap();
        assert_eq!(results[0].task_id, Some(7));
        assert!(results[0].prediction.factors.len() <= 3);
    }

    #[test]
    fn test_schedule_advice() {
        let record = TaskRecord::from_value(&json!({
            "startDate": "2024-03-04T00:00:00Z",
            "endDate": "2024-03-06T00:00:00Z"
        }))
        .unwrap();

        assert!(schedule_advice(&record, 5).suggest_later_end);
        assert!(!schedule_advice(&record, 3).suggest_later_end);
        assert!(!schedule_advice(&TaskRecord::default(), 10).suggest_later_end);
        assert!(!schedule_advice(&record, 1).suggest_earlier_start);
    }
}
