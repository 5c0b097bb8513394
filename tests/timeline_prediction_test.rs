/// Integration tests for timeline prediction
///
/// These tests verify the complete prediction cascade:
/// - Rule-based estimates while no model is trained
/// - Training on historical tasks and ML predictions
/// - Emergency and default tiers for malformed tasks
/// - Bulk prediction limits
/// - Unbounded estimates
/// - Concurrent prediction during retraining

use chrono::{DateTime, Datelike, Weekday};
use planner_ml::{
    error::AppError,
    ml::{
        predictor::{add_business_days, MAX_PREDICTED_DAYS},
        PredictionConfig, PredictionMethod, TimelinePredictor,
    },
};
use serde_json::{json, Value};
use std::sync::Arc;

fn predictor() -> TimelinePredictor {
    TimelinePredictor::new(PredictionConfig::default())
}

fn completed_task(id: i64, hours: u32, days: u32) -> Value {
    let priority = ["High", "Medium", "Low"][id as usize % 3];
    json!({
        "id": id,
        "name": format!("Implement endpoint {}", id),
        "description": "Add handler, validation and tests",
        "status": "Completed",
        "priority": priority,
        "teamSize": "Medium",
        "taskType": "Development",
        "estimatedHours": hours,
        "dependencyCount": id % 4,
        "startDate": "2024-02-01T00:00:00Z",
        "endDate": format!("2024-02-{:02}T00:00:00Z", days),
    })
}

fn history(n: i64) -> Vec<Value> {
    (0..n)
        .map(|i| completed_task(i, 8 * (i as u32 % 6 + 1), i as u32 % 6 + 1))
        .collect()
}

fn assert_in_bounds(confidence: f64) {
    assert!(
        (0.4..=0.95).contains(&confidence),
        "confidence {confidence} out of bounds"
    );
}

#[test]
fn test_rule_based_with_camel_case_fields() {
    let result = predictor().predict(&json!({
        "priority": "high",
        "teamSize": "Large",
        "taskType": "Development",
        "estimatedHours": 40,
        "dependencyCount": 3,
        "wordCount": 60
    }));

    assert_eq!(result.predicted_days, 9);
    assert_eq!(result.method, PredictionMethod::RuleBased);
    assert_in_bounds(result.confidence);
    assert!(result.predicted_completion_date.is_none());
    assert!(result.factors.len() <= 5);
}

#[test]
fn test_completion_dates_land_on_business_days() {
    let starts = [
        "2024-03-04T08:00:00+07:00",
        "2024-03-06T08:00:00+07:00",
        "2024-03-08T08:00:00+07:00",
        "2024-03-09T08:00:00+07:00",
    ];

    for start in starts {
        let start = DateTime::parse_from_rfc3339(start).unwrap();
        for days in 1..=12 {
            let end = add_business_days(start, days).unwrap();
            assert!(
                !matches!(end.weekday(), Weekday::Sat | Weekday::Sun),
                "{start} + {days} landed on {end}"
            );
            assert!(end > start);
            assert_eq!(end.offset(), start.offset());
        }
    }
}

#[test]
fn test_prediction_carries_completion_date() {
    let result = predictor().predict(&json!({
        "name": "Write release notes",
        "estimatedHours": 16,
        "startDate": "2024-03-08T09:00:00Z"
    }));

    let date = result.predicted_completion_date.unwrap();
    assert!(date > DateTime::parse_from_rfc3339("2024-03-08T09:00:00Z").unwrap());
    assert!(!matches!(date.weekday(), Weekday::Sat | Weekday::Sun));
}

#[test]
fn test_malformed_tasks_degrade() {
    let predictor = predictor();

    let emergency = predictor.predict(&json!({ "estimatedHours": 12, "dependencyCount": "several" }));
    assert_eq!(emergency.method, PredictionMethod::Emergency);
    assert_eq!(emergency.predicted_days, 2);
    assert_eq!(emergency.confidence, 0.5);

    let fallback = predictor.predict(&json!({ "estimatedHours": { "min": 4 } }));
    assert_eq!(fallback.method, PredictionMethod::Default);
    assert_eq!(fallback.predicted_days, 3);
    assert_eq!(fallback.confidence, 0.3);
}

#[test]
fn test_training_enables_ml_tier() {
    let predictor = predictor();
    assert!(!predictor.is_trained());

    let report = predictor.train(&history(12)).unwrap();
    assert_eq!(report.samples, 12);
    assert!(predictor.is_trained());
    assert!(predictor.model_metadata().is_some());

    let result = predictor.predict(&json!({
        "name": "Implement export",
        "priority": "Medium",
        "teamSize": "Medium",
        "taskType": "Development",
        "estimatedHours": 24,
        "startDate": "2024-04-01T00:00:00Z"
    }));

    assert_eq!(result.method, PredictionMethod::Ml);
    assert!(result.predicted_days >= 1);
    assert_in_bounds(result.confidence);
    assert!(result.predicted_completion_date.is_some());
    assert!(result.factors.len() <= 5);
}

#[test]
fn test_training_refusal_keeps_state() {
    let predictor = predictor();
    let mut tasks = history(4);
    let mut in_progress = completed_task(99, 8, 2);
    in_progress["status"] = json!("In Progress");
    tasks.push(in_progress);

    let err = predictor.train(&tasks).unwrap_err();
    assert!(matches!(err, AppError::InsufficientData { usable: 4, required: 5 }));
    assert!(!predictor.is_trained());

    let result = predictor.predict(&json!({ "estimatedHours": 8 }));
    assert_eq!(result.method, PredictionMethod::RuleBased);
}

#[test]
fn test_failed_retraining_keeps_current_model() {
    let predictor = predictor();
    predictor.train(&history(10)).unwrap();
    let trained_at = predictor.model_metadata().unwrap().trained_at;

    let err = predictor.train(&history(3)).unwrap_err();
    assert!(matches!(err, AppError::InsufficientData { usable: 3, required: 5 }));

    assert!(predictor.is_trained());
    assert_eq!(predictor.model_metadata().unwrap().trained_at, trained_at);
    assert_eq!(
        predictor.predict(&json!({ "name": "Implement export", "estimatedHours": 24 })).method,
        PredictionMethod::Ml
    );
}

#[test]
fn test_unreadable_numeric_field_still_trains() {
    let predictor = predictor();
    let mut tasks = history(5);
    tasks[1]["wordCount"] = json!("n/a");
    tasks[3]["estimatedHours"] = json!({ "min": 4 });

    let report = predictor.train(&tasks).unwrap();
    assert_eq!(report.samples, 5);
    assert!(predictor.is_trained());
}

#[test]
fn test_huge_estimates_stay_bounded() {
    let predictor = predictor();
    let task = json!({
        "name": "Rewrite everything",
        "estimated_hours": 1e12,
        "startDate": "2024-03-04T00:00:00Z"
    });

    let started = std::time::Instant::now();
    let untrained = predictor.predict(&task);
    assert_eq!(untrained.predicted_days, MAX_PREDICTED_DAYS);
    assert!(untrained.predicted_completion_date.is_some());

    predictor.train(&history(10)).unwrap();
    let trained = predictor.predict(&task);
    assert_eq!(trained.method, PredictionMethod::Ml);
    assert!((1..=MAX_PREDICTED_DAYS).contains(&trained.predicted_days));
    assert!(started.elapsed() < std::time::Duration::from_secs(5));

    let start = DateTime::parse_from_rfc3339("2024-03-04T00:00:00Z").unwrap();
    assert!(add_business_days(start, u32::MAX).is_none());
}

#[test]
fn test_bulk_prediction() {
    let predictor = predictor();
    assert!(matches!(
        predictor.predict_bulk(&[json!({ "id": 1 })]),
        Err(AppError::ServiceUnavailable(_))
    ));

    predictor.train(&history(10)).unwrap();

    let oversized: Vec<Value> = (0..51).map(|i| json!({ "id": i })).collect();
    assert!(matches!(
        predictor.predict_bulk(&oversized),
        Err(AppError::Capacity(_))
    ));

    let batch = vec![
        json!({ "id": 1, "name": "Implement login", "estimatedHours": 16, "dependencyCount": 4, "wordCount": 80 }),
        json!({ "id": 2, "estimatedHours": "soon" }),
        json!({ "id": 3, "name": "Team meeting", "estimatedHours": 2 }),
    ];
    let results = predictor.predict_bulk(&batch).unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(
        results.iter().map(|r| r.task_id).collect::<Vec<_>>(),
        vec![Some(1), Some(2), Some(3)]
    );
    assert!(results.iter().all(|r| r.prediction.factors.len() <= 3));
    assert_eq!(results[1].prediction.method, PredictionMethod::Default);
}

#[test]
fn test_predictions_during_retraining() {
    let predictor = Arc::new(predictor());
    predictor.train(&history(8)).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|i| {
            let predictor = predictor.clone();
            std::thread::spawn(move || {
                for hours in 1..20 {
                    let result = predictor.predict(&json!({
                        "name": format!("Task {i}"),
                        "estimatedHours": hours * 4
                    }));
                    assert!(result.predicted_days >= 1);
                    assert_eq!(result.method, PredictionMethod::Ml);
                }
            })
        })
        .collect();

    let writer = {
        let predictor = predictor.clone();
        std::thread::spawn(move || predictor.train(&history(15)).map(|r| r.samples))
    };

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(writer.join().unwrap().unwrap(), 15);
    assert!(predictor.is_trained());
}
