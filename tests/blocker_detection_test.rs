/// Integration tests for blocker detection
///
/// These tests exercise the detector end to end:
/// - Similarity scoring with phrase extraction
/// - Negation and resolution overrides
/// - Recency-weighted comment aggregation
/// - Loading a pretrained classifier from disk

use planner_ml::ml::{
    text_classifier::{TextClassifierArtifact, TEXT_CLASSIFIER_SCHEMA},
    BlockerDetector, Comment, DetectionConfig, DetectionStrategy, ModelType,
};

fn detector() -> BlockerDetector {
    BlockerDetector::new(DetectionConfig::default())
}

fn assert_disjoint(phrases: &[String]) {
    for (i, a) in phrases.iter().enumerate() {
        for (j, b) in phrases.iter().enumerate() {
            if i != j {
                assert!(!b.contains(a.as_str()), "{a:?} is contained in {b:?}");
            }
        }
    }
}

#[test]
fn test_english_blocker_end_to_end() {
    let result = detector().detect("Blocked, waiting.");

    assert!(result.is_blocker);
    assert!(result.confidence > 0.7 && result.confidence < 0.71);
    assert_eq!(result.flagged_phrases, vec!["blocked waiting".to_string()]);
    assert!(!result.recommendation.is_empty());
}

#[test]
fn test_indonesian_blocker_end_to_end() {
    let result = detector()
        .detect("Saya masih menunggu response dari tim backend sebelum bisa melanjutkan task ini.");

    assert!(result.is_blocker);
    assert!(result.confidence >= 0.2);
    assert!(!result.flagged_phrases.is_empty());
    assert!(result.flagged_phrases.len() <= 5);
}

#[test]
fn test_resolution_short_circuit() {
    let result = detector().detect("sudah selesai, resolved");

    assert!(!result.is_blocker);
    assert_eq!(result.confidence, 0.0);
    assert!(result.flagged_phrases.is_empty());
}

#[test]
fn test_detection_is_deterministic() {
    let detector = detector();
    let text = "Stuck on the migration, need help from the DBA team";

    assert_eq!(detector.detect(text), detector.detect(text));
}

#[test]
fn test_higher_threshold_never_adds_blockers() {
    let detector = detector();
    let texts = [
        "blocked, waiting",
        "need approval before release",
        "all good, shipped yesterday",
        "kendala di server staging",
    ];

    for text in texts {
        let loose = detector.detect_with_threshold(text, 0.2);
        let strict = detector.detect_with_threshold(text, 0.8);
        assert!(!strict.is_blocker || loose.is_blocker, "{text}");
        assert!((0.0..=1.0).contains(&loose.confidence));
    }
}

#[test]
fn test_missing_timestamps_sort_oldest() {
    let comments = vec![
        Comment::new("resolved, unblocked"),
        Comment::new("blocked").with_created_at("2024-01-01T10:00:00Z"),
    ];

    // The timestamped comment is the most recent one, so no early exit
    let result = detector().analyze_comments(&comments, 0.2);
    assert!(result.is_blocker);
    assert!((result.confidence - 1.0).abs() < 1e-9);
}

#[test]
fn test_comment_phrase_union_is_bounded() {
    let comments = vec![
        Comment::new("blocked by the API team").with_created_at("2024-01-01T09:00:00Z"),
        Comment::new("still waiting on approval").with_created_at("2024-01-02T09:00:00Z"),
        Comment::new("stuck on deployment, need help").with_created_at("2024-01-03T09:00:00Z"),
        Comment::new("pending review, delayed by dependency").with_created_at("2024-01-04T09:00:00Z"),
        Comment::new("masih menunggu akses, ada kendala").with_created_at("2024-01-05T09:00:00Z"),
    ];

    let result = detector().analyze_comments(&comments, 0.2);

    assert!(result.is_blocker);
    assert!(!result.flagged_phrases.is_empty());
    assert!(result.flagged_phrases.len() <= 5);
    assert_disjoint(&result.flagged_phrases);
}

#[test]
fn test_task_analysis_without_comments_uses_text() {
    let detector = detector();
    let result = detector.analyze_task("Integrate payments", "Waiting for vendor credentials", &[], 0.2);
    let direct = detector.detect_with_threshold("Integrate payments Waiting for vendor credentials", 0.2);

    assert_eq!(result, direct);
}

#[test]
fn test_pretrained_classifier_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocker_classifier.json");

    let artifact = TextClassifierArtifact {
        schema_version: TEXT_CLASSIFIER_SCHEMA,
        model_type: ModelType::LogisticRegression,
        vocabulary: vec!["blocked".to_string(), "waiting".to_string(), "done".to_string()],
        idf: vec![1.0, 1.0, 1.0],
        coefficients: vec![4.0, 3.0, -4.0],
        intercept: -1.0,
        ngram_range: (1, 1),
    };
    std::fs::write(&path, serde_json::to_vec(&artifact).unwrap()).unwrap();

    let detector = BlockerDetector::new(DetectionConfig {
        classifier_path: Some(path.to_string_lossy().into_owned()),
        ..DetectionConfig::default()
    });
    assert_eq!(detector.strategy(), DetectionStrategy::Pretrained);

    let result = detector.detect("we are blocked and waiting");
    assert!(result.is_blocker);
    let probabilities = result.probabilities.expect("pretrained results carry probabilities");
    assert!((probabilities.blocker + probabilities.not_blocker - 1.0).abs() < 1e-9);
    assert_eq!(probabilities.blocker, result.confidence);
    assert!(result.flagged_phrases.contains(&"blocked".to_string()));

    let clear = detector.detect("done");
    assert!(!clear.is_blocker);
}

#[test]
fn test_unreadable_classifier_falls_back_to_similarity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let detector = BlockerDetector::new(DetectionConfig {
        classifier_path: Some(path.to_string_lossy().into_owned()),
        ..DetectionConfig::default()
    });

    assert_eq!(detector.strategy(), DetectionStrategy::Similarity);
    assert!(detector.detect("blocked, waiting").is_blocker);
}
