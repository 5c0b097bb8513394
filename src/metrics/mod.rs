//! Prometheus metrics for the planner service.
//!
//! All metrics live in a single global registry under the `planner_ml`
//! namespace and are exported in text format on `/metrics`.
//!
//! ```no_run
//! use planner_ml::metrics::{self, PREDICTIONS_TOTAL};
//!
//! metrics::init_metrics().ok();
//! PREDICTIONS_TOTAL.with_label_values(&["rule_based"]).inc();
//! println!("{}", metrics::gather_metrics());
//! ```

mod middleware;

pub use middleware::MetricsLayer;

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntGauge, Opts, Registry,
};

const NAMESPACE: &str = "planner_ml";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// Number of in-flight HTTP requests
    pub static ref HTTP_REQUESTS_IN_FLIGHT: Gauge = Gauge::with_opts(
        Opts::new("http_requests_in_flight", "Number of in-flight HTTP requests")
            .namespace(NAMESPACE)
    ).expect("Failed to create HTTP_REQUESTS_IN_FLIGHT metric");

    // ============================================================================
    // Blocker Detection Metrics
    // ============================================================================

    /// Labels: strategy (similarity, pretrained), verdict (blocker, clear)
    pub static ref DETECTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("blocker_detections_total", "Total number of blocker detections")
            .namespace(NAMESPACE),
        &["strategy", "verdict"]
    ).expect("Failed to create DETECTIONS_TOTAL metric");

    /// Labels: operation (text, comments, task)
    pub static ref DETECTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "blocker_detection_duration_seconds",
            "Blocker detection duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation"]
    ).expect("Failed to create DETECTION_DURATION_SECONDS metric");

    // ============================================================================
    // Timeline Prediction Metrics
    // ============================================================================

    /// Labels: method (ml, rule_based, emergency, default)
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("timeline_predictions_total", "Total number of timeline predictions")
            .namespace(NAMESPACE),
        &["method"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Labels: outcome (success, insufficient_data, error)
    pub static ref TRAINING_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("training_runs_total", "Total number of timeline model training runs")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create TRAINING_RUNS_TOTAL metric");

    /// 1 while a trained timeline model is loaded
    pub static ref MODEL_LOADED: IntGauge = IntGauge::with_opts(
        Opts::new("timeline_model_loaded", "Whether a trained timeline model is loaded")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");

    // ============================================================================
    // System Metrics
    // ============================================================================

    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Application build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Register every metric with the global registry.
///
/// Call once at startup; a second call fails with `AlreadyReg`.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(DETECTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(DETECTION_DURATION_SECONDS.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(PREDICTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(TRAINING_RUNS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_LOADED.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(BUILD_INFO.clone()))?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Prometheus text exposition of the global registry
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
