// Prometheus metrics for the judge API

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Graded submissions by language and terminal verdict
    pub static ref SUBMISSIONS: CounterVec = CounterVec::new(
        Opts::new("judge_submissions_total", "Total graded submissions"),
        &["language", "verdict"]
    )
    .expect("metric can be created");

    // Sample runs by language and outcome
    pub static ref SAMPLE_RUNS: CounterVec = CounterVec::new(
        Opts::new("judge_sample_runs_total", "Total sample test runs"),
        &["language", "outcome"]
    )
    .expect("metric can be created");

    // Custom-input runs by language and outcome
    pub static ref CUSTOM_RUNS: CounterVec = CounterVec::new(
        Opts::new("judge_custom_runs_total", "Total custom input runs"),
        &["language", "outcome"]
    )
    .expect("metric can be created");

    // Calls to the execution service
    pub static ref EXECUTION_CALLS: CounterVec = CounterVec::new(
        Opts::new("judge_execution_calls_total", "Total execution service calls"),
        &["language", "outcome"]
    )
    .expect("metric can be created");

    // Wall time of a whole evaluation (milliseconds)
    pub static ref EVALUATION_TIME: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "judge_evaluation_time_ms",
            "Evaluation wall time in milliseconds"
        )
        .buckets(vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]),
        &["mode"]
    )
    .expect("metric can be created");

    // Requests rejected before evaluation
    pub static ref REQUESTS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("judge_requests_rejected_total", "Total requests rejected"),
        &["reason"]
    )
    .expect("metric can be created");

    // Debounced draft writes
    pub static ref DRAFT_FLUSHES: CounterVec = CounterVec::new(
        Opts::new("judge_draft_flushes_total", "Total draft writes"),
        &["outcome"]
    )
    .expect("metric can be created");
}

/// Initialize metrics registry
pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(SUBMISSIONS.clone()))?;
    REGISTRY.register(Box::new(SAMPLE_RUNS.clone()))?;
    REGISTRY.register(Box::new(CUSTOM_RUNS.clone()))?;
    REGISTRY.register(Box::new(EXECUTION_CALLS.clone()))?;
    REGISTRY.register(Box::new(EVALUATION_TIME.clone()))?;
    REGISTRY.register(Box::new(REQUESTS_REJECTED.clone()))?;
    REGISTRY.register(Box::new(DRAFT_FLUSHES.clone()))?;
    Ok(())
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_submission(language: &str, verdict: &str) {
    SUBMISSIONS.with_label_values(&[language, verdict]).inc();
}

pub fn record_sample_run(language: &str, outcome: &str) {
    SAMPLE_RUNS.with_label_values(&[language, outcome]).inc();
}

pub fn record_custom_run(language: &str, outcome: &str) {
    CUSTOM_RUNS.with_label_values(&[language, outcome]).inc();
}

pub fn record_execution_call(language: &str, outcome: &str) {
    EXECUTION_CALLS.with_label_values(&[language, outcome]).inc();
}

pub fn observe_evaluation(mode: &str, elapsed_ms: f64) {
    EVALUATION_TIME.with_label_values(&[mode]).observe(elapsed_ms);
}

pub fn record_request_rejected(reason: &str) {
    REQUESTS_REJECTED.with_label_values(&[reason]).inc();
}

pub fn record_draft_flush(outcome: &str) {
    DRAFT_FLUSHES.with_label_values(&[outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let before = SUBMISSIONS.with_label_values(&["cpp", "Accepted"]).get();
        record_submission("cpp", "Accepted");
        record_submission("cpp", "Accepted");
        let after = SUBMISSIONS.with_label_values(&["cpp", "Accepted"]).get();
        assert_eq!(after - before, 2.0);
    }
}
