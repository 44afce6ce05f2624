//! Prometheus metrics for report generation, served on `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    static ref GENERATIONS: IntCounterVec = counter(
        "report_generations_total",
        "Daily report generations by outcome",
        "outcome"
    );
    static ref DEGRADED_METRICS: IntCounterVec = counter(
        "report_degraded_metrics_total",
        "Aggregates that fell back to their default value",
        "metric"
    );
    static ref RENDER_ATTEMPTS: IntCounterVec = counter(
        "report_render_attempts_total",
        "PDF render attempts by outcome",
        "outcome"
    );
    static ref GENERATION_DURATION: Histogram = {
        let histogram = Histogram::with_opts(
            HistogramOpts::new(
                "report_generation_duration_seconds",
                "Wall-clock time of a daily report generation",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0]),
        )
        .expect("valid histogram options");
        REGISTRY
            .register(Box::new(histogram.clone()))
            .expect("histogram registered once");
        histogram
    };
}

fn counter(name: &str, help: &str, label: &str) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), &[label]).expect("valid counter options");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

pub fn record_generation(outcome: &str, seconds: f64) {
    GENERATIONS.with_label_values(&[outcome]).inc();
    GENERATION_DURATION.observe(seconds);
}

pub fn record_degraded_metric(metric: &str) {
    DEGRADED_METRICS.with_label_values(&[metric]).inc();
}

pub fn record_render_attempt(outcome: &str) {
    RENDER_ATTEMPTS.with_label_values(&[outcome]).inc();
}

/// Every registered metric in the Prometheus text format.
pub fn render_text() -> Result<String, prometheus::Error> {
    // Touch the lazies so families show up before their first observation.
    lazy_static::initialize(&GENERATIONS);
    lazy_static::initialize(&DEGRADED_METRICS);
    lazy_static::initialize(&RENDER_ATTEMPTS);
    lazy_static::initialize(&GENERATION_DURATION);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
