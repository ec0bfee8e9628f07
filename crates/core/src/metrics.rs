//! Metrics definitions for the ingestion pipeline.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`. Recording is a no-op
//! when no recorder is installed (tests, `--migrate-only`).

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "blocks_indexed_total",
        "Total number of blocks successfully committed"
    );
    describe_histogram!(
        "block_processing_duration_seconds",
        "Time taken to fetch, decode and commit a block in seconds"
    );
    describe_gauge!("indexed_height", "Highest committed block height");
    describe_counter!(
        "decode_errors_total",
        "Total number of envelopes or messages that failed to decode"
    );
    describe_counter!(
        "unknown_messages_total",
        "Total number of messages without a registered transform, by chain profile"
    );
    describe_counter!(
        "fetch_retries_total",
        "Total number of block fetches retried on a fresh connection"
    );
    describe_counter!(
        "correlation_errors_total",
        "Total number of execution result queries that failed"
    );
}

/// Record a decode error.
///
/// # Arguments
/// * `stage` - What failed to decode ("envelope" or "message")
pub fn record_decode_error(stage: &str) {
    counter!("decode_errors_total", "stage" => stage.to_string()).increment(1);
}

/// Record a message skipped because no transform is registered for it.
///
/// Labelled by profile only: type URLs come from the chain and are unbounded.
/// The warn log carries the type URL.
pub fn record_unknown_message(profile: &str) {
    counter!("unknown_messages_total", "profile" => profile.to_string()).increment(1);
}

/// Record a committed block and move the height gauge.
pub fn record_block_indexed(height: u64) {
    counter!("blocks_indexed_total").increment(1);
    gauge!("indexed_height").set(height as f64);
}

/// Record block processing duration.
pub fn record_block_processing_duration(duration_secs: f64) {
    histogram!("block_processing_duration_seconds").record(duration_secs);
}

pub fn record_fetch_retry() {
    counter!("fetch_retries_total").increment(1);
}

pub fn record_correlation_error() {
    counter!("correlation_errors_total").increment(1);
}

/// A timer that automatically records duration when dropped.
pub struct ProcessingTimer {
    start: Instant,
}

impl ProcessingTimer {
    /// Start a new processing timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ProcessingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessingTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_block_processing_duration(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct KeyCapture(Mutex<Vec<Key>>);

    impl Recorder for KeyCapture {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            self.0.lock().push(key.clone());
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    // Test critique: le compteur ne doit pas porter l'URL de type, la cardinalité exploserait
    #[test]
    fn test_unknown_messages_labelled_by_profile() {
        let capture = KeyCapture::default();
        metrics::with_local_recorder(&capture, || record_unknown_message("iris"));

        let keys = capture.0.lock();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name(), "unknown_messages_total");
        let labels: Vec<(&str, &str)> = keys[0].labels().map(|l| (l.key(), l.value())).collect();
        assert_eq!(labels, vec![("profile", "iris")]);
    }
}
