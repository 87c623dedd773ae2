//! Request and latency statistics for the scoring service.

use crate::types::Prediction;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector for the scoring endpoint
pub struct ServiceMetrics {
    /// Requests that reached the handler
    pub requests_total: AtomicU64,
    /// Successful predictions of the fraud class
    pub fraud_predictions: AtomicU64,
    /// Successful predictions of the legitimate class
    pub legitimate_predictions: AtomicU64,
    /// Requests rejected by schema validation
    pub validation_rejections: AtomicU64,
    /// Requests that failed inside the model
    pub inference_failures: AtomicU64,
    /// Scoring latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Fraud probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            fraud_predictions: AtomicU64::new(0),
            legitimate_predictions: AtomicU64::new(0),
            validation_rejections: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record an incoming request
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, latency: Duration, prediction: &Prediction) {
        if prediction.is_fraud() {
            self.fraud_predictions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.legitimate_predictions.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }

        let bucket = ((prediction.fraud_probability * 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a request rejected by validation
    pub fn record_rejection(&self) {
        self.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed inference
    pub fn record_failure(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Total successful predictions
    pub fn predictions_total(&self) -> u64 {
        self.fraud_predictions.load(Ordering::Relaxed)
            + self.legitimate_predictions.load(Ordering::Relaxed)
    }

    /// Get latency statistics over the rolling window
    pub fn get_latency_stats(&self) -> LatencyStats {
        let mut sorted = match self.latencies.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return LatencyStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_total() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get fraud probability distribution
    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let fraud = self.fraud_predictions.load(Ordering::Relaxed);
        let legitimate = self.legitimate_predictions.load(Ordering::Relaxed);
        let rejected = self.validation_rejections.load(Ordering::Relaxed);
        let failed = self.inference_failures.load(Ordering::Relaxed);
        let fraud_rate = if fraud + legitimate > 0 {
            (fraud as f64 / (fraud + legitimate) as f64) * 100.0
        } else {
            0.0
        };

        let latency = self.get_latency_stats();

        info!(
            requests,
            predictions = fraud + legitimate,
            fraud,
            legitimate,
            fraud_rate = format!("{:.2}%", fraud_rate),
            rejected,
            failed,
            throughput = format!("{:.1} req/s", self.get_throughput()),
            "Scoring summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Scoring latency"
        );

        let distribution = self.get_probability_distribution();
        let total: u64 = distribution.iter().sum();
        if total > 0 {
            for (i, &count) in distribution.iter().enumerate() {
                let pct = (count as f64 / total as f64) * 100.0;
                let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
                info!(
                    "  p(fraud) {:.1}-{:.1}: {:>7} ({:>5.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    bar
                );
            }
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Logs a metrics summary at a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_request();
        metrics.record_request();
        metrics.record_request();
        metrics.record_prediction(
            Duration::from_micros(100),
            &Prediction::new(0, 0.05).unwrap(),
        );
        metrics.record_prediction(
            Duration::from_micros(300),
            &Prediction::new(1, 0.95).unwrap(),
        );
        metrics.record_rejection();

        assert_eq!(metrics.requests_total.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.predictions_total(), 2);
        assert_eq!(metrics.fraud_predictions.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.validation_rejections.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.inference_failures.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_latency_stats(), LatencyStats::default());

        for us in [100, 200, 300, 400] {
            metrics.record_prediction(
                Duration::from_micros(us),
                &Prediction::new(0, 0.1).unwrap(),
            );
        }

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.max_us, 400);
    }

    #[test]
    fn test_probability_buckets() {
        let metrics = ServiceMetrics::new();
        metrics.record_prediction(Duration::ZERO, &Prediction::new(0, 0.0).unwrap());
        metrics.record_prediction(Duration::ZERO, &Prediction::new(1, 1.0).unwrap());
        metrics.record_prediction(Duration::ZERO, &Prediction::new(0, 0.45).unwrap());

        let distribution = metrics.get_probability_distribution();
        assert_eq!(distribution[0], 1);
        assert_eq!(distribution[4], 1);
        assert_eq!(distribution[9], 1);
    }
}
