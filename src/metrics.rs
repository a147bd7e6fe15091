//! Performance metrics and statistics tracking for the inference pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Total prediction requests completed
    pub predictions_processed: AtomicU64,
    /// Total requests that failed (client or internal errors)
    pub predictions_failed: AtomicU64,
    /// Verdicts by predicted class
    verdicts_by_label: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Winning-class confidence distribution buckets
    confidence_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
    /// Model agreement tracking (how often models agree on the winner)
    model_agreements: RwLock<Vec<f64>>,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions_processed: AtomicU64::new(0),
            predictions_failed: AtomicU64::new(0),
            verdicts_by_label: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
            model_agreements: RwLock::new(Vec::with_capacity(1000)),
        }
    }

    /// Record one completed prediction
    pub fn record_prediction(&self, processing_time: Duration, label: &str, confidence: f64) {
        self.predictions_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only recent samples for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut by_label) = self.verdicts_by_label.write() {
            *by_label.entry(label.to_string()).or_insert(0) += 1;
        }

        let bucket = (confidence * 10.0).min(9.0).max(0.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed prediction
    pub fn record_failure(&self) {
        self.predictions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record model agreement (std dev of winning-class scores)
    pub fn record_model_agreement(&self, model_scores: &HashMap<String, f64>) {
        if model_scores.len() < 2 {
            return;
        }

        let scores: Vec<f64> = model_scores.values().copied().collect();
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        let std_dev = variance.sqrt();

        // Agreement = 1 - std_dev (higher = models agree more)
        let agreement = 1.0 - std_dev.min(1.0);

        if let Ok(mut agreements) = self.model_agreements.write() {
            agreements.push(agreement);
            if agreements.len() > 1000 {
                agreements.drain(0..500);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self.processing_times.read().unwrap();
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get average model agreement
    pub fn get_avg_agreement(&self) -> f64 {
        let agreements = self.model_agreements.read().unwrap();
        if agreements.is_empty() {
            return 0.0;
        }
        agreements.iter().sum::<f64>() / agreements.len() as f64
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get winning-class confidence distribution
    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        *self.confidence_buckets.read().unwrap()
    }

    /// Get verdict counts by predicted class
    pub fn get_verdicts_by_label(&self) -> HashMap<String, u64> {
        self.verdicts_by_label.read().unwrap().clone()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let processed = self.predictions_processed.load(Ordering::Relaxed);
        let failed = self.predictions_failed.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let agreement = self.get_avg_agreement();
        let by_label = self.get_verdicts_by_label();
        let confidence_dist = self.get_confidence_distribution();

        info!(
            predictions = processed,
            failed = failed,
            throughput = format!("{:.1}/s", throughput),
            "Pipeline metrics summary"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            "Processing time"
        );
        info!(
            agreement = format!("{:.1}%", agreement * 100.0),
            "Model agreement (higher = models agree more)"
        );
        for (label, count) in &by_label {
            let pct = if processed > 0 {
                (*count as f64 / processed as f64) * 100.0
            } else {
                0.0
            };
            info!(label = %label, count = count, pct = format!("{pct:.1}%"), "Verdicts by class");
        }
        let total: u64 = confidence_dist.iter().sum();
        if total > 0 {
            for (i, &count) in confidence_dist.iter().enumerate() {
                let pct = (count as f64 / total as f64) * 100.0;
                info!(
                    bucket = format!("{:.1}-{:.1}", i as f64 / 10.0, (i + 1) as f64 / 10.0),
                    count = count,
                    pct = format!("{pct:.1}%"),
                    "Confidence distribution"
                );
            }
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
