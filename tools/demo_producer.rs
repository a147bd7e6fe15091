//! Test Record Producer
//!
//! Generates and publishes synthetic risk records to NATS for pipeline
//! testing. Occasionally drops fields so missing-value imputation is
//! exercised end to end.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Record structure matching the pipeline's expected format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RiskRecord {
    record_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    systolic_bp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diastolic_bp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    heart_rate: Option<f64>,
    timestamp: chrono::DateTime<Utc>,
}

/// Record generator for testing
struct RecordGenerator {
    rng: rand::rngs::ThreadRng,
    record_counter: u64,
}

impl RecordGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            record_counter: 0,
        }
    }

    /// Generate a record in the normal clinical range
    fn generate_routine(&mut self, missing_rate: f64) -> RiskRecord {
        self.record_counter += 1;

        RiskRecord {
            record_id: format!("rec_{:012}", self.record_counter),
            age: self.maybe(missing_rate, |r| r.gen_range(18.0..40.0)),
            systolic_bp: self.maybe(missing_rate, |r| r.gen_range(95.0..125.0)),
            diastolic_bp: self.maybe(missing_rate, |r| r.gen_range(60.0..85.0)),
            bs: self.maybe(missing_rate, |r| r.gen_range(6.0..7.5)),
            body_temp: self.maybe(missing_rate, |r| r.gen_range(97.0..99.0)),
            heart_rate: self.maybe(missing_rate, |r| r.gen_range(60.0..85.0)),
            timestamp: Utc::now(),
        }
    }

    /// Generate a record with elevated measurements
    fn generate_elevated(&mut self, missing_rate: f64) -> RiskRecord {
        self.record_counter += 1;

        RiskRecord {
            record_id: format!("rec_{:012}", self.record_counter),
            age: self.maybe(missing_rate, |r| r.gen_range(35.0..60.0)),
            systolic_bp: self.maybe(missing_rate, |r| r.gen_range(130.0..165.0)),
            diastolic_bp: self.maybe(missing_rate, |r| r.gen_range(90.0..110.0)),
            bs: self.maybe(missing_rate, |r| r.gen_range(11.0..19.0)),
            body_temp: self.maybe(missing_rate, |r| r.gen_range(100.0..103.0)),
            heart_rate: self.maybe(missing_rate, |r| r.gen_range(80.0..100.0)),
            timestamp: Utc::now(),
        }
    }

    fn maybe<F>(&mut self, missing_rate: f64, gen: F) -> Option<f64>
    where
        F: FnOnce(&mut rand::rngs::ThreadRng) -> f64,
    {
        if self.rng.gen_bool(missing_rate) {
            None
        } else {
            Some(gen(&mut self.rng))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("demo_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Record Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("risk.records");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let elevated_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.3);
    let missing_rate: f64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        elevated_rate = elevated_rate,
        missing_rate = missing_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, elevated_rate, missing_rate, delay_ms).await;
        }
    };

    // Generate and publish records
    let mut generator = RecordGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} records...", count);

    let mut routine_count = 0;
    let mut elevated_count = 0;

    for i in 0..count {
        let record = if rng.gen_bool(elevated_rate) {
            elevated_count += 1;
            generator.generate_elevated(missing_rate)
        } else {
            routine_count += 1;
            generator.generate_routine(missing_rate)
        };

        let payload = serde_json::to_vec(&record)?;

        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} records ({} routine, {} elevated)",
                i + 1,
                count,
                routine_count,
                elevated_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Published {} records ({} routine, {} elevated)",
        count, routine_count, elevated_count
    );

    Ok(())
}

async fn run_dry_mode(
    count: u64,
    elevated_rate: f64,
    missing_rate: f64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = RecordGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let record = if rng.gen_bool(elevated_rate) {
            generator.generate_elevated(missing_rate)
        } else {
            generator.generate_routine(missing_rate)
        };

        let json = serde_json::to_string_pretty(&record)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample record {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
