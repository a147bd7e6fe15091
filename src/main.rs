//! Maternal Risk Inference Pipeline - Main Entry Point
//!
//! Loads the trained artifact bundle, consumes risk records from NATS,
//! runs ensemble inference, and publishes verdicts. Replies directly when
//! a record carries a reply subject. Supports parallel request processing.

use anyhow::{Context, Result};
use futures::StreamExt;
use maternal_risk_pipeline::{
    config::AppConfig,
    consumer::RecordConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    models::inference::InferenceContext,
    models::store::ArtifactStore,
    producer::VerdictProducer,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("maternal_risk_pipeline=info".parse()?),
        )
        .init();

    info!("Starting Maternal Risk Inference Pipeline");

    // Load configuration
    let config = AppConfig::load()?;
    info!(
        bundle_dir = %config.artifacts.bundle_dir,
        weight_policy = ?config.artifacts.weight_policy,
        "Configuration loaded"
    );

    // Load the artifact bundle; refuse to serve on any inconsistency.
    let store = ArtifactStore::new(&config.artifacts.bundle_dir);
    let bundle = store
        .load()
        .context("Artifact bundle failed to load; refusing to start")?;
    let context = Arc::new(InferenceContext::from_bundle(
        bundle,
        config.artifacts.weight_policy,
    )?);
    info!(
        run_id = %context.run_id(),
        models = ?context.model_names(),
        classes = ?context.classes(),
        "Inference context ready"
    );

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    // Initialize consumer and producer
    let consumer = RecordConsumer::new(client.clone(), &config.nats.record_subject);
    let producer = Arc::new(VerdictProducer::new(
        client.clone(),
        &config.nats.verdict_subject,
    ));

    let num_workers = config.pipeline.workers;
    info!(
        workers = num_workers,
        record_subject = %config.nats.record_subject,
        verdict_subject = %config.nats.verdict_subject,
        "Starting record processing loop"
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let interval = config.pipeline.metrics_interval_secs;
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, interval);
        reporter.start().await;
    });

    // Process records in parallel
    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await?;

        let context = context.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            match RecordConsumer::decode(&message.payload) {
                Ok(record) => {
                    let record_id = record.record_id.clone();

                    match context.predict(&record) {
                        Ok(verdict) => {
                            let processing_time = start_time.elapsed();

                            metrics.record_prediction(
                                processing_time,
                                &verdict.predicted_label,
                                verdict.confidence(),
                            );
                            metrics.record_model_agreement(&verdict.model_scores);

                            if let Some(reply) = message.reply.clone() {
                                if let Err(e) =
                                    producer.reply(reply.to_string(), &verdict).await
                                {
                                    error!(record_id = %record_id, error = %e, "Failed to reply");
                                }
                            }

                            if let Err(e) = producer.publish(&verdict).await {
                                error!(
                                    record_id = %record_id,
                                    error = %e,
                                    "Failed to publish verdict"
                                );
                            } else {
                                debug!(
                                    record_id = %record_id,
                                    predicted_label = %verdict.predicted_label,
                                    confidence = verdict.confidence(),
                                    processing_time_us = processing_time.as_micros(),
                                    "Verdict published"
                                );
                            }

                            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                            if count % 100 == 0 {
                                let stats = metrics.get_processing_stats();
                                info!(
                                    processed = count,
                                    throughput = format!("{:.1}/s", metrics.get_throughput()),
                                    avg_latency_us = stats.mean_us,
                                    "Processing milestone"
                                );
                            }
                        }
                        Err(e) => {
                            metrics.record_failure();
                            error!(record_id = %record_id, error = %e, "Inference failed");
                        }
                    }
                }
                Err(e) => {
                    metrics.record_failure();
                    warn!(error = %e, "Failed to deserialize record");
                }
            }

            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
