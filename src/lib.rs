//! Maternal Risk Inference Pipeline Library
//!
//! Predicts a discrete maternal-health risk category from a fixed vector of
//! clinical measurements: mean imputation, standardization, a weighted
//! ensemble of calibrated tree classifiers, and label decoding, served over
//! NATS from a versioned artifact bundle.

pub mod config;
pub mod consumer;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod producer;
pub mod schema;
pub mod types;

pub use config::AppConfig;
pub use consumer::RecordConsumer;
pub use error::PipelineError;
pub use labels::LabelCodec;
pub use models::inference::InferenceContext;
pub use models::store::{ArtifactBundle, ArtifactStore};
pub use preprocess::Preprocessor;
pub use producer::VerdictProducer;
pub use schema::FeatureVector;
pub use types::{record::RiskRecord, verdict::Verdict};
