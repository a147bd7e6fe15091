//! Verdict data structures emitted by the inference pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Final prediction for a single risk record.
///
/// Carries the winning class plus the complete combined probability map over
/// every known class; `predicted_label` is always the argmax of
/// `probabilities`. Produced fresh per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Unique verdict identifier
    pub verdict_id: String,

    /// Associated record ID
    pub record_id: String,

    /// Predicted risk class name
    pub predicted_label: String,

    /// Combined probability for every class (BTreeMap for stable JSON order)
    pub probabilities: BTreeMap<String, f64>,

    /// Each model's probability for the winning class
    pub model_scores: HashMap<String, f64>,

    /// Verdict generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl Verdict {
    /// Create a new verdict.
    pub fn new(
        record_id: String,
        predicted_label: String,
        probabilities: BTreeMap<String, f64>,
        model_scores: HashMap<String, f64>,
    ) -> Self {
        Self {
            verdict_id: uuid::Uuid::new_v4().to_string(),
            record_id,
            predicted_label,
            probabilities,
            model_scores,
            timestamp: Utc::now(),
        }
    }

    /// Combined probability of the predicted class.
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .get(&self.predicted_label)
            .copied()
            .unwrap_or(0.0)
    }
}
