//! Weighted combination of per-model probability distributions.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// What to do when the configured weights do not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightPolicy {
    /// Keep the weights as-is and log a warning (reference behavior).
    #[default]
    Permissive,
    /// Divide every weight by the sum so the combined output is a
    /// probability distribution.
    Renormalize,
    /// Refuse to build the combiner.
    Reject,
}

/// Combines per-model probability vectors into one distribution.
///
/// `result[c] = Σ_model weight[model] * probs[model][c]`, followed by a
/// stable argmax (ties broken by lowest class index).
#[derive(Debug, Clone)]
pub struct EnsembleCombiner {
    weights: HashMap<String, f64>,
}

impl EnsembleCombiner {
    /// Build a combiner, applying the weight-sum policy up front so every
    /// later `combine` call is unconditional.
    pub fn new(weights: HashMap<String, f64>, policy: WeightPolicy) -> Result<Self> {
        if weights.is_empty() {
            return Err(PipelineError::artifact("ensemble has no model weights"));
        }
        for (name, &w) in &weights {
            if !w.is_finite() || w < 0.0 {
                return Err(PipelineError::artifact(format!(
                    "weight for model '{name}' must be a non-negative finite number, got {w}"
                )));
            }
        }

        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
            return Ok(Self { weights });
        }

        match policy {
            WeightPolicy::Permissive => {
                warn!(
                    weight_sum = sum,
                    "ensemble weights do not sum to 1; combined output will not be a distribution"
                );
                Ok(Self { weights })
            }
            WeightPolicy::Renormalize => {
                if sum <= 0.0 {
                    return Err(PipelineError::artifact(
                        "ensemble weights sum to zero, cannot renormalize",
                    ));
                }
                let weights = weights
                    .into_iter()
                    .map(|(name, w)| (name, w / sum))
                    .collect();
                Ok(Self { weights })
            }
            WeightPolicy::Reject => Err(PipelineError::artifact(format!(
                "ensemble weights sum to {sum}, expected 1"
            ))),
        }
    }

    /// Equal weight per model name.
    pub fn equal_weights(model_names: &[String]) -> Result<Self> {
        let w = 1.0 / model_names.len() as f64;
        Self::new(
            model_names.iter().map(|n| (n.clone(), w)).collect(),
            WeightPolicy::Permissive,
        )
    }

    /// Weighted sum of per-model distributions, in the given model order.
    ///
    /// Every model must have a configured weight; an unknown model is an
    /// error rather than a silently defaulted weight.
    pub fn combine(&self, per_model: &[(String, Vec<f64>)]) -> Result<Vec<f64>> {
        let n_classes = per_model
            .first()
            .map(|(_, probs)| probs.len())
            .ok_or_else(|| PipelineError::artifact("no model outputs to combine"))?;

        let mut combined = vec![0.0; n_classes];
        for (name, probs) in per_model {
            let weight = self.weights.get(name).copied().ok_or_else(|| {
                PipelineError::artifact(format!("no ensemble weight for model '{name}'"))
            })?;
            if probs.len() != n_classes {
                return Err(PipelineError::Schema {
                    expected: n_classes,
                    actual: probs.len(),
                });
            }
            for (c, &p) in combined.iter_mut().zip(probs.iter()) {
                *c += weight * p;
            }
        }
        Ok(combined)
    }

    /// Index of the first maximum (stable, deterministic tie-break).
    pub fn argmax(probs: &[f64]) -> usize {
        let mut best = 0;
        for (i, &p) in probs.iter().enumerate() {
            if p > probs[best] {
                best = i;
            }
        }
        best
    }

    /// Configured weights.
    pub fn weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }

    /// Names the combiner has weights for.
    pub fn model_names(&self) -> Vec<&str> {
        self.weights.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(n, w)| (n.to_string(), *w)).collect()
    }

    fn reference_outputs() -> Vec<(String, Vec<f64>)> {
        vec![
            ("rf".to_string(), vec![0.1, 0.2, 0.7]),
            ("et".to_string(), vec![0.2, 0.3, 0.5]),
            ("gb".to_string(), vec![0.15, 0.25, 0.6]),
        ]
    }

    #[test]
    fn test_weighted_combination() {
        let combiner = EnsembleCombiner::new(
            weights(&[("rf", 0.33), ("et", 0.34), ("gb", 0.33)]),
            WeightPolicy::Permissive,
        )
        .unwrap();

        let combined = combiner.combine(&reference_outputs()).unwrap();

        // 0.33*[0.1,0.2,0.7] + 0.34*[0.2,0.3,0.5] + 0.33*[0.15,0.25,0.6]
        assert!((combined[0] - 0.1505).abs() < 1e-9);
        assert!((combined[1] - 0.2505).abs() < 1e-9);
        assert!((combined[2] - 0.599).abs() < 1e-9);
        assert_eq!(EnsembleCombiner::argmax(&combined), 2);

        let sum: f64 = combined.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_argmax_tie_breaks_low_index() {
        assert_eq!(EnsembleCombiner::argmax(&[0.4, 0.4, 0.2]), 0);
        assert_eq!(EnsembleCombiner::argmax(&[0.1, 0.45, 0.45]), 1);
    }

    #[test]
    fn test_unknown_model_is_error() {
        let combiner =
            EnsembleCombiner::new(weights(&[("rf", 1.0)]), WeightPolicy::Permissive).unwrap();
        let outputs = vec![("mystery".to_string(), vec![0.5, 0.5])];
        assert!(combiner.combine(&outputs).is_err());
    }

    #[test]
    fn test_reject_policy() {
        let err = EnsembleCombiner::new(
            weights(&[("rf", 0.5), ("et", 0.2)]),
            WeightPolicy::Reject,
        )
        .unwrap_err();
        assert!(err.to_string().contains("sum"));
    }

    #[test]
    fn test_renormalize_policy() {
        let combiner = EnsembleCombiner::new(
            weights(&[("rf", 2.0), ("et", 2.0)]),
            WeightPolicy::Renormalize,
        )
        .unwrap();
        let sum: f64 = combiner.weights().values().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((combiner.weights()["rf"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_permissive_keeps_weights() {
        let combiner = EnsembleCombiner::new(
            weights(&[("rf", 0.5), ("et", 0.2)]),
            WeightPolicy::Permissive,
        )
        .unwrap();
        assert!((combiner.weights()["et"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_negative_weight_rejected() {
        assert!(EnsembleCombiner::new(
            weights(&[("rf", -0.1), ("et", 1.1)]),
            WeightPolicy::Permissive
        )
        .is_err());
    }

    #[test]
    fn test_equal_weights() {
        let combiner =
            EnsembleCombiner::equal_weights(&["a".to_string(), "b".to_string()]).unwrap();
        let outputs = vec![
            ("a".to_string(), vec![0.8, 0.2]),
            ("b".to_string(), vec![0.4, 0.6]),
        ];
        let combined = combiner.combine(&outputs).unwrap();
        assert!((combined[0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_class_width_mismatch_rejected() {
        let combiner = EnsembleCombiner::new(
            weights(&[("rf", 0.5), ("et", 0.5)]),
            WeightPolicy::Permissive,
        )
        .unwrap();
        let outputs = vec![
            ("rf".to_string(), vec![0.5, 0.5]),
            ("et".to_string(), vec![0.2, 0.3, 0.5]),
        ];
        assert!(combiner.combine(&outputs).is_err());
    }
}
