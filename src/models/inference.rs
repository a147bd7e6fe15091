//! The inference context: preprocessing, model fan-out, ensemble decision.

use crate::error::Result;
use crate::labels::LabelCodec;
use crate::models::classifier::CalibratedModel;
use crate::models::ensemble::{EnsembleCombiner, WeightPolicy};
use crate::models::store::ArtifactBundle;
use crate::preprocess::Preprocessor;
use crate::schema::FeatureVector;
use crate::types::record::RiskRecord;
use crate::types::verdict::Verdict;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Raw outcome of one inference call, before shaping into a [`Verdict`].
///
/// Kept separate so metrics can look at the per-model distributions
/// without re-running the models.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Combined probability per class index.
    pub combined: Vec<f64>,
    /// Each model's full distribution, in evaluation order.
    pub per_model: Vec<(String, Vec<f64>)>,
    /// Winning class index (stable argmax).
    pub predicted_index: usize,
}

/// Immutable inference state built once at startup from a loaded bundle.
///
/// Explicitly constructed and passed by reference into request handlers,
/// never a process-wide singleton. Holds no interior mutability and does no
/// I/O, so one `Arc<InferenceContext>` serves all concurrent requests
/// without locks.
pub struct InferenceContext {
    run_id: String,
    preprocessor: Preprocessor,
    models: Vec<(String, CalibratedModel)>,
    combiner: EnsembleCombiner,
    codec: LabelCodec,
}

impl InferenceContext {
    /// Build from a validated bundle, applying the weight policy once.
    pub fn from_bundle(bundle: ArtifactBundle, policy: WeightPolicy) -> Result<Self> {
        let combiner = EnsembleCombiner::new(bundle.manifest.weights.clone(), policy)?;

        info!(
            run_id = %bundle.manifest.run_id,
            models = ?bundle.manifest.model_names,
            classes = ?bundle.codec.classes(),
            "Inference context initialized"
        );

        Ok(Self {
            run_id: bundle.manifest.run_id,
            preprocessor: bundle.preprocessor,
            models: bundle.models,
            combiner,
            codec: bundle.codec,
        })
    }

    /// Assemble directly from parts (tests, training side).
    pub fn from_parts(
        run_id: String,
        preprocessor: Preprocessor,
        models: Vec<(String, CalibratedModel)>,
        combiner: EnsembleCombiner,
        codec: LabelCodec,
    ) -> Self {
        Self {
            run_id,
            preprocessor,
            models,
            combiner,
            codec,
        }
    }

    /// Run the full pipeline for one record.
    ///
    /// validate → impute → scale → per-model probabilities → weighted
    /// combine → argmax → decode. Either a complete verdict or an error;
    /// never a partial or defaulted prediction.
    pub fn predict(&self, record: &RiskRecord) -> Result<Verdict> {
        let result = self.predict_result(record)?;
        self.to_verdict(&record.record_id, &result)
    }

    /// Pipeline up to the decision, exposing per-model distributions.
    pub fn predict_result(&self, record: &RiskRecord) -> Result<PredictionResult> {
        let features = FeatureVector::from_record(record)?;
        let x = self.preprocessor.transform(&features)?;

        // Each model sees the identical preprocessed vector; no model
        // depends on another's output.
        let mut per_model = Vec::with_capacity(self.models.len());
        for (name, model) in &self.models {
            let probs = model.predict_proba(&x)?;
            per_model.push((name.clone(), probs));
        }

        let combined = self.combiner.combine(&per_model)?;
        let predicted_index = EnsembleCombiner::argmax(&combined);

        debug!(
            record_id = %record.record_id,
            predicted_index,
            combined = ?combined,
            "Ensemble inference complete"
        );

        Ok(PredictionResult {
            combined,
            per_model,
            predicted_index,
        })
    }

    fn to_verdict(&self, record_id: &str, result: &PredictionResult) -> Result<Verdict> {
        let predicted_label = self.codec.decode(result.predicted_index)?.to_string();

        let mut probabilities = BTreeMap::new();
        for (index, &p) in result.combined.iter().enumerate() {
            probabilities.insert(self.codec.decode(index)?.to_string(), p);
        }

        let model_scores: HashMap<String, f64> = result
            .per_model
            .iter()
            .map(|(name, probs)| (name.clone(), probs[result.predicted_index]))
            .collect();

        Ok(Verdict::new(
            record_id.to_string(),
            predicted_label,
            probabilities,
            model_scores,
        ))
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn classes(&self) -> &[String] {
        self.codec.classes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::{BaseModel, Calibration, ForestModel, TreeNode};
    use crate::preprocess::{MeanImputer, StandardScaler};
    use crate::schema::FEATURE_COUNT;

    /// A model that always answers with the same distribution.
    fn constant_model(probs: &[f64]) -> CalibratedModel {
        CalibratedModel {
            n_features: FEATURE_COUNT,
            n_classes: probs.len(),
            base: BaseModel::RandomForest(ForestModel {
                trees: vec![TreeNode::Leaf {
                    values: probs.to_vec(),
                }],
            }),
            calibration: Calibration::Identity,
        }
    }

    fn identity_preprocessor() -> Preprocessor {
        Preprocessor::from_parts(
            MeanImputer::from_means(vec![0.0; FEATURE_COUNT]),
            StandardScaler::from_stats(vec![0.0; FEATURE_COUNT], vec![1.0; FEATURE_COUNT]),
        )
    }

    fn reference_context() -> InferenceContext {
        let codec = LabelCodec::from_classes(vec![
            "Low".to_string(),
            "Mid".to_string(),
            "High".to_string(),
        ]);

        let mut weights = HashMap::new();
        weights.insert("rf".to_string(), 0.33);
        weights.insert("et".to_string(), 0.34);
        weights.insert("gb".to_string(), 0.33);
        let combiner = EnsembleCombiner::new(weights, WeightPolicy::Permissive).unwrap();

        InferenceContext::from_parts(
            "test-run".to_string(),
            identity_preprocessor(),
            vec![
                ("rf".to_string(), constant_model(&[0.1, 0.2, 0.7])),
                ("et".to_string(), constant_model(&[0.2, 0.3, 0.5])),
                ("gb".to_string(), constant_model(&[0.15, 0.25, 0.6])),
            ],
            combiner,
            codec,
        )
    }

    fn full_record() -> RiskRecord {
        RiskRecord::new("rec_1".to_string())
            .with_age(30.0)
            .with_systolic_bp(120.0)
            .with_diastolic_bp(80.0)
            .with_bs(7.0)
            .with_body_temp(98.0)
            .with_heart_rate(75.0)
    }

    #[test]
    fn test_reference_ensemble_scenario() {
        let ctx = reference_context();
        let verdict = ctx.predict(&full_record()).unwrap();

        assert_eq!(verdict.predicted_label, "High");
        assert!((verdict.probabilities["Low"] - 0.1505).abs() < 1e-9);
        assert!((verdict.probabilities["Mid"] - 0.2505).abs() < 1e-9);
        assert!((verdict.probabilities["High"] - 0.599).abs() < 1e-9);

        let sum: f64 = verdict.probabilities.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_predicted_label_is_argmax() {
        let ctx = reference_context();
        let verdict = ctx.predict(&full_record()).unwrap();

        let (argmax_label, _) = verdict
            .probabilities
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(&verdict.predicted_label, argmax_label);
    }

    #[test]
    fn test_all_missing_record_gets_valid_verdict() {
        let ctx = reference_context();
        let verdict = ctx
            .predict(&RiskRecord::new("empty".to_string()))
            .unwrap();

        assert_eq!(verdict.probabilities.len(), 3);
        assert_eq!(verdict.predicted_label, "High");
    }

    #[test]
    fn test_determinism() {
        let ctx = reference_context();
        let record = full_record();

        let a = ctx.predict_result(&record).unwrap();
        let b = ctx.predict_result(&record).unwrap();
        assert_eq!(a.combined, b.combined);
        assert_eq!(a.predicted_index, b.predicted_index);
    }

    #[test]
    fn test_verdict_carries_per_model_winning_scores() {
        let ctx = reference_context();
        let verdict = ctx.predict(&full_record()).unwrap();

        assert_eq!(verdict.model_scores.len(), 3);
        assert!((verdict.model_scores["rf"] - 0.7).abs() < 1e-9);
        assert!((verdict.model_scores["et"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_input_is_client_error() {
        let ctx = reference_context();
        let record = RiskRecord::new("bad".to_string()).with_bs(f64::INFINITY);
        assert!(matches!(
            ctx.predict(&record),
            Err(crate::error::PipelineError::Numeric { feature: "BS", .. })
        ));
    }
}
