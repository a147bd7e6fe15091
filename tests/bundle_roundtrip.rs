//! End-to-end bundle persistence tests: a bundle saved by the training side
//! and reloaded by the serving side must predict identically.

use chrono::Utc;
use maternal_risk_pipeline::labels::LabelCodec;
use maternal_risk_pipeline::models::classifier::{
    BaseModel, BoostedModel, CalibratedModel, Calibration, ForestModel, TreeNode,
};
use maternal_risk_pipeline::models::ensemble::WeightPolicy;
use maternal_risk_pipeline::models::inference::InferenceContext;
use maternal_risk_pipeline::models::store::{ArtifactBundle, ArtifactStore, BundleManifest};
use maternal_risk_pipeline::preprocess::Preprocessor;
use maternal_risk_pipeline::schema::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use maternal_risk_pipeline::types::record::RiskRecord;
use std::collections::HashMap;

fn leaf(values: &[f64]) -> TreeNode {
    TreeNode::Leaf {
        values: values.to_vec(),
    }
}

fn split(feature: usize, threshold: f64, left: TreeNode, right: TreeNode) -> TreeNode {
    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn row(values: [f64; FEATURE_COUNT]) -> FeatureVector {
    FeatureVector::from_slots(&values.map(Some)).unwrap()
}

fn training_bundle() -> ArtifactBundle {
    let mut preprocessor = Preprocessor::new();
    preprocessor
        .fit(&[
            row([22.0, 100.0, 65.0, 6.5, 98.0, 70.0]),
            row([35.0, 140.0, 95.0, 13.0, 100.0, 88.0]),
            row([29.0, 120.0, 80.0, 7.5, 98.6, 76.0]),
            row([48.0, 155.0, 100.0, 17.0, 101.0, 92.0]),
        ])
        .unwrap();

    let codec = LabelCodec::fit(&[
        "mid risk".to_string(),
        "high risk".to_string(),
        "low risk".to_string(),
    ])
    .unwrap();

    let forest = CalibratedModel {
        n_features: FEATURE_COUNT,
        n_classes: 3,
        base: BaseModel::RandomForest(ForestModel {
            trees: vec![
                split(1, 0.5, leaf(&[0.1, 0.6, 0.3]), leaf(&[0.7, 0.1, 0.2])),
                split(3, 0.0, leaf(&[0.2, 0.5, 0.3]), leaf(&[0.6, 0.1, 0.3])),
            ],
        }),
        calibration: Calibration::Sigmoid {
            a: vec![-3.0, -3.0, -3.0],
            b: vec![1.5, 1.5, 1.5],
        },
    };

    let boosted = CalibratedModel {
        n_features: FEATURE_COUNT,
        n_classes: 3,
        base: BaseModel::GradientBoosting(BoostedModel {
            init_scores: vec![0.0, 0.2, 0.1],
            learning_rate: 0.3,
            trees: vec![split(
                4,
                1.0,
                leaf(&[-0.2, 0.8, 0.1]),
                leaf(&[1.2, -0.6, 0.2]),
            )],
        }),
        calibration: Calibration::Identity,
    };

    let mut weights = HashMap::new();
    weights.insert("rf".to_string(), 0.6);
    weights.insert("gb".to_string(), 0.4);

    ArtifactBundle {
        manifest: BundleManifest {
            run_id: "itest-run-1".to_string(),
            created_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            model_names: vec!["rf".to_string(), "gb".to_string()],
            weights,
        },
        preprocessor,
        codec,
        models: vec![("rf".to_string(), forest), ("gb".to_string(), boosted)],
    }
}

fn probe_records() -> Vec<RiskRecord> {
    vec![
        RiskRecord::new("full".to_string())
            .with_age(30.0)
            .with_systolic_bp(145.0)
            .with_diastolic_bp(92.0)
            .with_bs(14.0)
            .with_body_temp(100.5)
            .with_heart_rate(90.0),
        RiskRecord::new("partial".to_string())
            .with_age(24.0)
            .with_bs(6.8),
        RiskRecord::new("empty".to_string()),
    ]
}

#[test]
fn saved_and_loaded_bundles_predict_identically() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());

    let bundle = training_bundle();
    store.save(&bundle).unwrap();
    let loaded = store.load().unwrap();

    let before = InferenceContext::from_bundle(bundle, WeightPolicy::Permissive).unwrap();
    let after = InferenceContext::from_bundle(loaded, WeightPolicy::Permissive).unwrap();

    for record in probe_records() {
        let a = before.predict_result(&record).unwrap();
        let b = after.predict_result(&record).unwrap();
        // Bit-for-bit identity across the persistence boundary.
        assert_eq!(a.combined, b.combined, "record {}", record.record_id);
        assert_eq!(a.predicted_index, b.predicted_index);
    }
}

#[test]
fn loaded_bundle_produces_consistent_verdicts() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store.save(&training_bundle()).unwrap();

    let ctx =
        InferenceContext::from_bundle(store.load().unwrap(), WeightPolicy::Permissive).unwrap();

    for record in probe_records() {
        let verdict = ctx.predict(&record).unwrap();

        assert_eq!(verdict.probabilities.len(), 3);
        let sum: f64 = verdict.probabilities.values().sum();
        assert!((sum - 1.0).abs() < 1e-9, "weights sum to 1, so must probs");

        let (argmax_label, _) = verdict
            .probabilities
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(&verdict.predicted_label, argmax_label);
    }
}

#[test]
fn renormalize_policy_restores_distribution() {
    let mut bundle = training_bundle();
    bundle.manifest.weights.insert("rf".to_string(), 1.2);
    bundle.manifest.weights.insert("gb".to_string(), 0.8);

    let ctx = InferenceContext::from_bundle(bundle, WeightPolicy::Renormalize).unwrap();
    let verdict = ctx.predict(&probe_records()[0]).unwrap();

    let sum: f64 = verdict.probabilities.values().sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[test]
fn reject_policy_refuses_bad_weights() {
    let mut bundle = training_bundle();
    bundle.manifest.weights.insert("rf".to_string(), 0.9);

    assert!(InferenceContext::from_bundle(bundle, WeightPolicy::Reject).is_err());
}

#[test]
fn tampered_bundle_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store.save(&training_bundle()).unwrap();

    // A model trained against a different width must be caught at load.
    let narrow = CalibratedModel {
        n_features: 4,
        n_classes: 3,
        base: BaseModel::RandomForest(ForestModel {
            trees: vec![leaf(&[0.3, 0.3, 0.4])],
        }),
        calibration: Calibration::Identity,
    };
    std::fs::write(
        dir.path().join("models/rf.json"),
        serde_json::to_vec(&narrow).unwrap(),
    )
    .unwrap();

    assert!(store.load().is_err());
}
