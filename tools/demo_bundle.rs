//! Demo Bundle Builder
//!
//! Writes a small but structurally complete artifact bundle so the service
//! can be run end to end without the offline training side: a preprocessor
//! fitted on a synthetic cohort, the three-class label codec, and three
//! hand-constructed tree models with the reference ensemble weights.
//!
//! The model parameters are illustrative, not trained; thresholds are in
//! standardized units (inputs are scaled before the models see them).

use anyhow::Result;
use chrono::Utc;
use maternal_risk_pipeline::labels::LabelCodec;
use maternal_risk_pipeline::models::classifier::{
    BaseModel, BoostedModel, CalibratedModel, Calibration, ForestModel, TreeNode,
};
use maternal_risk_pipeline::models::store::{ArtifactBundle, ArtifactStore, BundleManifest};
use maternal_risk_pipeline::preprocess::Preprocessor;
use maternal_risk_pipeline::schema::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use rand::Rng;
use std::collections::HashMap;
use tracing::info;

// Feature slot indices, per the schema order.
const SYSTOLIC_BP: usize = 1;
const BS: usize = 3;
const BODY_TEMP: usize = 4;

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

/// Synthetic cohort in plausible clinical ranges, with some missing slots.
fn synthetic_cohort(n: usize) -> Result<Vec<FeatureVector>> {
    let mut rng = rand::thread_rng();
    let mut rows = Vec::with_capacity(n);
    for _ in 0..n {
        let slots = [
            maybe(&mut rng, 18.0..55.0),
            maybe(&mut rng, 90.0..160.0),
            maybe(&mut rng, 55.0..110.0),
            maybe(&mut rng, 6.0..18.0),
            maybe(&mut rng, 97.0..103.0),
            maybe(&mut rng, 55.0..100.0),
        ];
        rows.push(FeatureVector::from_slots(&slots)?);
    }
    Ok(rows)
}

fn maybe(rng: &mut rand::rngs::ThreadRng, range: std::ops::Range<f64>) -> Option<f64> {
    if rng.gen_bool(0.05) {
        None
    } else {
        Some(rng.gen_range(range))
    }
}

/// Forest leaning on blood pressure: above-average BP pushes toward high
/// risk. Class order: [high risk, low risk, mid risk].
fn forest_on_bp(extra_trees: bool) -> CalibratedModel {
    let trees = vec![
        split(
            SYSTOLIC_BP,
            0.8,
            leaf(&[0.15, 0.55, 0.30]),
            leaf(&[0.70, 0.10, 0.20]),
        ),
        split(
            SYSTOLIC_BP,
            0.2,
            split(BODY_TEMP, 1.0, leaf(&[0.10, 0.60, 0.30]), leaf(&[0.45, 0.20, 0.35])),
            leaf(&[0.55, 0.15, 0.30]),
        ),
    ];
    let forest = ForestModel { trees };
    CalibratedModel {
        n_features: FEATURE_COUNT,
        n_classes: 3,
        base: if extra_trees {
            BaseModel::ExtraTrees(forest)
        } else {
            BaseModel::RandomForest(forest)
        },
        calibration: Calibration::Sigmoid {
            a: vec![-4.0, -4.0, -4.0],
            b: vec![2.0, 2.0, 2.0],
        },
    }
}

/// Boosted model leaning on blood sugar.
fn boosted_on_bs() -> CalibratedModel {
    CalibratedModel {
        n_features: FEATURE_COUNT,
        n_classes: 3,
        base: BaseModel::GradientBoosting(BoostedModel {
            init_scores: vec![0.0, 0.3, 0.0],
            learning_rate: 0.5,
            trees: vec![
                split(BS, 0.6, leaf(&[-0.5, 1.0, 0.2]), leaf(&[1.5, -1.0, 0.3])),
                split(BS, 1.4, leaf(&[0.0, 0.2, 0.4]), leaf(&[1.0, -0.5, 0.0])),
            ],
        }),
        calibration: Calibration::Identity,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("demo_bundle=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let bundle_dir = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("artifacts/bundle");

    info!(bundle_dir = %bundle_dir, "Building demo artifact bundle");

    let mut preprocessor = Preprocessor::new();
    preprocessor.fit(&synthetic_cohort(500)?)?;

    let codec = LabelCodec::fit(&[
        "low risk".to_string(),
        "mid risk".to_string(),
        "high risk".to_string(),
    ])?;

    // Reference ensemble weights from the original training run.
    let mut weights = HashMap::new();
    weights.insert("rf".to_string(), 0.3344914083333779);
    weights.insert("et".to_string(), 0.33623049029173746);
    weights.insert("gb".to_string(), 0.3292781013748845);

    let bundle = ArtifactBundle {
        manifest: BundleManifest {
            run_id: format!("demo-{}", Utc::now().format("%Y%m%d%H%M%S")),
            created_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            model_names: vec!["rf".to_string(), "et".to_string(), "gb".to_string()],
            weights,
        },
        preprocessor,
        codec,
        models: vec![
            ("rf".to_string(), forest_on_bp(false)),
            ("et".to_string(), forest_on_bp(true)),
            ("gb".to_string(), boosted_on_bs()),
        ],
    };

    let store = ArtifactStore::new(bundle_dir);
    store.save(&bundle)?;

    // Prove the bundle loads back cleanly the way the service will.
    let loaded = store.load()?;
    info!(
        run_id = %loaded.manifest.run_id,
        models = loaded.models.len(),
        classes = ?loaded.codec.classes(),
        "Demo bundle written and verified"
    );

    Ok(())
}
