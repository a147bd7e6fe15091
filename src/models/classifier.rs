//! Calibrated probabilistic classifiers.
//!
//! The only contract the pipeline needs from a model is: accept a dense
//! feature vector of the trained width, return a normalized probability
//! vector of width K aligned to the shared label codec. The concrete
//! algorithms here are tree ensembles, the shape the persisted artifacts
//! (random forest, extra trees, gradient boosting) take at inference time.
//! Training the ensembles and fitting the calibration maps happens offline;
//! these types only evaluate persisted parameters.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// A node in a decision tree.
///
/// Leaves carry a K-wide value vector: a class distribution for forest
/// trees, per-class raw score increments for boosted trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal split: left if `feature <= threshold`, else right.
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    /// Terminal node with per-class values.
    Leaf { values: Vec<f64> },
}

impl TreeNode {
    /// Walk the tree for one input row and return the leaf values.
    pub fn evaluate<'a>(&'a self, x: &[f64]) -> &'a [f64] {
        match self {
            TreeNode::Leaf { values } => values,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[*feature] <= *threshold {
                    left.evaluate(x)
                } else {
                    right.evaluate(x)
                }
            }
        }
    }

    /// Largest feature index referenced anywhere in the tree.
    pub fn max_feature_index(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split {
                feature,
                left,
                right,
                ..
            } => (*feature)
                .max(left.max_feature_index())
                .max(right.max_feature_index()),
        }
    }

    /// True when every leaf in the tree carries exactly `width` values.
    pub fn leaves_have_width(&self, width: usize) -> bool {
        match self {
            TreeNode::Leaf { values } => values.len() == width,
            TreeNode::Split { left, right, .. } => {
                left.leaves_have_width(width) && right.leaves_have_width(width)
            }
        }
    }
}

/// Averaging ensemble of probability trees (random forest / extra trees).
///
/// Each leaf holds a class distribution; prediction is the mean over trees.
/// The split-selection difference between random forest and extra trees is
/// a training-time detail invisible here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<TreeNode>,
}

impl ForestModel {
    fn predict_raw(&self, x: &[f64], n_classes: usize) -> Vec<f64> {
        let mut acc = vec![0.0; n_classes];
        for tree in &self.trees {
            for (a, &v) in acc.iter_mut().zip(tree.evaluate(x)) {
                *a += v;
            }
        }
        let n = self.trees.len() as f64;
        for a in &mut acc {
            *a /= n;
        }
        acc
    }
}

/// Additive boosted ensemble with per-class score trees and softmax output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedModel {
    /// Per-class scores before any tree contribution.
    pub init_scores: Vec<f64>,
    /// Shrinkage applied to every tree's contribution.
    pub learning_rate: f64,
    pub trees: Vec<TreeNode>,
}

impl BoostedModel {
    // init_scores width is enforced by `CalibratedModel::validate` before
    // any prediction runs.
    fn predict_raw(&self, x: &[f64]) -> Vec<f64> {
        let mut scores = self.init_scores.clone();
        for tree in &self.trees {
            for (s, &v) in scores.iter_mut().zip(tree.evaluate(x)) {
                *s += self.learning_rate * v;
            }
        }
        softmax(&scores)
    }
}

/// The tagged set of supported base classifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseModel {
    RandomForest(ForestModel),
    ExtraTrees(ForestModel),
    GradientBoosting(BoostedModel),
}

impl BaseModel {
    fn predict_raw(&self, x: &[f64], n_classes: usize) -> Vec<f64> {
        match self {
            BaseModel::RandomForest(m) | BaseModel::ExtraTrees(m) => {
                m.predict_raw(x, n_classes)
            }
            BaseModel::GradientBoosting(m) => m.predict_raw(x),
        }
    }

    fn trees(&self) -> &[TreeNode] {
        match self {
            BaseModel::RandomForest(m) | BaseModel::ExtraTrees(m) => &m.trees,
            BaseModel::GradientBoosting(m) => &m.trees,
        }
    }
}

/// Post-hoc map from raw per-class scores to calibrated probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Calibration {
    /// Pass raw scores through unchanged (already probabilities).
    Identity,
    /// Per-class Platt scaling: `1 / (1 + exp(a*s + b))`, renormalized.
    Sigmoid { a: Vec<f64>, b: Vec<f64> },
}

impl Calibration {
    fn apply(&self, raw: &[f64]) -> Vec<f64> {
        match self {
            Calibration::Identity => raw.to_vec(),
            // Per-class parameter widths are enforced by
            // `CalibratedModel::validate` before any prediction runs.
            Calibration::Sigmoid { a, b } => raw
                .iter()
                .zip(a)
                .zip(b)
                .map(|((&s, &a_c), &b_c)| 1.0 / (1.0 + (a_c * s + b_c).exp()))
                .collect(),
        }
    }
}

/// A named base classifier plus its fitted calibration map.
///
/// Immutable after loading; `predict_proba` takes `&self`, so a set of
/// these is freely shared across concurrent request tasks without locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratedModel {
    /// Input width the model was trained on.
    pub n_features: usize,
    /// Output width, aligned to the label codec index space.
    pub n_classes: usize,
    pub base: BaseModel,
    pub calibration: Calibration,
}

impl CalibratedModel {
    /// Probability distribution over the K classes for one input row.
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.n_features {
            return Err(PipelineError::Schema {
                expected: self.n_features,
                actual: x.len(),
            });
        }

        let raw = self.base.predict_raw(x, self.n_classes);
        let calibrated = self.calibration.apply(&raw);
        Ok(normalize(&calibrated))
    }

    /// Structural self-check, run at artifact load.
    pub fn validate(&self) -> Result<()> {
        if self.n_classes == 0 {
            return Err(PipelineError::artifact("model declares zero classes"));
        }
        if self.base.trees().is_empty() {
            return Err(PipelineError::artifact("model has no trees"));
        }
        for tree in self.base.trees() {
            if tree.max_feature_index() >= self.n_features {
                return Err(PipelineError::artifact(format!(
                    "tree references feature {} but model width is {}",
                    tree.max_feature_index(),
                    self.n_features
                )));
            }
            if !tree.leaves_have_width(self.n_classes) {
                return Err(PipelineError::artifact(format!(
                    "tree carries a leaf whose width does not match {} classes",
                    self.n_classes
                )));
            }
        }
        if let BaseModel::GradientBoosting(m) = &self.base {
            if m.init_scores.len() != self.n_classes {
                return Err(PipelineError::artifact(format!(
                    "initial scores width {} does not match {} classes",
                    m.init_scores.len(),
                    self.n_classes
                )));
            }
        }
        if let Calibration::Sigmoid { a, b } = &self.calibration {
            if a.len() != self.n_classes || b.len() != self.n_classes {
                return Err(PipelineError::artifact(format!(
                    "calibration width {}/{} does not match {} classes",
                    a.len(),
                    b.len(),
                    self.n_classes
                )));
            }
        }
        Ok(())
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.iter().map(|&e| e / sum).collect()
}

fn normalize(probs: &[f64]) -> Vec<f64> {
    let sum: f64 = probs.iter().sum();
    if sum > 0.0 {
        probs.iter().map(|&p| p / sum).collect()
    } else {
        vec![1.0 / probs.len() as f64; probs.len()]
    }
}
