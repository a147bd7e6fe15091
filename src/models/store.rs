//! Artifact bundle persistence.
//!
//! A bundle is a directory produced by one training run:
//!
//! ```text
//! <bundle>/
//!   manifest.json      run id, feature order, model names, ensemble weights
//!   imputer.json       fitted imputation statistics
//!   scaler.json        fitted scaling statistics
//!   labels.json        persisted label codec
//!   models/<name>.json one calibrated model per configured name
//! ```
//!
//! Index alignment and feature order are only valid within one run, so the
//! five artifact kinds are loaded and validated together: any missing,
//! corrupt, or mutually inconsistent artifact fails the whole load and the
//! service refuses to start. On save the manifest is written last, so a
//! bundle without a readable manifest is never considered loadable.

use crate::error::{PipelineError, Result};
use crate::labels::LabelCodec;
use crate::models::classifier::CalibratedModel;
use crate::preprocess::{MeanImputer, Preprocessor, StandardScaler};
use crate::schema::{FEATURE_COUNT, FEATURE_NAMES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const MANIFEST_FILE: &str = "manifest.json";
const IMPUTER_FILE: &str = "imputer.json";
const SCALER_FILE: &str = "scaler.json";
const LABELS_FILE: &str = "labels.json";
const MODELS_DIR: &str = "models";

/// Bundle-level metadata tying the artifacts to one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Training run identifier.
    pub run_id: String,
    /// When the bundle was written.
    pub created_at: DateTime<Utc>,
    /// Feature names in training order.
    pub feature_names: Vec<String>,
    /// Model names, in ensemble evaluation order.
    pub model_names: Vec<String>,
    /// Ensemble weight per model name.
    pub weights: HashMap<String, f64>,
}

/// The full set of fitted artifacts from one training run.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub manifest: BundleManifest,
    pub preprocessor: Preprocessor,
    pub codec: LabelCodec,
    /// Named calibrated models, ordered per the manifest.
    pub models: Vec<(String, CalibratedModel)>,
}

/// Loads and saves artifact bundles under a root directory.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write every artifact, manifest last.
    pub fn save(&self, bundle: &ArtifactBundle) -> Result<()> {
        fs::create_dir_all(self.root.join(MODELS_DIR))?;

        write_json(&self.root.join(IMPUTER_FILE), bundle.preprocessor.imputer())?;
        write_json(&self.root.join(SCALER_FILE), bundle.preprocessor.scaler())?;
        write_json(&self.root.join(LABELS_FILE), &bundle.codec)?;

        for (name, model) in &bundle.models {
            let path = self.root.join(MODELS_DIR).join(format!("{name}.json"));
            write_json(&path, model)?;
        }

        write_json(&self.root.join(MANIFEST_FILE), &bundle.manifest)?;

        info!(
            run_id = %bundle.manifest.run_id,
            models = bundle.models.len(),
            path = %self.root.display(),
            "Artifact bundle saved"
        );
        Ok(())
    }

    /// Load and cross-validate the bundle.
    pub fn load(&self) -> Result<ArtifactBundle> {
        let manifest: BundleManifest = read_json(&self.root.join(MANIFEST_FILE))?;
        let imputer: MeanImputer = read_json(&self.root.join(IMPUTER_FILE))?;
        let scaler: StandardScaler = read_json(&self.root.join(SCALER_FILE))?;
        let codec: LabelCodec = read_json::<LabelCodec>(&self.root.join(LABELS_FILE))?.rehydrate();

        let mut models = Vec::with_capacity(manifest.model_names.len());
        for name in &manifest.model_names {
            let path = self.root.join(MODELS_DIR).join(format!("{name}.json"));
            let model: CalibratedModel = read_json(&path)?;
            models.push((name.clone(), model));
        }

        let bundle = ArtifactBundle {
            manifest,
            preprocessor: Preprocessor::from_parts(imputer, scaler),
            codec,
            models,
        };
        bundle.validate()?;

        info!(
            run_id = %bundle.manifest.run_id,
            models = bundle.models.len(),
            classes = bundle.codec.len(),
            path = %self.root.display(),
            "Artifact bundle loaded"
        );
        Ok(bundle)
    }
}

impl ArtifactBundle {
    /// Cross-artifact consistency checks; every failure is an
    /// [`PipelineError::ArtifactLoad`].
    pub fn validate(&self) -> Result<()> {
        if self.manifest.feature_names != FEATURE_NAMES {
            return Err(PipelineError::artifact(format!(
                "bundle feature order {:?} does not match the compiled schema {:?}",
                self.manifest.feature_names, FEATURE_NAMES
            )));
        }

        let imputer_width = self.preprocessor.imputer().width();
        let scaler_width = self.preprocessor.scaler().width();
        if imputer_width != FEATURE_COUNT || scaler_width != FEATURE_COUNT {
            return Err(PipelineError::artifact(format!(
                "preprocessing width mismatch: imputer={imputer_width}, scaler={scaler_width}, schema={FEATURE_COUNT}"
            )));
        }

        if self.codec.is_empty() {
            return Err(PipelineError::artifact("label codec has no classes"));
        }

        if self.models.is_empty() {
            return Err(PipelineError::artifact("bundle contains no models"));
        }

        for (name, model) in &self.models {
            model.validate().map_err(|e| {
                PipelineError::artifact(format!("model '{name}' invalid: {e}"))
            })?;
            if model.n_features != FEATURE_COUNT {
                return Err(PipelineError::artifact(format!(
                    "model '{name}' expects {} features, schema has {FEATURE_COUNT}",
                    model.n_features
                )));
            }
            if model.n_classes != self.codec.len() {
                return Err(PipelineError::artifact(format!(
                    "model '{name}' emits {} classes, label codec has {}",
                    model.n_classes,
                    self.codec.len()
                )));
            }
        }

        for name in self.manifest.model_names.iter() {
            if !self.manifest.weights.contains_key(name) {
                return Err(PipelineError::artifact(format!(
                    "no ensemble weight for model '{name}'"
                )));
            }
        }
        for name in self.manifest.weights.keys() {
            if !self.manifest.model_names.contains(name) {
                return Err(PipelineError::artifact(format!(
                    "weight for unknown model '{name}'"
                )));
            }
        }

        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| {
        PipelineError::artifact(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        PipelineError::artifact(format!("cannot parse {}: {e}", path.display()))
    })
}
