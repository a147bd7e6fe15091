//! Preprocessing pipeline: mean imputation followed by standardization.
//!
//! The two transforms are order-sensitive. Imputation statistics are fitted
//! on raw training data (ignoring missing entries), the matrix is filled,
//! and only then are the scaling statistics fitted on the imputed matrix.
//! Swapping the order would fit the scaler against a different numeric
//! domain than the one seen at inference time. The same impute-then-scale
//! order is applied to every inference request.

use crate::error::{PipelineError, Result};
use crate::schema::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use serde::{Deserialize, Serialize};

const STD_EPSILON: f64 = 1e-10;

/// Per-slot mean imputation, fitted once at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanImputer {
    /// Mean of observed values per feature slot (None before fit).
    means: Option<Vec<f64>>,
}

impl MeanImputer {
    pub fn new() -> Self {
        Self { means: None }
    }

    /// Reconstruct a fitted imputer from persisted statistics.
    pub fn from_means(means: Vec<f64>) -> Self {
        Self { means: Some(means) }
    }

    /// Compute the per-slot mean over observed (non-missing) entries.
    ///
    /// A slot with no observed value in the whole training set cannot be
    /// imputed and is a fit error.
    pub fn fit(&mut self, rows: &[FeatureVector]) -> Result<()> {
        if rows.is_empty() {
            return Err(PipelineError::artifact("cannot fit imputer on zero rows"));
        }

        let mut sums = vec![0.0; FEATURE_COUNT];
        let mut counts = vec![0u64; FEATURE_COUNT];

        for row in rows {
            for (j, slot) in row.slots().iter().enumerate() {
                if let Some(v) = slot {
                    sums[j] += v;
                    counts[j] += 1;
                }
            }
        }

        let mut means = vec![0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            if counts[j] == 0 {
                return Err(PipelineError::artifact(format!(
                    "feature {} has no observed values to impute from",
                    FEATURE_NAMES[j]
                )));
            }
            means[j] = sums[j] / counts[j] as f64;
        }

        self.means = Some(means);
        Ok(())
    }

    /// Fill missing slots with the stored mean; present values pass through.
    pub fn transform(&self, row: &FeatureVector) -> Result<Vec<f64>> {
        let means = self.means.as_ref().ok_or(PipelineError::NotFitted {
            component: "MeanImputer",
        })?;

        Ok(row
            .slots()
            .iter()
            .zip(means.iter())
            .map(|(slot, &mean)| slot.unwrap_or(mean))
            .collect())
    }

    /// Fitted per-slot means.
    pub fn means(&self) -> Result<&[f64]> {
        self.means
            .as_deref()
            .ok_or(PipelineError::NotFitted {
                component: "MeanImputer",
            })
    }

    pub fn is_fitted(&self) -> bool {
        self.means.is_some()
    }

    /// Fitted width, zero before fit.
    pub fn width(&self) -> usize {
        self.means.as_ref().map_or(0, Vec::len)
    }
}

impl Default for MeanImputer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-slot standardization with fitted (mean, std), population std.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Center of each feature (computed during fit).
    mean: Option<Vec<f64>>,
    /// Standard deviation of each feature (computed during fit).
    std: Option<Vec<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: None,
            std: None,
        }
    }

    /// Reconstruct a fitted scaler from persisted statistics.
    pub fn from_stats(mean: Vec<f64>, std: Vec<f64>) -> Self {
        Self {
            mean: Some(mean),
            std: Some(std),
        }
    }

    /// Compute per-slot mean and population standard deviation over a dense
    /// (already imputed) matrix.
    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        if rows.is_empty() {
            return Err(PipelineError::artifact("cannot fit scaler on zero rows"));
        }
        let n_features = rows[0].len();
        let n_samples = rows.len() as f64;

        let mut mean = vec![0.0; n_features];
        for row in rows {
            if row.len() != n_features {
                return Err(PipelineError::Schema {
                    expected: n_features,
                    actual: row.len(),
                });
            }
            for (j, &v) in row.iter().enumerate() {
                mean[j] += v;
            }
        }
        for m in &mut mean {
            *m /= n_samples;
        }

        let mut std = vec![0.0; n_features];
        for row in rows {
            for (j, &v) in row.iter().enumerate() {
                let diff = v - mean[j];
                std[j] += diff * diff;
            }
        }
        for s in &mut std {
            // Population std (divide by n, not n-1), matching the fit the
            // models were trained against.
            *s = (*s / n_samples).sqrt();
        }

        self.mean = Some(mean);
        self.std = Some(std);
        Ok(())
    }

    /// Standardize a dense row using the fitted statistics.
    ///
    /// A near-zero std (constant training column) leaves the centered value
    /// undivided rather than dividing by ~0.
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        let mean = self.mean.as_ref().ok_or(PipelineError::NotFitted {
            component: "StandardScaler",
        })?;
        let std = self.std.as_ref().ok_or(PipelineError::NotFitted {
            component: "StandardScaler",
        })?;

        if row.len() != mean.len() {
            return Err(PipelineError::Schema {
                expected: mean.len(),
                actual: row.len(),
            });
        }

        Ok(row
            .iter()
            .zip(mean.iter().zip(std.iter()))
            .map(|(&v, (&m, &s))| {
                let centered = v - m;
                if s > STD_EPSILON {
                    centered / s
                } else {
                    centered
                }
            })
            .collect())
    }

    pub fn mean(&self) -> Result<&[f64]> {
        self.mean.as_deref().ok_or(PipelineError::NotFitted {
            component: "StandardScaler",
        })
    }

    pub fn std(&self) -> Result<&[f64]> {
        self.std.as_deref().ok_or(PipelineError::NotFitted {
            component: "StandardScaler",
        })
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    pub fn width(&self) -> usize {
        self.mean.as_ref().map_or(0, Vec::len)
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

/// The fixed impute-then-scale pipeline applied to every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    imputer: MeanImputer,
    scaler: StandardScaler,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            imputer: MeanImputer::new(),
            scaler: StandardScaler::new(),
        }
    }

    /// Assemble from independently loaded fitted transforms.
    pub fn from_parts(imputer: MeanImputer, scaler: StandardScaler) -> Self {
        Self { imputer, scaler }
    }

    /// Fit both transforms in pipeline order: imputation statistics from the
    /// raw rows, then scaling statistics from the imputed matrix.
    pub fn fit(&mut self, rows: &[FeatureVector]) -> Result<()> {
        self.imputer.fit(rows)?;

        let imputed: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| self.imputer.transform(row))
            .collect::<Result<_>>()?;

        self.scaler.fit(&imputed)
    }

    /// Fit and return the transformed training matrix, as used to fit the
    /// downstream classifiers.
    pub fn fit_transform(&mut self, rows: &[FeatureVector]) -> Result<Vec<Vec<f64>>> {
        self.fit(rows)?;
        rows.iter().map(|row| self.transform(row)).collect()
    }

    /// Impute then scale one row into a dense model input.
    pub fn transform(&self, row: &FeatureVector) -> Result<Vec<f64>> {
        let imputed = self.imputer.transform(row)?;
        self.scaler.transform(&imputed)
    }

    pub fn imputer(&self) -> &MeanImputer {
        &self.imputer
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn is_fitted(&self) -> bool {
        self.imputer.is_fitted() && self.scaler.is_fitted()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: [Option<f64>; FEATURE_COUNT]) -> FeatureVector {
        FeatureVector::from_slots(&values).unwrap()
    }

    fn dense(values: [f64; FEATURE_COUNT]) -> FeatureVector {
        FeatureVector::from_slots(&values.map(Some)).unwrap()
    }

    #[test]
    fn test_imputer_ignores_missing_in_fit() {
        let rows = vec![
            row([Some(20.0), Some(100.0), None, None, None, None]),
            row([Some(40.0), None, None, None, None, None]),
            row([None, Some(120.0), None, None, None, None]),
        ];
        // Slots 2..6 have no data at all
        let mut imputer = MeanImputer::new();
        assert!(imputer.fit(&rows).is_err());

        let rows = vec![
            row([Some(20.0), Some(100.0), Some(60.0), Some(6.0), Some(98.0), Some(70.0)]),
            row([Some(40.0), None, Some(80.0), Some(8.0), Some(98.0), Some(80.0)]),
        ];
        imputer.fit(&rows).unwrap();
        let means = imputer.means().unwrap();
        assert!((means[0] - 30.0).abs() < 1e-12);
        assert!((means[1] - 100.0).abs() < 1e-12); // only one observation
    }

    #[test]
    fn test_imputer_passthrough_and_fill() {
        let imputer = MeanImputer::from_means(vec![30.0, 110.0, 70.0, 7.0, 98.0, 75.0]);
        let filled = imputer
            .transform(&row([None, Some(120.0), None, None, None, None]))
            .unwrap();
        assert_eq!(filled[0], 30.0);
        assert_eq!(filled[1], 120.0);
        assert_eq!(filled[2], 70.0);
    }

    #[test]
    fn test_scaler_standardizes() {
        let mut scaler = StandardScaler::new();
        scaler
            .fit(&[
                vec![0.0, 10.0],
                vec![2.0, 10.0], // second column constant
            ])
            .unwrap();

        let out = scaler.transform(&[2.0, 10.0]).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-12); // (2-1)/1
        assert!((out[1] - 0.0).abs() < 1e-12); // constant column: centered only
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let pre = Preprocessor::new();
        let err = pre.transform(&dense([1.0, 1.0, 1.0, 1.0, 1.0, 1.0])).unwrap_err();
        assert!(matches!(err, PipelineError::NotFitted { .. }));
    }

    #[test]
    fn test_missing_slot_scales_to_zero_at_center() {
        // ImputationState mean=30 for slot 0, ScalingState (center=30, scale=5):
        // missing slot 0 -> impute 30 -> scale (30-30)/5 = 0.0
        let imputer = MeanImputer::from_means(vec![30.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let scaler = StandardScaler::from_stats(
            vec![30.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vec![5.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        );
        let pre = Preprocessor::from_parts(imputer, scaler);

        let out = pre
            .transform(&row([None, Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]))
            .unwrap();
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn test_missing_equals_explicit_imputed_value() {
        // A row with a missing slot must preprocess identically to the same
        // row with the imputed value written in explicitly.
        let mut pre = Preprocessor::new();
        let train = vec![
            dense([20.0, 100.0, 60.0, 6.0, 98.0, 70.0]),
            dense([40.0, 120.0, 80.0, 8.0, 99.0, 80.0]),
            dense([30.0, 110.0, 70.0, 7.0, 98.5, 75.0]),
        ];
        pre.fit(&train).unwrap();

        let mean_bs = pre.imputer().means().unwrap()[3];
        let with_missing = pre
            .transform(&row([Some(25.0), Some(105.0), Some(65.0), None, Some(98.0), Some(72.0)]))
            .unwrap();
        let with_explicit = pre
            .transform(&dense([25.0, 105.0, 65.0, mean_bs, 98.0, 72.0]))
            .unwrap();
        assert_eq!(with_missing, with_explicit);
    }

    #[test]
    fn test_impute_scale_order_sensitivity() {
        // Fitting impute-then-scale must differ from applying the scaler's
        // statistics to a raw mean when scaling parameters are non-trivial.
        let mut pre = Preprocessor::new();
        let train = vec![
            row([Some(10.0), Some(1.0), Some(1.0), Some(1.0), Some(1.0), Some(1.0)]),
            row([None, Some(2.0), Some(2.0), Some(2.0), Some(2.0), Some(2.0)]),
            row([Some(50.0), Some(3.0), Some(3.0), Some(3.0), Some(3.0), Some(3.0)]),
        ];
        pre.fit(&train).unwrap();

        // Scaler center for slot 0 must be computed over the *imputed*
        // column [10, 30, 50], whose mean is 30.
        assert!((pre.scaler().mean().unwrap()[0] - 30.0).abs() < 1e-12);

        // The missing entry lands exactly at the center after the pipeline.
        let out = pre.transform(&train[1]).unwrap();
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut pre = Preprocessor::new();
        pre.fit(&[
            dense([20.0, 100.0, 60.0, 6.0, 98.0, 70.0]),
            dense([40.0, 120.0, 80.0, 8.0, 99.0, 80.0]),
        ])
        .unwrap();

        let json = serde_json::to_string(&pre).unwrap();
        let restored: Preprocessor = serde_json::from_str(&json).unwrap();

        let input = row([Some(25.0), None, Some(65.0), None, Some(98.0), Some(75.0)]);
        assert_eq!(pre.transform(&input).unwrap(), restored.transform(&input).unwrap());
    }
}
