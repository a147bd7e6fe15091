//! Feature contract for risk prediction.
//!
//! Defines the fixed, ordered schema of clinical measurements the models
//! were trained on. The slot order here is the training-time order; every
//! fitted artifact (imputer, scaler, models) is only valid against this
//! exact ordering, so it is a compiled-in constant and never derived from
//! input key order.

use crate::error::{PipelineError, Result};
use crate::types::record::RiskRecord;

/// Feature names in training order.
pub const FEATURE_NAMES: [&str; 6] = [
    "Age",
    "SystolicBP",
    "DiastolicBP",
    "BS",
    "BodyTemp",
    "HeartRate",
];

/// Number of feature slots.
pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// A fixed-width feature vector with an explicit per-slot presence flag.
///
/// `None` means the measurement is missing and will be imputed; it is never
/// silently treated as zero. Values are validated to be finite at
/// construction, so downstream preprocessing never sees NaN or infinity.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    slots: [Option<f64>; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build a feature vector from a boundary record, validating values.
    ///
    /// Absent fields become missing slots; present non-finite values are
    /// rejected as a client error.
    pub fn from_record(record: &RiskRecord) -> Result<Self> {
        let raw = [
            record.age,
            record.systolic_bp,
            record.diastolic_bp,
            record.bs,
            record.body_temp,
            record.heart_rate,
        ];

        let mut slots = [None; FEATURE_COUNT];
        for (i, value) in raw.into_iter().enumerate() {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(PipelineError::Numeric {
                        feature: FEATURE_NAMES[i],
                        value: v,
                    });
                }
                slots[i] = Some(v);
            }
        }

        Ok(Self { slots })
    }

    /// Build from an ordered slice of optional values (training-side rows).
    pub fn from_slots(values: &[Option<f64>]) -> Result<Self> {
        if values.len() != FEATURE_COUNT {
            return Err(PipelineError::Schema {
                expected: FEATURE_COUNT,
                actual: values.len(),
            });
        }

        for (i, value) in values.iter().enumerate() {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(PipelineError::Numeric {
                        feature: FEATURE_NAMES[i],
                        value: *v,
                    });
                }
            }
        }

        let mut slots = [None; FEATURE_COUNT];
        slots.copy_from_slice(values);
        Ok(Self { slots })
    }

    /// Ordered slots, one per declared feature.
    pub fn slots(&self) -> &[Option<f64>; FEATURE_COUNT] {
        &self.slots
    }

    /// True if no slot carries a value.
    pub fn is_all_missing(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
