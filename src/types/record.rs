//! Risk record data structures for maternal health prediction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single patient measurement record submitted for risk prediction.
///
/// Every clinical field is optional: an absent field is treated as a missing
/// measurement to be imputed, not as an error. Field names accept the
/// training dataset's column names as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRecord {
    /// Unique record identifier
    #[serde(default = "default_record_id", alias = "id")]
    pub record_id: String,

    /// Patient age in years
    #[serde(default, alias = "Age")]
    pub age: Option<f64>,

    /// Systolic blood pressure (mmHg)
    #[serde(default, alias = "SystolicBP")]
    pub systolic_bp: Option<f64>,

    /// Diastolic blood pressure (mmHg)
    #[serde(default, alias = "DiastolicBP")]
    pub diastolic_bp: Option<f64>,

    /// Blood sugar (mmol/L)
    #[serde(default, alias = "BS")]
    pub bs: Option<f64>,

    /// Body temperature (Fahrenheit)
    #[serde(default, alias = "BodyTemp")]
    pub body_temp: Option<f64>,

    /// Heart rate (bpm)
    #[serde(default, alias = "HeartRate")]
    pub heart_rate: Option<f64>,

    /// Submission timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl RiskRecord {
    /// Create an empty record with the given id (all measurements missing).
    pub fn new(record_id: String) -> Self {
        Self {
            record_id,
            age: None,
            systolic_bp: None,
            diastolic_bp: None,
            bs: None,
            body_temp: None,
            heart_rate: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_age(mut self, age: f64) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_systolic_bp(mut self, v: f64) -> Self {
        self.systolic_bp = Some(v);
        self
    }

    pub fn with_diastolic_bp(mut self, v: f64) -> Self {
        self.diastolic_bp = Some(v);
        self
    }

    pub fn with_bs(mut self, v: f64) -> Self {
        self.bs = Some(v);
        self
    }

    pub fn with_body_temp(mut self, v: f64) -> Self {
        self.body_temp = Some(v);
        self
    }

    pub fn with_heart_rate(mut self, v: f64) -> Self {
        self.heart_rate = Some(v);
        self
    }
}
