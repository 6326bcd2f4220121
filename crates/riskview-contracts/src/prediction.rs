//! Prediction request and response payloads.

use serde::{Deserialize, Serialize};

/// Vital signs submitted for one prediction.
///
/// Serialized flat, exactly as the prediction endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub patient_id: String,
    /// Beats per minute.
    pub heart_rate: f64,
    /// Percent.
    pub oxygen_sat: f64,
    /// mmHg.
    pub blood_pressure: f64,
    /// Breaths per minute.
    pub respiration_rate: f64,
}

/// What the prediction endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Model output in `[0, 1]`.
    pub risk_score: f64,
    #[serde(default)]
    pub alert_triggered: bool,
    #[serde(default)]
    pub explanation: Option<String>,
}
