//! Prediction form and result panel.

use std::fmt;

use serde::Serialize;
use tracing::info;

use riskview_contracts::{
    error::{RiskViewError, RiskViewResult},
    prediction::{PredictionResult, VitalSigns},
    risk::RiskLevel,
};

use crate::{classifier, traits::RiskApi};

/// A vital sign the form collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Vital {
    HeartRate,
    OxygenSat,
    BloodPressure,
    RespirationRate,
}

impl Vital {
    pub const ALL: [Vital; 4] = [
        Vital::HeartRate,
        Vital::OxygenSat,
        Vital::BloodPressure,
        Vital::RespirationRate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Vital::HeartRate => "Heart Rate",
            Vital::OxygenSat => "Oxygen Saturation",
            Vital::BloodPressure => "Blood Pressure",
            Vital::RespirationRate => "Respiration Rate",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Vital::HeartRate => "bpm",
            Vital::OxygenSat => "%",
            Vital::BloodPressure => "mmHg",
            Vital::RespirationRate => "breaths/min",
        }
    }

    /// Clinically normal range for a neonate.
    pub fn normal_range(self) -> (f64, f64) {
        match self {
            Vital::HeartRate => (100.0, 160.0),
            Vital::OxygenSat => (95.0, 100.0),
            Vital::BloodPressure => (50.0, 70.0),
            Vital::RespirationRate => (30.0, 60.0),
        }
    }

    /// Range the input control allows.
    pub fn slider_bounds(self) -> (f64, f64) {
        match self {
            Vital::OxygenSat => (70.0, 100.0),
            other => {
                let (min, max) = other.normal_range();
                ((min * 0.5).floor(), (max * 1.5).ceil())
            }
        }
    }

    pub fn default_value(self) -> f64 {
        match self {
            Vital::HeartRate => 120.0,
            Vital::OxygenSat => 98.0,
            Vital::BloodPressure => 60.0,
            Vital::RespirationRate => 40.0,
        }
    }

    pub fn is_normal(self, value: f64) -> bool {
        let (min, max) = self.normal_range();
        (min..=max).contains(&value)
    }
}

impl fmt::Display for Vital {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Editable form state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionForm {
    patient_id: String,
    heart_rate: f64,
    oxygen_sat: f64,
    blood_pressure: f64,
    respiration_rate: f64,
}

impl Default for PredictionForm {
    fn default() -> Self {
        Self {
            patient_id: String::new(),
            heart_rate: Vital::HeartRate.default_value(),
            oxygen_sat: Vital::OxygenSat.default_value(),
            blood_pressure: Vital::BloodPressure.default_value(),
            respiration_rate: Vital::RespirationRate.default_value(),
        }
    }
}

impl PredictionForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn set_patient_id(&mut self, patient_id: impl Into<String>) {
        self.patient_id = patient_id.into();
    }

    pub fn value(&self, vital: Vital) -> f64 {
        match vital {
            Vital::HeartRate => self.heart_rate,
            Vital::OxygenSat => self.oxygen_sat,
            Vital::BloodPressure => self.blood_pressure,
            Vital::RespirationRate => self.respiration_rate,
        }
    }

    /// Set `vital`, clamped to its slider bounds. Returns the stored value.
    pub fn set(&mut self, vital: Vital, value: f64) -> f64 {
        let (min, max) = vital.slider_bounds();
        let value = if value.is_nan() { vital.default_value() } else { value.clamp(min, max) };
        let slot = match vital {
            Vital::HeartRate => &mut self.heart_rate,
            Vital::OxygenSat => &mut self.oxygen_sat,
            Vital::BloodPressure => &mut self.blood_pressure,
            Vital::RespirationRate => &mut self.respiration_rate,
        };
        *slot = value;
        value
    }

    /// Shift `vital` by `delta`, clamped.
    pub fn adjust(&mut self, vital: Vital, delta: f64) -> f64 {
        self.set(vital, self.value(vital) + delta)
    }

    pub fn validate(&self) -> RiskViewResult<VitalSigns> {
        let patient_id = self.patient_id.trim();
        if patient_id.is_empty() {
            return Err(RiskViewError::Validation {
                reason: "Patient ID is required".to_string(),
            });
        }
        Ok(VitalSigns {
            patient_id: patient_id.to_string(),
            heart_rate: self.heart_rate,
            oxygen_sat: self.oxygen_sat,
            blood_pressure: self.blood_pressure,
            respiration_rate: self.respiration_rate,
        })
    }
}

/// What the result panel shows after a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionPanel {
    pub result: PredictionResult,
    pub level: RiskLevel,
    /// e.g. `"CRITICAL (85.0%)"`.
    pub headline: String,
    pub alert_status: &'static str,
    pub alert_notice: Option<&'static str>,
}

impl PredictionPanel {
    pub fn from_result(result: PredictionResult) -> Self {
        let (alert_status, alert_notice) = if result.alert_triggered {
            ("Alert Triggered", Some("An alert has been sent to the medical staff."))
        } else {
            ("No Alert Needed", None)
        };
        Self {
            level: classifier::classify(result.risk_score),
            headline: classifier::headline(result.risk_score),
            alert_status,
            alert_notice,
            result,
        }
    }
}

/// Validate the form, submit it and build the result panel.
pub async fn submit<A: RiskApi>(api: &A, form: &PredictionForm) -> RiskViewResult<PredictionPanel> {
    let vitals = form.validate()?;
    let patient_id = vitals.patient_id.clone();
    let result = api.submit_prediction(vitals).await?;
    let panel = PredictionPanel::from_result(result);
    info!(
        patient_id = %patient_id,
        level = %panel.level,
        alert_triggered = panel.result.alert_triggered,
        "prediction received"
    );
    Ok(panel)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
