//! Simulated ward data.
//!
//! Everything here is hardcoded and fictional. It stands in for the
//! prediction service's database so the views can be exercised offline.

use chrono::{DateTime, Duration, Utc};

use riskview_contracts::{
    prediction::VitalSigns,
    record::{PatientRecord, TimeFilter},
};
use riskview_core::{classifier::HIGH_THRESHOLD, prediction::Vital};

/// A monitored patient: id, typical score, number of stored predictions.
pub struct PatientProfile {
    pub id: &'static str,
    pub baseline: f64,
    pub history_len: usize,
}

/// The simulated ward.
pub const PATIENTS: [PatientProfile; 5] = [
    PatientProfile { id: "P1001", baseline: 0.85, history_len: 12 },
    PatientProfile { id: "P1002", baseline: 0.45, history_len: 5 },
    PatientProfile { id: "P1003", baseline: 0.72, history_len: 23 },
    PatientProfile { id: "P1004", baseline: 0.35, history_len: 0 },
    PatientProfile { id: "P1005", baseline: 0.91, history_len: 8 },
];

/// Spacing between stored predictions of one patient.
const HISTORY_SPACING_HOURS: i64 = 18;

pub fn find_patient(id: &str) -> Option<&'static PatientProfile> {
    PATIENTS.iter().find(|p| p.id == id)
}

/// The dashboard's seed feed, newest first, relative to `now`.
pub fn recent_feed(now: DateTime<Utc>) -> Vec<PatientRecord> {
    [
        ("P1001", 0.85, Duration::minutes(30), true),
        ("P1002", 0.45, Duration::hours(2), false),
        ("P1003", 0.72, Duration::hours(5), true),
        ("P1004", 0.35, Duration::hours(8), false),
        ("P1005", 0.91, Duration::hours(12), true),
    ]
    .into_iter()
    .map(|(id, risk_score, age, alert_triggered)| PatientRecord {
        id: id.to_string(),
        risk_score,
        timestamp: now - age,
        alert_triggered,
        explanation: None,
    })
    .collect()
}

/// Every stored prediction for `profile`, newest first.
///
/// Scores wobble around the baseline so the trend chart has shape.
pub fn patient_history(profile: &PatientProfile, now: DateTime<Utc>) -> Vec<PatientRecord> {
    (0..profile.history_len)
        .map(|i| {
            let wobble = ((i as f64) * 1.3).sin() * 0.08;
            let risk_score = ((profile.baseline + wobble) * 100.0).round() / 100.0;
            let risk_score = risk_score.clamp(0.0, 1.0);
            PatientRecord {
                id: profile.id.to_string(),
                risk_score,
                timestamp: now - Duration::hours(HISTORY_SPACING_HOURS * i as i64),
                alert_triggered: risk_score >= HIGH_THRESHOLD,
                explanation: None,
            }
        })
        .collect()
}

/// Records inside the window of `filter`.
pub fn within(records: Vec<PatientRecord>, filter: TimeFilter, now: DateTime<Utc>) -> Vec<PatientRecord> {
    let window = match filter {
        TimeFilter::All => return records,
        TimeFilter::Week => Duration::days(7),
        TimeFilter::Month => Duration::days(30),
    };
    records
        .into_iter()
        .filter(|record| now - record.timestamp <= window)
        .collect()
}

/// Heuristic stand-in for the model.
///
/// Each vital contributes its distance outside the normal range, measured in
/// range widths. A neonate with every vital in range scores 0.1.
pub fn heuristic_score(vitals: &VitalSigns) -> (f64, Vec<String>) {
    let mut score = 0.1;
    let mut findings = Vec::new();

    for vital in Vital::ALL {
        let value = match vital {
            Vital::HeartRate => vitals.heart_rate,
            Vital::OxygenSat => vitals.oxygen_sat,
            Vital::BloodPressure => vitals.blood_pressure,
            Vital::RespirationRate => vitals.respiration_rate,
        };
        let (min, max) = vital.normal_range();
        let outside = if value < min {
            min - value
        } else if value > max {
            value - max
        } else {
            0.0
        };
        if outside > 0.0 {
            score += 0.3 * outside / (max - min);
            findings.push(format!("{} {value} {} outside {min}-{max}", vital.label(), vital.unit()));
        }
    }

    (score.min(1.0), findings)
}
