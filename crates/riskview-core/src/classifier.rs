//! The risk classifier: the only place risk thresholds are defined.
//!
//! Dashboard badges, the history table, trend reference lines and the
//! prediction-result panel all call `classify`; none of them compare scores
//! against numbers of their own.

use riskview_contracts::risk::RiskLevel;

/// Lowest score classified `MODERATE`.
pub const MODERATE_THRESHOLD: f64 = 0.4;
/// Lowest score classified `HIGH`.
pub const HIGH_THRESHOLD: f64 = 0.6;
/// Lowest score classified `CRITICAL`.
pub const CRITICAL_THRESHOLD: f64 = 0.8;

/// Map a score to its severity level.
///
/// Total over `f64`: scores below 0 are `LOW`, scores above 1 are
/// `CRITICAL`, and NaN (which fails every comparison) is `LOW`. Lower bounds
/// are inclusive, so the result is monotone non-decreasing in `score`.
pub fn classify(score: f64) -> RiskLevel {
    if score >= CRITICAL_THRESHOLD {
        RiskLevel::Critical
    } else if score >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if score >= MODERATE_THRESHOLD {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Inclusive lower score bound of `level`.
pub fn lower_bound(level: RiskLevel) -> f64 {
    match level {
        RiskLevel::Low => 0.0,
        RiskLevel::Moderate => MODERATE_THRESHOLD,
        RiskLevel::High => HIGH_THRESHOLD,
        RiskLevel::Critical => CRITICAL_THRESHOLD,
    }
}

/// Horizontal reference lines for trend charts, one per non-`LOW` level.
pub fn reference_lines() -> [(RiskLevel, f64); 3] {
    [
        (RiskLevel::Moderate, MODERATE_THRESHOLD),
        (RiskLevel::High, HIGH_THRESHOLD),
        (RiskLevel::Critical, CRITICAL_THRESHOLD),
    ]
}

/// Score as a percentage with one decimal, e.g. `"85.0%"`.
pub fn format_percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

/// Badge text with the percentage, e.g. `"CRITICAL (85.0%)"`.
pub fn headline(score: f64) -> String {
    format!("{} ({})", classify(score), format_percent(score))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
