//! Dashboard snapshot types produced by the view aggregator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    query::QueryStatus,
    record::PatientRecord,
    risk::RiskLevel,
};

/// Health of the prediction backend as reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// e.g. "Online".
    pub model_status: String,
    /// e.g. "Active".
    pub alert_system: String,
}

impl SystemStatus {
    /// Placeholder shown when the status endpoint cannot be reached.
    pub fn unknown() -> Self {
        Self {
            model_status: "Unknown".to_string(),
            alert_system: "Unknown".to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.model_status.eq_ignore_ascii_case("online")
            && self.alert_system.eq_ignore_ascii_case("active")
    }
}

/// Headline numbers derived from the recent-predictions feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Total predictions the collaborator reports, not just this page.
    pub total_predictions: u64,
    pub distinct_patients: usize,
    /// Records classified HIGH or CRITICAL.
    pub high_risk: usize,
    pub alerts_triggered: usize,
    /// Mean score of the shown records; absent when there are none.
    pub average_risk: Option<f64>,
    /// Record count per level. Every level is present, possibly with zero.
    pub distribution: BTreeMap<RiskLevel, usize>,
}

/// A recent prediction with its derived badge level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentPrediction {
    pub record: PatientRecord,
    pub level: RiskLevel,
}

/// One refreshable dashboard snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub stats: DashboardStats,
    /// Newest first.
    pub recent_predictions: Vec<RecentPrediction>,
    pub system_status: SystemStatus,
    /// Status of the feed query this snapshot was built from.
    pub status: QueryStatus,
    /// Inline error shown alongside (not instead of) the retained data.
    pub error: Option<String>,
    pub refreshed_at: DateTime<Utc>,
}
