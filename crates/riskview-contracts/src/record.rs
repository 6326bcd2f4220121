//! Patient records and history pages as delivered by the network collaborator.
//!
//! Records are immutable display data. A `HistoryPage` is what the query
//! controller commits; it pairs the raw records with the pagination context
//! of the request that produced them.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RiskViewError;

/// One risk prediction for one patient at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Identifier of the record (the dashboard feed uses the patient id).
    pub id: String,
    /// Model output in `[0, 1]`.
    pub risk_score: f64,
    /// When the prediction was made.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Whether the prediction raised a staff alert.
    #[serde(default)]
    pub alert_triggered: bool,
    /// Optional model explanation shown under the result.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Time window applied server-side to a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    #[default]
    All,
    Week,
    Month,
}

impl TimeFilter {
    /// Every filter in display order.
    pub const ALL: [TimeFilter; 3] = [TimeFilter::All, TimeFilter::Week, TimeFilter::Month];

    /// The wire value sent as `time_filter`.
    pub fn as_str(self) -> &'static str {
        match self {
            TimeFilter::All => "all",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
        }
    }

    /// Human-readable label for the filter selector.
    pub fn label(self) -> &'static str {
        match self {
            TimeFilter::All => "All Time",
            TimeFilter::Week => "Last Week",
            TimeFilter::Month => "Last Month",
        }
    }

    /// The filter after this one, wrapping around.
    pub fn next(self) -> Self {
        match self {
            TimeFilter::All => TimeFilter::Week,
            TimeFilter::Week => TimeFilter::Month,
            TimeFilter::Month => TimeFilter::All,
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilter {
    type Err = RiskViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TimeFilter::All),
            "week" => Ok(TimeFilter::Week),
            "month" => Ok(TimeFilter::Month),
            other => Err(RiskViewError::Validation {
                reason: format!("unknown time filter '{other}' (expected all, week or month)"),
            }),
        }
    }
}

/// Parameters of one `fetch_history` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub patient_id: String,
    pub page: u32,
    pub page_size: u32,
    pub time_filter: TimeFilter,
}

/// Raw body of a history or recent-predictions response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<PatientRecord>,
    pub total_records: u64,
}

/// A committed page of records with the pagination context it was fetched in.
///
/// `records` are in source order; display code re-sorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<PatientRecord>,
    pub total_records: u64,
    /// 1-based page index.
    pub page_index: u32,
    /// Always at least 1.
    pub page_size: u32,
    pub time_filter: TimeFilter,
}

impl HistoryPage {
    /// Build a page from a collaborator response and the request that produced it.
    pub fn from_response(
        response: HistoryResponse,
        page_index: u32,
        page_size: u32,
        time_filter: TimeFilter,
    ) -> Self {
        Self {
            records: response.history,
            total_records: response.total_records,
            page_index,
            page_size: page_size.max(1),
            time_filter,
        }
    }

    /// `ceil(total_records / page_size)`.
    pub fn page_count(&self) -> u32 {
        page_count(self.total_records, self.page_size)
    }
}

/// Number of pages needed to show `total_records` at `page_size` per page.
///
/// A zero page size is treated as one so the result is always defined.
pub fn page_count(total_records: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    u32::try_from(total_records.div_ceil(size)).unwrap_or(u32::MAX)
}

/// Parse a collaborator timestamp.
///
/// Accepts RFC 3339 and naive ISO-8601 (read as UTC, which is what the
/// prediction service emits).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}
