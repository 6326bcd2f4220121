//! The chart projector: records in, plotted time series out.

use std::fmt::Display;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use riskview_contracts::record::PatientRecord;

/// One plotted point. `date` + `time` form the x label; `risk` is y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Calendar date in display time, `YYYY-MM-DD`.
    pub date: String,
    /// Time of day in display time, `HH:MM`.
    pub time: String,
    pub risk: f64,
}

impl ChartPoint {
    /// Full x-axis label, e.g. `"2024-03-01 10:15"`.
    pub fn label(&self) -> String {
        format!("{} {}", self.date, self.time)
    }
}

/// Project `records` into a chart series in local display time.
///
/// See [`project_in`].
pub fn project(records: &[PatientRecord]) -> Vec<ChartPoint> {
    project_in(records, &Local)
}

/// Project `records` into a chart series in the time zone `tz`.
///
/// One point per record, ascending by timestamp. The sort is stable, so
/// records sharing a timestamp keep their input order. An empty input gives
/// an empty series; the caller renders "no data" for it.
pub fn project_in<Tz>(records: &[PatientRecord], tz: &Tz) -> Vec<ChartPoint>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut ordered: Vec<&PatientRecord> = records.iter().collect();
    ordered.sort_by_key(|record| record.timestamp);

    ordered
        .into_iter()
        .map(|record| {
            let local = record.timestamp.with_timezone(tz);
            ChartPoint {
                date: local.format("%Y-%m-%d").to_string(),
                time: local.format("%H:%M").to_string(),
                risk: record.risk_score,
            }
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
