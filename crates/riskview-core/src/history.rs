//! Patient history view model.
//!
//! Binds one query controller to a patient and keeps the page and time
//! filter the user picked. `snapshot()` turns the committed query state into
//! everything the history screen draws.

use serde::Serialize;
use tracing::info;

use riskview_contracts::{
    error::RiskViewResult,
    query::{QueryKey, QueryStatus},
    record::{PatientRecord, TimeFilter},
    risk::RiskLevel,
};

use crate::{
    chart::{self, ChartPoint},
    classifier::{classify, reference_lines},
    controller::{clamp_page, Dispatch, QueryController},
    traits::RiskApi,
};

/// Which of the mutually exclusive bodies the screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ViewDisplay {
    /// Nothing committed yet and a fetch is pending.
    Loading,
    /// Nothing committed and the fetch failed; offer a retry.
    Failed { message: String },
    /// A page was committed but it has no records.
    Empty,
    /// Records to show.
    Ready,
}

/// A history table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub record: PatientRecord,
    pub level: RiskLevel,
}

/// Render-ready projection of the view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySnapshot {
    pub patient_id: String,
    pub status: QueryStatus,
    pub display: ViewDisplay,
    /// Newest first.
    pub rows: Vec<HistoryRow>,
    /// Oldest first.
    pub chart: Vec<ChartPoint>,
    pub reference_lines: [(RiskLevel, f64); 3],
    pub page: u32,
    pub page_count: u32,
    pub show_pagination: bool,
    pub time_filter: TimeFilter,
    /// Inline error; may accompany retained rows.
    pub error: Option<String>,
}

pub struct HistoryView<A: RiskApi> {
    controller: QueryController<A>,
    patient_id: String,
    page: u32,
    time_filter: TimeFilter,
}

impl<A: RiskApi> HistoryView<A> {
    pub fn new(controller: QueryController<A>, patient_id: impl Into<String>) -> Self {
        Self {
            controller,
            patient_id: patient_id.into(),
            page: 1,
            time_filter: TimeFilter::All,
        }
    }

    pub fn controller(&self) -> &QueryController<A> {
        &self.controller
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn time_filter(&self) -> TimeFilter {
        self.time_filter
    }

    fn key(&self, page: u32, time_filter: TimeFilter) -> QueryKey {
        QueryKey::history(self.patient_id.clone(), page, time_filter)
    }

    /// Request the current page.
    pub fn load(&self) -> RiskViewResult<Dispatch> {
        self.controller.request(self.key(self.page, self.time_filter))
    }

    /// Move to `page`. A rejected page leaves the view where it was.
    pub fn set_page(&mut self, page: u32) -> RiskViewResult<Dispatch> {
        let dispatch = self.controller.request(self.key(page, self.time_filter))?;
        self.page = page;
        Ok(dispatch)
    }

    /// Move as close to `page` as the committed listing allows.
    ///
    /// Out-of-range pages land on the first or last page instead of being
    /// rejected. Until a page of the current window is committed, only
    /// page 0 is adjusted.
    pub fn jump_to_page(&mut self, page: u32) -> RiskViewResult<Dispatch> {
        let page = match self.controller.state().data {
            Some(data) if data.time_filter == self.time_filter => clamp_page(page, data.page_count()),
            _ => page.max(1),
        };
        self.set_page(page)
    }

    pub fn next_page(&mut self) -> RiskViewResult<Dispatch> {
        self.set_page(self.page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> RiskViewResult<Dispatch> {
        self.set_page(self.page.saturating_sub(1))
    }

    /// Switch the time window. Always returns to the first page.
    pub fn set_time_filter(&mut self, time_filter: TimeFilter) -> RiskViewResult<Dispatch> {
        let dispatch = self.controller.request(self.key(1, time_filter))?;
        info!(
            patient_id = %self.patient_id,
            time_filter = %time_filter,
            "history filter changed"
        );
        self.time_filter = time_filter;
        self.page = 1;
        Ok(dispatch)
    }

    /// Re-issue the current key after a failure.
    pub fn retry(&self) -> RiskViewResult<Dispatch> {
        self.controller.refetch()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let state = self.controller.state();

        let display = match (&state.data, state.status) {
            (None, QueryStatus::Error) => ViewDisplay::Failed {
                message: state.error.clone().unwrap_or_default(),
            },
            (None, _) => ViewDisplay::Loading,
            (Some(page), _) if page.records.is_empty() => ViewDisplay::Empty,
            (Some(_), _) => ViewDisplay::Ready,
        };

        let records = state
            .data
            .as_ref()
            .map(|page| page.records.as_slice())
            .unwrap_or_default();

        let mut rows: Vec<HistoryRow> = records
            .iter()
            .map(|record| HistoryRow {
                level: classify(record.risk_score),
                record: record.clone(),
            })
            .collect();
        rows.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));

        let page_count = state.data.as_ref().map(|page| page.page_count()).unwrap_or(0);

        HistorySnapshot {
            patient_id: self.patient_id.clone(),
            status: state.status,
            display,
            rows,
            chart: chart::project(records),
            reference_lines: reference_lines(),
            page: self.page,
            page_count,
            show_pagination: page_count > 1,
            time_filter: self.time_filter,
            error: state.error,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
