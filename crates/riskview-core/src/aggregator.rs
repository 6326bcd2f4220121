//! The view aggregator: the dashboard's single-flight refresh.
//!
//! A refresh forces the dashboard feed through the query controller, fetches
//! the system status alongside it and derives the headline numbers. At most
//! one refresh runs at a time; a trigger that arrives while one is running
//! is dropped, not queued.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use riskview_contracts::{
    dashboard::{Aggregate, DashboardStats, RecentPrediction, SystemStatus},
    error::RiskViewResult,
    query::{QueryKey, QueryState},
    record::HistoryPage,
    risk::RiskLevel,
};

use crate::{classifier::classify, controller::QueryController, traits::RiskApi};

/// Result of one `refresh` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// This call ran the refresh and produced a new snapshot.
    Refreshed(Aggregate),
    /// Another refresh was already running; this trigger was ignored.
    InFlight,
}

struct AggregatorInner<A: RiskApi> {
    api: Arc<A>,
    controller: QueryController<A>,
    in_flight: AtomicBool,
    latest: Mutex<Option<Aggregate>>,
}

/// Builds dashboard snapshots from the recent-predictions feed.
pub struct ViewAggregator<A: RiskApi> {
    inner: Arc<AggregatorInner<A>>,
}

impl<A: RiskApi> Clone for ViewAggregator<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Clears the in-flight flag however the refresh ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: RiskApi> ViewAggregator<A> {
    /// `controller` must be dedicated to the dashboard.
    pub fn new(api: Arc<A>, controller: QueryController<A>) -> Self {
        Self {
            inner: Arc::new(AggregatorInner {
                api,
                controller,
                in_flight: AtomicBool::new(false),
                latest: Mutex::new(None),
            }),
        }
    }

    pub fn controller(&self) -> &QueryController<A> {
        &self.inner.controller
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// The most recent snapshot, if any refresh has completed.
    pub fn latest(&self) -> Option<Aggregate> {
        self.inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one refresh unless one is already running.
    ///
    /// A failed feed fetch still yields a snapshot: the previous records are
    /// kept and the snapshot carries the error. A failed status fetch falls
    /// back to [`SystemStatus::unknown`].
    pub async fn refresh(&self) -> RiskViewResult<RefreshOutcome> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("dashboard refresh already in flight, trigger ignored");
            return Ok(RefreshOutcome::InFlight);
        }
        let _guard = FlightGuard(&self.inner.in_flight);

        let dispatch = self.inner.controller.force(QueryKey::Aggregate)?;
        let (_, status) = tokio::join!(dispatch.settled(), self.inner.api.fetch_system_status());

        let status = status.unwrap_or_else(|err| {
            warn!(error = %err, "system status unavailable");
            SystemStatus::unknown()
        });

        let aggregate = build_aggregate(&self.inner.controller.state(), status, Utc::now());
        info!(
            status = ?aggregate.status,
            total_predictions = aggregate.stats.total_predictions,
            high_risk = aggregate.stats.high_risk,
            "dashboard refreshed"
        );

        *self
            .inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(aggregate.clone());
        Ok(RefreshOutcome::Refreshed(aggregate))
    }
}

/// Assemble a dashboard snapshot from a committed feed state.
pub fn build_aggregate(state: &QueryState, system_status: SystemStatus, now: DateTime<Utc>) -> Aggregate {
    let page = state.data.as_ref();

    let mut recent_predictions: Vec<RecentPrediction> = page
        .map(|page| {
            page.records
                .iter()
                .map(|record| RecentPrediction {
                    level: classify(record.risk_score),
                    record: record.clone(),
                })
                .collect()
        })
        .unwrap_or_default();
    recent_predictions.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));

    Aggregate {
        stats: derive_stats(page),
        recent_predictions,
        system_status,
        status: state.status,
        error: state.error.clone(),
        refreshed_at: now,
    }
}

/// Headline numbers over the records of one feed page.
pub fn derive_stats(page: Option<&HistoryPage>) -> DashboardStats {
    let records = page.map(|page| page.records.as_slice()).unwrap_or_default();

    let mut distribution: BTreeMap<RiskLevel, usize> =
        RiskLevel::ALL.iter().map(|level| (*level, 0)).collect();
    let mut patients = BTreeSet::new();
    let mut alerts_triggered = 0;
    let mut score_sum = 0.0;

    for record in records {
        *distribution.entry(classify(record.risk_score)).or_default() += 1;
        patients.insert(record.id.as_str());
        if record.alert_triggered {
            alerts_triggered += 1;
        }
        score_sum += record.risk_score;
    }

    let high_risk = distribution
        .iter()
        .filter(|(level, _)| level.is_elevated())
        .map(|(_, count)| count)
        .sum();

    DashboardStats {
        total_predictions: page.map(|page| page.total_records).unwrap_or(0),
        distinct_patients: patients.len(),
        high_risk,
        alerts_triggered,
        average_risk: (!records.is_empty()).then(|| score_sum / records.len() as f64),
        distribution,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
