//! In-memory `RiskApi` implementations.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tracing::debug;

use riskview_contracts::{
    dashboard::SystemStatus,
    error::{RiskViewError, RiskViewResult},
    prediction::{PredictionResult, VitalSigns},
    record::{HistoryQuery, HistoryResponse, PatientRecord},
};
use riskview_core::{classifier::HIGH_THRESHOLD, traits::RiskApi};

use crate::mock_data::{find_patient, heuristic_score, patient_history, recent_feed, within};

/// The simulated prediction service.
///
/// Submitted predictions are kept and show up in both the patient's history
/// and the recent feed.
pub struct MockRiskApi {
    now: DateTime<Utc>,
    latency: Duration,
    submitted: Mutex<Vec<PatientRecord>>,
    status: SystemStatus,
}

impl MockRiskApi {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// A service whose seed data is anchored at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            latency: Duration::ZERO,
            submitted: Mutex::new(Vec::new()),
            status: SystemStatus {
                model_status: "Online".to_string(),
                alert_system: "Active".to_string(),
            },
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn submitted(&self) -> Vec<PatientRecord> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn history_for(&self, query: &HistoryQuery) -> RiskViewResult<HistoryResponse> {
        let mut records: Vec<PatientRecord> = self
            .submitted()
            .into_iter()
            .filter(|r| r.id == query.patient_id)
            .collect();
        match find_patient(&query.patient_id) {
            Some(profile) => records.extend(patient_history(profile, self.now)),
            None if records.is_empty() => {
                return Err(RiskViewError::Transport {
                    message: "Patient not found".to_string(),
                })
            }
            None => {}
        }
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let records = within(records, query.time_filter, self.now);
        let page_size = query.page_size.max(1) as usize;
        let skip = (query.page.saturating_sub(1) as usize).saturating_mul(page_size);

        Ok(HistoryResponse {
            total_records: records.len() as u64,
            history: records.into_iter().skip(skip).take(page_size).collect(),
        })
    }
}

impl Default for MockRiskApi {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskApi for MockRiskApi {
    async fn submit_prediction(&self, vitals: VitalSigns) -> RiskViewResult<PredictionResult> {
        self.simulate_latency().await;
        let (risk_score, findings) = heuristic_score(&vitals);
        let alert_triggered = risk_score >= HIGH_THRESHOLD;
        let explanation = if findings.is_empty() {
            "All vital signs within normal neonatal ranges".to_string()
        } else {
            findings.join("; ")
        };

        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PatientRecord {
                id: vitals.patient_id.clone(),
                risk_score,
                timestamp: Utc::now(),
                alert_triggered,
                explanation: Some(explanation.clone()),
            });
        debug!(patient_id = %vitals.patient_id, risk_score, "mock prediction stored");

        Ok(PredictionResult {
            risk_score,
            alert_triggered,
            explanation: Some(explanation),
        })
    }

    async fn fetch_history(&self, query: HistoryQuery) -> RiskViewResult<HistoryResponse> {
        self.simulate_latency().await;
        self.history_for(&query)
    }

    async fn fetch_recent_predictions(&self, limit: u32) -> RiskViewResult<HistoryResponse> {
        self.simulate_latency().await;
        let mut feed = self.submitted();
        feed.extend(recent_feed(self.now));
        feed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(HistoryResponse {
            total_records: feed.len() as u64,
            history: feed.into_iter().take(limit as usize).collect(),
        })
    }

    async fn fetch_system_status(&self) -> RiskViewResult<SystemStatus> {
        self.simulate_latency().await;
        Ok(self.status.clone())
    }
}

/// A `MockRiskApi` whose history calls can be held per page.
///
/// `hold(page)` parks the next history call for that page until the returned
/// sender fires, which lets a walkthrough pick the completion order.
#[derive(Clone)]
pub struct GatedRiskApi {
    inner: Arc<MockRiskApi>,
    holds: Arc<Mutex<HashMap<u32, oneshot::Receiver<()>>>>,
}

impl GatedRiskApi {
    pub fn new(inner: MockRiskApi) -> Self {
        Self {
            inner: Arc::new(inner),
            holds: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn hold(&self, page: u32) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page, rx);
        tx
    }
}

impl RiskApi for GatedRiskApi {
    async fn submit_prediction(&self, vitals: VitalSigns) -> RiskViewResult<PredictionResult> {
        self.inner.submit_prediction(vitals).await
    }

    async fn fetch_history(&self, query: HistoryQuery) -> RiskViewResult<HistoryResponse> {
        let hold = self
            .holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&query.page);
        if let Some(hold) = hold {
            // A dropped sender releases the call as well.
            let _ = hold.await;
        }
        self.inner.fetch_history(query).await
    }

    async fn fetch_recent_predictions(&self, limit: u32) -> RiskViewResult<HistoryResponse> {
        self.inner.fetch_recent_predictions(limit).await
    }

    async fn fetch_system_status(&self) -> RiskViewResult<SystemStatus> {
        self.inner.fetch_system_status().await
    }
}
