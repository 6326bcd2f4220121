//! Scripted collaborator shared by the controller, aggregator and view tests.
//!
//! Calls without a registered gate answer immediately from a generated
//! dataset. Registering a gate makes the matching call wait for the test to
//! release it, which is how tests choose completion order.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use chrono::{Duration, TimeZone, Utc};
use tokio::sync::oneshot;

use riskview_contracts::{
    dashboard::SystemStatus,
    error::{RiskViewError, RiskViewResult},
    prediction::{PredictionResult, VitalSigns},
    record::{HistoryQuery, HistoryResponse, PatientRecord},
};

use crate::traits::RiskApi;

pub(crate) type Gate = oneshot::Receiver<RiskViewResult<HistoryResponse>>;

pub(crate) struct ScriptedApi {
    /// Total records reported by ungated history calls.
    pub(crate) total_records: u64,
    pub(crate) history_calls: Mutex<Vec<HistoryQuery>>,
    pub(crate) recent_calls: AtomicUsize,
    history_gates: Mutex<HashMap<u32, Gate>>,
    recent_gates: Mutex<Vec<Gate>>,
    status: Mutex<RiskViewResult<SystemStatus>>,
}

impl ScriptedApi {
    pub(crate) fn with_total(total_records: u64) -> Self {
        Self {
            total_records,
            history_calls: Mutex::new(Vec::new()),
            recent_calls: AtomicUsize::new(0),
            history_gates: Mutex::new(HashMap::new()),
            recent_gates: Mutex::new(Vec::new()),
            status: Mutex::new(Ok(SystemStatus {
                model_status: "Online".to_string(),
                alert_system: "Active".to_string(),
            })),
        }
    }

    /// Hold the next history call for `page` until the returned sender fires.
    pub(crate) fn gate_page(&self, page: u32) -> oneshot::Sender<RiskViewResult<HistoryResponse>> {
        let (tx, rx) = oneshot::channel();
        self.history_gates.lock().unwrap().insert(page, rx);
        tx
    }

    /// Hold the next recent-predictions call until the returned sender fires.
    pub(crate) fn gate_recent(&self) -> oneshot::Sender<RiskViewResult<HistoryResponse>> {
        let (tx, rx) = oneshot::channel();
        self.recent_gates.lock().unwrap().push(rx);
        tx
    }

    pub(crate) fn fail_status(&self, message: &str) {
        *self.status.lock().unwrap() = Err(RiskViewError::Transport {
            message: message.to_string(),
        });
    }

    pub(crate) fn history_call_count(&self) -> usize {
        self.history_calls.lock().unwrap().len()
    }
}

/// A response whose records all carry `tag` as their id.
pub(crate) fn tagged_response(tag: &str, count: usize, total_records: u64) -> HistoryResponse {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let history = (0..count)
        .map(|i| PatientRecord {
            id: tag.to_string(),
            risk_score: 0.1 + 0.15 * i as f64,
            timestamp: base + Duration::hours(i as i64),
            alert_triggered: false,
            explanation: None,
        })
        .collect();
    HistoryResponse { history, total_records }
}

pub(crate) fn record(id: &str, risk_score: f64, hours_ago: i64, alert_triggered: bool) -> PatientRecord {
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    PatientRecord {
        id: id.to_string(),
        risk_score,
        timestamp: now - Duration::hours(hours_ago),
        alert_triggered,
        explanation: None,
    }
}

async fn wait_for(gate: Gate) -> RiskViewResult<HistoryResponse> {
    gate.await.unwrap_or_else(|_| {
        Err(RiskViewError::Transport {
            message: "gate dropped".to_string(),
        })
    })
}

impl RiskApi for ScriptedApi {
    async fn submit_prediction(&self, vitals: VitalSigns) -> RiskViewResult<PredictionResult> {
        let risk_score = if vitals.oxygen_sat < 90.0 { 0.85 } else { 0.2 };
        Ok(PredictionResult {
            risk_score,
            alert_triggered: risk_score >= 0.6,
            explanation: Some(format!("scripted assessment for {}", vitals.patient_id)),
        })
    }

    async fn fetch_history(&self, query: HistoryQuery) -> RiskViewResult<HistoryResponse> {
        self.history_calls.lock().unwrap().push(query.clone());
        let gate = self.history_gates.lock().unwrap().remove(&query.page);
        match gate {
            Some(gate) => wait_for(gate).await,
            None => {
                let remaining = self
                    .total_records
                    .saturating_sub(u64::from(query.page - 1) * u64::from(query.page_size));
                let count = remaining.min(u64::from(query.page_size)) as usize;
                Ok(tagged_response(&format!("page-{}", query.page), count, self.total_records))
            }
        }
    }

    async fn fetch_recent_predictions(&self, limit: u32) -> RiskViewResult<HistoryResponse> {
        self.recent_calls.fetch_add(1, Ordering::SeqCst);
        let gate = {
            let mut gates = self.recent_gates.lock().unwrap();
            if gates.is_empty() {
                None
            } else {
                Some(gates.remove(0))
            }
        };
        match gate {
            Some(gate) => wait_for(gate).await,
            None => Ok(tagged_response("recent", limit as usize, u64::from(limit))),
        }
    }

    async fn fetch_system_status(&self) -> RiskViewResult<SystemStatus> {
        self.status.lock().unwrap().clone()
    }
}
