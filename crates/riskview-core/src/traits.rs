//! Collaborator trait definitions.
//!
//! These traits are the seams between the engine and the outside world:
//!
//! - `RiskApi`: the network collaborator (prediction service)
//! - `PreferenceStorage`: where the presentation mode is persisted
//! - `ResponseVerifier`: boundary validation of raw response payloads
//!
//! The engine never talks to a transport, a file or a schema library
//! directly; it is handed implementations of these traits.

use std::future::Future;

use serde_json::Value;

use riskview_contracts::{
    dashboard::SystemStatus,
    error::RiskViewResult,
    prediction::{PredictionResult, VitalSigns},
    record::{HistoryQuery, HistoryResponse},
    verify::{PayloadSchema, VerificationReport},
};

/// The prediction service as seen by the engine.
///
/// Only the request/response contract matters; implementations decide the
/// transport. Every method fails with a message-bearing `RiskViewError`
/// (usually `Transport` or `MalformedPayload`) and must never panic.
///
/// Futures must be `Send` because the query controller runs each fetch on
/// its own task.
pub trait RiskApi: Send + Sync + 'static {
    /// Submit one set of vital signs and return the model's assessment.
    fn submit_prediction(
        &self,
        vitals: VitalSigns,
    ) -> impl Future<Output = RiskViewResult<PredictionResult>> + Send;

    /// Fetch one page of a patient's prediction history.
    fn fetch_history(
        &self,
        query: HistoryQuery,
    ) -> impl Future<Output = RiskViewResult<HistoryResponse>> + Send;

    /// Fetch the most recent predictions across all patients.
    fn fetch_recent_predictions(
        &self,
        limit: u32,
    ) -> impl Future<Output = RiskViewResult<HistoryResponse>> + Send;

    /// Report backend health for the dashboard.
    fn fetch_system_status(&self) -> impl Future<Output = RiskViewResult<SystemStatus>> + Send;
}

/// A single-key store for the presentation preference.
///
/// Values are the raw persisted literals (`"light"` / `"dark"`); parsing is
/// the preference store's job so that unknown values can be logged and
/// ignored in one place.
pub trait PreferenceStorage: Send + Sync {
    /// Return the persisted value, or `None` when nothing is stored.
    fn load(&self) -> RiskViewResult<Option<String>>;

    /// Persist `value`, replacing any previous value.
    fn save(&self, value: &str) -> RiskViewResult<()>;

    /// Remove the persisted value.
    fn clear(&self) -> RiskViewResult<()>;
}

/// Boundary check for collaborator payloads.
///
/// Implementations inspect a raw JSON body against a declarative
/// `PayloadSchema` and return a report. A failing report means the payload
/// must not be decoded into engine types.
pub trait ResponseVerifier: Send + Sync {
    fn verify(&self, payload: &Value, schema: &PayloadSchema) -> RiskViewResult<VerificationReport>;
}
