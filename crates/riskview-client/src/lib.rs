//! # riskview-client
//!
//! [`HttpRiskApi`] talks to the prediction service over HTTP/JSON and
//! implements `riskview_core::traits::RiskApi`.
//!
//! | Operation                  | Request                                                     |
//! |----------------------------|-------------------------------------------------------------|
//! | `submit_prediction`        | `POST /predict`                                             |
//! | `fetch_history`            | `GET /patients/{id}/history?page=&page_size=&time_filter=`  |
//! | `fetch_recent_predictions` | `GET /predictions/recent?limit=`                            |
//! | `fetch_system_status`      | `GET /status`                                               |
//!
//! Every successful body is verified against its schema before decoding.

pub mod http;

pub use http::HttpRiskApi;
