//! reqwest-backed `RiskApi`.

use std::{sync::Arc, time::Duration};

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use riskview_config::AppConfig;
use riskview_contracts::{
    dashboard::SystemStatus,
    error::{RiskViewError, RiskViewResult},
    prediction::{PredictionResult, VitalSigns},
    record::{HistoryQuery, HistoryResponse},
    verify::PayloadSchema,
};
use riskview_core::traits::{ResponseVerifier, RiskApi};
use riskview_verify::{ensure_valid, schemas, SchemaVerifier};

#[derive(Clone)]
pub struct HttpRiskApi {
    base_url: Url,
    client: Client,
    timeout: Duration,
    verifier: Arc<dyn ResponseVerifier>,
}

impl HttpRiskApi {
    /// Client for the service at `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> RiskViewResult<Self> {
        let base_url = Url::parse(base_url.trim()).map_err(|e| RiskViewError::ConfigError {
            reason: format!("invalid api base url '{base_url}': {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RiskViewError::ConfigError {
                reason: format!("api base url '{base_url}' cannot carry a path"),
            });
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RiskViewError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url,
            client,
            timeout,
            verifier: Arc::new(SchemaVerifier::with_builtin_rules()),
        })
    }

    pub fn from_config(config: &AppConfig) -> RiskViewResult<Self> {
        Self::new(&config.api.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn transport_error(&self, err: reqwest::Error) -> RiskViewError {
        if err.is_timeout() {
            RiskViewError::Timeout { after: self.timeout }
        } else if err.is_connect() {
            RiskViewError::Transport {
                message: format!("could not reach {}", self.base_url),
            }
        } else {
            RiskViewError::Transport {
                message: err.to_string(),
            }
        }
    }

    /// Send `request`, verify the body against `schema`, then decode it.
    async fn exchange<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        schema: PayloadSchema,
    ) -> RiskViewResult<T> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let url = response.url().clone();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(url = %url, status = status.as_u16(), message = %message, "request rejected");
            return Err(RiskViewError::Transport { message });
        }

        let body: Value = response.json().await.map_err(|e| RiskViewError::MalformedPayload {
            reason: format!("response from {url} is not JSON: {e}"),
        })?;
        ensure_valid(self.verifier.as_ref(), &body, &schema)?;
        debug!(url = %url, schema_id = %schema.schema_id, "response verified");

        serde_json::from_value(body).map_err(|e| RiskViewError::MalformedPayload {
            reason: format!("{}: {e}", schema.schema_id),
        })
    }
}

impl RiskApi for HttpRiskApi {
    async fn submit_prediction(&self, vitals: VitalSigns) -> RiskViewResult<PredictionResult> {
        let request = self.client.post(self.endpoint(&["predict"])).json(&vitals);
        self.exchange(request, schemas::prediction_response_schema()).await
    }

    async fn fetch_history(&self, query: HistoryQuery) -> RiskViewResult<HistoryResponse> {
        let url = self.endpoint(&["patients", query.patient_id.as_str(), "history"]);
        let request = self.client.get(url).query(&[
            ("page", query.page.to_string()),
            ("page_size", query.page_size.to_string()),
            ("time_filter", query.time_filter.as_str().to_string()),
        ]);
        self.exchange(request, schemas::history_response_schema()).await
    }

    async fn fetch_recent_predictions(&self, limit: u32) -> RiskViewResult<HistoryResponse> {
        let request = self
            .client
            .get(self.endpoint(&["predictions", "recent"]))
            .query(&[("limit", limit)]);
        self.exchange(request, schemas::history_response_schema()).await
    }

    async fn fetch_system_status(&self) -> RiskViewResult<SystemStatus> {
        let request = self.client.get(self.endpoint(&["status"]));
        self.exchange(request, schemas::system_status_schema()).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use axum::{
        extract::{Path, Query},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    use riskview_contracts::{
        error::RiskViewError,
        prediction::VitalSigns,
        record::{HistoryQuery, TimeFilter},
    };
    use riskview_core::traits::RiskApi;

    use super::HttpRiskApi;

    // ── Fake service ──────────────────────────────────────────────────────────

    async fn predict(Json(vitals): Json<VitalSigns>) -> Json<Value> {
        let risk_score = if vitals.oxygen_sat < 90.0 { 0.85 } else { 0.15 };
        Json(json!({
            "risk_score": risk_score,
            "alert_triggered": risk_score >= 0.8,
            "explanation": format!("assessed {}", vitals.patient_id),
        }))
    }

    async fn history(
        Path(patient_id): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        if patient_id == "missing" {
            return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Patient not found" })));
        }
        let echo = format!(
            "page={} size={} filter={}",
            params["page"], params["page_size"], params["time_filter"]
        );
        (
            StatusCode::OK,
            Json(json!({
                "history": [{
                    "id": patient_id,
                    "risk_score": 0.72,
                    "timestamp": "2024-03-01T10:15:00",
                    "alert_triggered": true,
                    "explanation": echo,
                }],
                "total_records": 12,
            })),
        )
    }

    async fn recent(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let limit: usize = params["limit"].parse().unwrap();
        let history: Vec<Value> = (0..limit)
            .map(|i| {
                json!({
                    "id": format!("P100{i}"),
                    "risk_score": 0.1 * i as f64,
                    "timestamp": format!("2024-03-01 1{i}:00:00"),
                })
            })
            .collect();
        Json(json!({ "history": history, "total_records": 40 }))
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn service() -> HttpRiskApi {
        let app = Router::new()
            .route("/predict", post(predict))
            .route("/patients/:patient_id/history", get(history))
            .route("/predictions/recent", get(recent))
            .route(
                "/status",
                get(|| async { Json(json!({ "model_status": "Online", "alert_system": "Active" })) }),
            );
        HttpRiskApi::new(&serve(app).await, Duration::from_secs(5)).unwrap()
    }

    fn vitals(patient_id: &str, oxygen_sat: f64) -> VitalSigns {
        VitalSigns {
            patient_id: patient_id.to_string(),
            heart_rate: 120.0,
            oxygen_sat,
            blood_pressure: 60.0,
            respiration_rate: 40.0,
        }
    }

    // ── Happy paths ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn prediction_round_trip() {
        let api = service().await;
        let result = api.submit_prediction(vitals("P1001", 85.0)).await.unwrap();
        assert_eq!(result.risk_score, 0.85);
        assert!(result.alert_triggered);
        assert_eq!(result.explanation.as_deref(), Some("assessed P1001"));
    }

    #[tokio::test]
    async fn history_sends_paging_parameters() {
        let api = service().await;
        let response = api
            .fetch_history(HistoryQuery {
                patient_id: "P1001".to_string(),
                page: 2,
                page_size: 5,
                time_filter: TimeFilter::Week,
            })
            .await
            .unwrap();

        assert_eq!(response.total_records, 12);
        assert_eq!(response.history[0].id, "P1001");
        assert_eq!(
            response.history[0].explanation.as_deref(),
            Some("page=2 size=5 filter=week")
        );
    }

    #[tokio::test]
    async fn recent_feed_and_status() {
        let api = service().await;
        let feed = api.fetch_recent_predictions(3).await.unwrap();
        assert_eq!(feed.history.len(), 3);
        assert_eq!(feed.total_records, 40);

        let status = api.fetch_system_status().await.unwrap();
        assert!(status.is_healthy());
    }

    #[tokio::test]
    async fn base_url_with_path_prefix_is_kept() {
        let app = Router::new().nest(
            "/api",
            Router::new().route(
                "/status",
                get(|| async { Json(json!({ "model_status": "Online", "alert_system": "Active" })) }),
            ),
        );
        let base = format!("{}/api/", serve(app).await);
        let api = HttpRiskApi::new(&base, Duration::from_secs(5)).unwrap();
        assert!(api.fetch_system_status().await.is_ok());
    }

    // ── Failures ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn error_detail_becomes_transport_message() {
        let api = service().await;
        let err = api
            .fetch_history(HistoryQuery {
                patient_id: "missing".to_string(),
                page: 1,
                page_size: 5,
                time_filter: TimeFilter::All,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RiskViewError::Transport { message: "Patient not found".to_string() }
        );
    }

    #[tokio::test]
    async fn bare_error_status_uses_http_code() {
        let app = Router::new().route("/status", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let api = HttpRiskApi::new(&serve(app).await, Duration::from_secs(5)).unwrap();
        let err = api.fetch_system_status().await.unwrap_err();
        assert_eq!(err, RiskViewError::Transport { message: "HTTP 503".to_string() });
    }

    #[tokio::test]
    async fn payload_failing_schema_is_malformed() {
        let app = Router::new().route(
            "/predict",
            post(|| async { Json(json!({ "risk_score": 3.5 })) }),
        );
        let api = HttpRiskApi::new(&serve(app).await, Duration::from_secs(5)).unwrap();
        let err = api.submit_prediction(vitals("P1", 98.0)).await.unwrap_err();
        assert!(matches!(err, RiskViewError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let app = Router::new().route(
            "/status",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({ "model_status": "Online", "alert_system": "Active" }))
            }),
        );
        let api = HttpRiskApi::new(&serve(app).await, Duration::from_millis(200)).unwrap();
        let err = api.fetch_system_status().await.unwrap_err();
        assert_eq!(err, RiskViewError::Timeout { after: Duration::from_millis(200) });
        assert_eq!(err.to_string(), "request timed out after 200ms");
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpRiskApi::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = api.fetch_system_status().await.unwrap_err();
        assert!(matches!(err, RiskViewError::Transport { .. }));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        assert!(matches!(
            HttpRiskApi::new("not a url", Duration::from_secs(1)),
            Err(RiskViewError::ConfigError { .. })
        ));
    }
}
