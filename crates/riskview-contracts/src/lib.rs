//! # riskview-contracts
//!
//! Shared types, payload shapes, and errors for the RiskView client engine.
//!
//! Every crate in the workspace imports from here. No business logic lives in
//! this crate: risk thresholds, chart projection and query orchestration all
//! live in `riskview-core`.

pub mod dashboard;
pub mod error;
pub mod prediction;
pub mod preference;
pub mod query;
pub mod record;
pub mod risk;
pub mod verify;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use chrono::{TimeZone, Utc};
    use error::RiskViewError;
    use preference::ThemeMode;
    use query::{QueryKey, ViewId};
    use record::{page_count, parse_timestamp, HistoryPage, HistoryResponse, PatientRecord, TimeFilter};
    use risk::RiskLevel;

    // ── Wire decoding ────────────────────────────────────────────────────────

    #[test]
    fn history_response_decodes_service_payload() {
        let body = serde_json::json!({
            "history": [
                {
                    "id": "P1001",
                    "risk_score": 0.85,
                    "timestamp": "2024-03-01T10:15:00",
                    "alert_triggered": true,
                    "explanation": "Low oxygen saturation"
                },
                {
                    "id": "P1001",
                    "risk_score": 0.31,
                    "timestamp": "2024-03-02T08:00:00Z"
                }
            ],
            "total_records": 2
        });

        let decoded: HistoryResponse = serde_json::from_value(body).unwrap();
        assert_eq!(decoded.total_records, 2);
        assert_eq!(decoded.history.len(), 2);
        assert!(decoded.history[0].alert_triggered);
        assert_eq!(decoded.history[0].explanation.as_deref(), Some("Low oxygen saturation"));

        // Missing optional fields fall back to defaults.
        assert!(!decoded.history[1].alert_triggered);
        assert!(decoded.history[1].explanation.is_none());
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let naive = parse_timestamp("2024-03-01T10:15:00").unwrap();
        let zoned = parse_timestamp("2024-03-01T10:15:00+00:00").unwrap();
        assert_eq!(naive, zoned);
        assert_eq!(naive, Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap());

        assert!(parse_timestamp("2024-03-01 10:15:00.250").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn invalid_timestamp_is_a_decode_error() {
        let body = serde_json::json!({
            "id": "P1", "risk_score": 0.2, "timestamp": "not-a-time"
        });
        let err = serde_json::from_value::<PatientRecord>(body).unwrap_err();
        assert!(err.to_string().contains("not-a-time"));
    }

    // ── Pagination ───────────────────────────────────────────────────────────

    #[test]
    fn page_count_is_ceiling_division() {
        assert_eq!(page_count(12, 5), 3);
        assert_eq!(page_count(10, 5), 2);
        assert_eq!(page_count(5, 5), 1);
        assert_eq!(page_count(0, 5), 0);
        // A zero page size never divides by zero.
        assert_eq!(page_count(3, 0), 3);
    }

    #[test]
    fn history_page_keeps_request_context() {
        let page = HistoryPage::from_response(
            HistoryResponse { history: vec![], total_records: 12 },
            2,
            5,
            TimeFilter::Week,
        );
        assert_eq!(page.page_index, 2);
        assert_eq!(page.page_count(), 3);
        assert_eq!(page.time_filter, TimeFilter::Week);
    }

    // ── Enumerations ─────────────────────────────────────────────────────────

    #[test]
    fn time_filter_parses_and_cycles() {
        assert_eq!("WEEK".parse::<TimeFilter>().unwrap(), TimeFilter::Week);
        assert!(matches!(
            "year".parse::<TimeFilter>(),
            Err(RiskViewError::Validation { .. })
        ));
        assert_eq!(TimeFilter::All.next().next().next(), TimeFilter::All);
        assert_eq!(serde_json::to_string(&TimeFilter::Month).unwrap(), "\"month\"");
    }

    #[test]
    fn theme_mode_accepts_only_persisted_literals() {
        assert_eq!("dark".parse::<ThemeMode>().unwrap(), ThemeMode::Dark);
        assert_eq!("light".parse::<ThemeMode>().unwrap(), ThemeMode::Light);
        assert!("Dark".parse::<ThemeMode>().is_err());
        assert_eq!(ThemeMode::Light.flipped(), ThemeMode::Dark);
    }

    #[test]
    fn risk_levels_order_by_severity() {
        assert!(RiskLevel::Low < RiskLevel::Moderate);
        assert!(RiskLevel::Moderate < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert!(RiskLevel::High.is_elevated());
        assert!(!RiskLevel::Moderate.is_elevated());
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"CRITICAL\"");
    }

    // ── Query keys ───────────────────────────────────────────────────────────

    #[test]
    fn query_keys_compare_structurally() {
        let a = QueryKey::history("P1", 1, TimeFilter::All);
        let b = QueryKey::history("P1", 1, TimeFilter::All);
        let c = QueryKey::history("P1", 2, TimeFilter::All);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.same_listing(&c));
        assert!(!a.same_listing(&QueryKey::history("P1", 1, TimeFilter::Week)));
        assert!(!a.same_listing(&QueryKey::Aggregate));
    }

    #[test]
    fn view_id_new_produces_unique_values() {
        let ids: std::collections::HashSet<String> =
            (0..50).map(|_| ViewId::new().to_string()).collect();
        assert_eq!(ids.len(), 50);
    }

    // ── Error display messages ───────────────────────────────────────────────

    #[test]
    fn error_messages_carry_context() {
        let err = RiskViewError::Transport { message: "connection refused".to_string() };
        assert!(err.to_string().contains("connection refused"));

        let err = RiskViewError::InvalidKey { reason: "page 4 of 3".to_string() };
        assert!(err.to_string().contains("invalid query key"));

        let err = RiskViewError::Timeout { after: Duration::from_secs(10) };
        assert_eq!(err.to_string(), "request timed out after 10s");

        let err = RiskViewError::Timeout { after: Duration::from_millis(200) };
        assert_eq!(err.to_string(), "request timed out after 200ms");

        let err = RiskViewError::Persistence { reason: "read-only".to_string() };
        assert!(err.to_string().contains("read-only"));
    }
}
