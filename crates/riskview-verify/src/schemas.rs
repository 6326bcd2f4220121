//! Built-in schemas for the prediction service's responses.

use serde_json::json;

use riskview_contracts::verify::{PayloadSchema, VerificationRule, VerificationRuleType};

/// Custom rule: a page never holds more records than the reported total.
pub const HISTORY_WITHIN_TOTAL: &str = "history-within-total";
/// Custom rule: every record timestamp is RFC 3339 or naive ISO-8601.
pub const TIMESTAMPS_PARSE: &str = "timestamps-parse";

fn risk_score() -> serde_json::Value {
    json!({ "type": "number", "minimum": 0.0, "maximum": 1.0 })
}

/// History pages and the recent-predictions feed share this shape.
pub fn history_response_schema() -> PayloadSchema {
    PayloadSchema {
        schema_id: "history-response-v1".to_string(),
        json_schema: json!({
            "type": "object",
            "required": ["history", "total_records"],
            "properties": {
                "total_records": { "type": "integer", "minimum": 0 },
                "history": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "risk_score", "timestamp"],
                        "properties": {
                            "id": { "type": "string" },
                            "risk_score": risk_score(),
                            "timestamp": { "type": "string" },
                            "alert_triggered": { "type": "boolean" },
                            "explanation": { "type": ["string", "null"] }
                        }
                    }
                }
            }
        }),
        rules: vec![
            VerificationRule {
                rule_id: "history-within-total".to_string(),
                description: "records on the page never exceed total_records".to_string(),
                rule_type: VerificationRuleType::Custom {
                    function_name: HISTORY_WITHIN_TOTAL.to_string(),
                },
            },
            VerificationRule {
                rule_id: "timestamps-parse".to_string(),
                description: "every timestamp is a readable date-time".to_string(),
                rule_type: VerificationRuleType::Custom {
                    function_name: TIMESTAMPS_PARSE.to_string(),
                },
            },
        ],
    }
}

pub fn prediction_response_schema() -> PayloadSchema {
    PayloadSchema {
        schema_id: "prediction-response-v1".to_string(),
        json_schema: json!({
            "type": "object",
            "required": ["risk_score"],
            "properties": {
                "risk_score": risk_score(),
                "alert_triggered": { "type": "boolean" },
                "explanation": { "type": ["string", "null"] }
            }
        }),
        rules: vec![VerificationRule {
            rule_id: "risk-score-present".to_string(),
            description: "a prediction always carries a score".to_string(),
            rule_type: VerificationRuleType::RequiredField {
                field_path: "risk_score".to_string(),
            },
        }],
    }
}

pub fn system_status_schema() -> PayloadSchema {
    PayloadSchema {
        schema_id: "system-status-v1".to_string(),
        json_schema: json!({
            "type": "object",
            "required": ["model_status", "alert_system"],
            "properties": {
                "model_status": { "type": "string" },
                "alert_system": { "type": "string" }
            }
        }),
        rules: Vec::new(),
    }
}
