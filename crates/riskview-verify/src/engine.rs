//! Payload verifier for prediction-service responses.
//!
//! `SchemaVerifier` implements `ResponseVerifier` from `riskview-core` in two
//! passes over the raw JSON body:
//!
//! 1. **Structural**: the body is validated against
//!    `PayloadSchema::json_schema` with the `jsonschema` crate.
//! 2. **Semantic**: each `VerificationRule` is evaluated in order.
//!
//! Failures from both passes are collected into one report.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use riskview_contracts::{
    error::{RiskViewError, RiskViewResult},
    record::parse_timestamp,
    verify::{PayloadSchema, VerificationFailure, VerificationReport, VerificationRuleType},
};
use riskview_core::traits::ResponseVerifier;

use crate::schemas::{HISTORY_WITHIN_TOTAL, TIMESTAMPS_PARSE};

/// A named semantic check. Returns `Some(message)` when the payload fails.
pub type CustomRuleFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

pub struct SchemaVerifier {
    custom_rules: HashMap<String, CustomRuleFn>,
}

impl SchemaVerifier {
    /// A verifier with no custom rules.
    pub fn new() -> Self {
        Self {
            custom_rules: HashMap::new(),
        }
    }

    /// A verifier with the rules the built-in schemas reference.
    pub fn with_builtin_rules() -> Self {
        let mut verifier = Self::new();
        verifier.register_rule(HISTORY_WITHIN_TOTAL, Box::new(history_within_total));
        verifier.register_rule(TIMESTAMPS_PARSE, Box::new(timestamps_parse));
        verifier
    }

    /// Register `rule` under `name`, replacing any previous one.
    pub fn register_rule(&mut self, name: impl Into<String>, rule: CustomRuleFn) {
        self.custom_rules.insert(name.into(), rule);
    }

    /// Dotted path lookup; `None` for a missing segment or JSON null.
    fn resolve_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
        path.split('.').try_fold(value, |current, segment| {
            current.get(segment).filter(|v| !v.is_null())
        })
    }

    fn structural_failures(payload: &Value, schema: &PayloadSchema) -> Vec<VerificationFailure> {
        if schema.json_schema.is_null() {
            return Vec::new();
        }
        match jsonschema::validator_for(&schema.json_schema) {
            Ok(validator) => validator
                .iter_errors(payload)
                .map(|error| VerificationFailure {
                    rule_id: "json-schema".to_string(),
                    message: format!("at '{}': {}", error.instance_path, error),
                })
                .collect(),
            Err(err) => vec![VerificationFailure {
                rule_id: "json-schema".to_string(),
                message: format!("schema document does not compile: {err}"),
            }],
        }
    }

    fn rule_failure(&self, payload: &Value, rule_type: &VerificationRuleType) -> Option<String> {
        match rule_type {
            VerificationRuleType::RequiredField { field_path } => Self::resolve_path(payload, field_path)
                .is_none()
                .then(|| format!("'{field_path}' is missing or null")),
            VerificationRuleType::AllowedValues { field_path, allowed } => {
                match Self::resolve_path(payload, field_path) {
                    None => Some(format!("'{field_path}' is missing")),
                    Some(actual) if !allowed.contains(actual) => {
                        Some(format!("'{field_path}' = {actual} is not an allowed value"))
                    }
                    Some(_) => None,
                }
            }
            VerificationRuleType::Custom { function_name } => match self.custom_rules.get(function_name) {
                Some(rule) => rule(payload),
                None => Some(format!("no rule registered as '{function_name}'")),
            },
        }
    }
}

impl Default for SchemaVerifier {
    fn default() -> Self {
        Self::with_builtin_rules()
    }
}

impl ResponseVerifier for SchemaVerifier {
    fn verify(&self, payload: &Value, schema: &PayloadSchema) -> RiskViewResult<VerificationReport> {
        let mut failures = Self::structural_failures(payload, schema);

        for rule in &schema.rules {
            debug!(rule_id = %rule.rule_id, "evaluating payload rule");
            if let Some(message) = self.rule_failure(payload, &rule.rule_type) {
                failures.push(VerificationFailure {
                    rule_id: rule.rule_id.clone(),
                    message,
                });
            }
        }

        for failure in &failures {
            warn!(
                schema_id = %schema.schema_id,
                rule_id = %failure.rule_id,
                message = %failure.message,
                "payload check failed"
            );
        }

        Ok(VerificationReport {
            passed: failures.is_empty(),
            failures,
        })
    }
}

/// Verify `payload` and turn a failing report into `MalformedPayload`.
pub fn ensure_valid(
    verifier: &dyn ResponseVerifier,
    payload: &Value,
    schema: &PayloadSchema,
) -> RiskViewResult<()> {
    let report = verifier.verify(payload, schema)?;
    if report.passed {
        Ok(())
    } else {
        Err(RiskViewError::MalformedPayload {
            reason: format!("{}: {}", schema.schema_id, report.summary()),
        })
    }
}

fn history_within_total(payload: &Value) -> Option<String> {
    let shown = payload.get("history")?.as_array()?.len() as u64;
    let total = payload.get("total_records")?.as_u64()?;
    (shown > total).then(|| format!("{shown} records returned but total_records is {total}"))
}

fn timestamps_parse(payload: &Value) -> Option<String> {
    let records = payload.get("history")?.as_array()?;
    let bad: Vec<String> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let raw = record.get("timestamp")?.as_str()?;
            parse_timestamp(raw)
                .is_none()
                .then(|| format!("history[{index}].timestamp '{raw}'"))
        })
        .collect();
    (!bad.is_empty()).then(|| format!("unparseable timestamps: {}", bad.join(", ")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use riskview_contracts::verify::{PayloadSchema, VerificationRule, VerificationRuleType};
    use riskview_core::traits::ResponseVerifier;

    use super::{ensure_valid, SchemaVerifier};
    use crate::schemas::{history_response_schema, prediction_response_schema, system_status_schema};

    fn rules_only(rules: Vec<VerificationRule>) -> PayloadSchema {
        PayloadSchema {
            schema_id: "rules-only".to_string(),
            json_schema: serde_json::Value::Null,
            rules,
        }
    }

    fn rule(id: &str, rule_type: VerificationRuleType) -> VerificationRule {
        VerificationRule {
            rule_id: id.to_string(),
            description: id.to_string(),
            rule_type,
        }
    }

    fn history(scores: &[f64], total: i64) -> serde_json::Value {
        let records: Vec<_> = scores
            .iter()
            .map(|score| {
                json!({
                    "id": "P1001",
                    "risk_score": score,
                    "timestamp": "2024-03-01T10:15:00",
                    "alert_triggered": false
                })
            })
            .collect();
        json!({ "history": records, "total_records": total })
    }

    // ── Built-in schemas ──────────────────────────────────────────────────────

    #[test]
    fn well_formed_history_passes() {
        let verifier = SchemaVerifier::with_builtin_rules();
        let report = verifier
            .verify(&history(&[0.85, 0.2], 12), &history_response_schema())
            .unwrap();
        assert!(report.passed, "unexpected failures: {}", report.summary());
    }

    #[test]
    fn out_of_range_score_is_structural_failure() {
        let verifier = SchemaVerifier::with_builtin_rules();
        let report = verifier
            .verify(&history(&[1.4], 1), &history_response_schema())
            .unwrap();
        assert!(!report.passed);
        assert!(report.failures.iter().all(|f| f.rule_id == "json-schema"));
    }

    #[test]
    fn negative_total_is_rejected() {
        let verifier = SchemaVerifier::with_builtin_rules();
        let report = verifier
            .verify(&history(&[], -1), &history_response_schema())
            .unwrap();
        assert!(!report.passed);
    }

    #[test]
    fn more_records_than_total_fails_semantic_rule() {
        let verifier = SchemaVerifier::with_builtin_rules();
        let report = verifier
            .verify(&history(&[0.1, 0.2, 0.3], 2), &history_response_schema())
            .unwrap();
        assert!(!report.passed);
        assert!(report.summary().contains("3 records returned but total_records is 2"));
    }

    #[test]
    fn garbage_timestamp_fails_semantic_rule() {
        let verifier = SchemaVerifier::with_builtin_rules();
        let mut payload = history(&[0.5], 1);
        payload["history"][0]["timestamp"] = json!("yesterday-ish");

        let report = verifier.verify(&payload, &history_response_schema()).unwrap();
        assert!(!report.passed);
        assert!(report.summary().contains("history[0].timestamp"));
    }

    #[test]
    fn prediction_and_status_schemas() {
        let verifier = SchemaVerifier::with_builtin_rules();

        let ok = json!({ "risk_score": 0.85, "alert_triggered": true, "explanation": "low SpO2" });
        assert!(verifier.verify(&ok, &prediction_response_schema()).unwrap().passed);

        let missing = json!({ "alert_triggered": true });
        assert!(!verifier.verify(&missing, &prediction_response_schema()).unwrap().passed);

        let status = json!({ "model_status": "Online", "alert_system": "Active" });
        assert!(verifier.verify(&status, &system_status_schema()).unwrap().passed);
    }

    // ── Semantic rules ────────────────────────────────────────────────────────

    #[test]
    fn required_field_resolves_dotted_paths() {
        let verifier = SchemaVerifier::new();
        let schema = rules_only(vec![rule(
            "req",
            VerificationRuleType::RequiredField { field_path: "result.risk_score".to_string() },
        )]);

        assert!(verifier.verify(&json!({ "result": { "risk_score": 0.3 } }), &schema).unwrap().passed);
        let report = verifier.verify(&json!({ "result": { "risk_score": null } }), &schema).unwrap();
        assert_eq!(report.failures[0].rule_id, "req");
    }

    #[test]
    fn allowed_values_rejects_outsiders() {
        let verifier = SchemaVerifier::new();
        let schema = rules_only(vec![rule(
            "model-status",
            VerificationRuleType::AllowedValues {
                field_path: "model_status".to_string(),
                allowed: vec![json!("Online"), json!("Offline")],
            },
        )]);

        assert!(verifier.verify(&json!({ "model_status": "Online" }), &schema).unwrap().passed);
        assert!(!verifier.verify(&json!({ "model_status": "Melting" }), &schema).unwrap().passed);
    }

    #[test]
    fn unregistered_custom_rule_fails() {
        let verifier = SchemaVerifier::new();
        let schema = rules_only(vec![rule(
            "ghost",
            VerificationRuleType::Custom { function_name: "nope".to_string() },
        )]);

        let report = verifier.verify(&json!({}), &schema).unwrap();
        assert!(!report.passed);
        assert!(report.failures[0].message.contains("nope"));
    }

    #[test]
    fn ensure_valid_maps_to_malformed_payload() {
        let verifier = SchemaVerifier::with_builtin_rules();
        let err = ensure_valid(&verifier, &json!({ "history": "nope" }), &history_response_schema())
            .unwrap_err();
        assert!(matches!(err, riskview_contracts::error::RiskViewError::MalformedPayload { .. }));
        assert!(err.to_string().contains("history-response-v1"));
    }
}
