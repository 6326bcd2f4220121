//! Payload verification schema and report types.
//!
//! Every response body from the network collaborator is checked against a
//! `PayloadSchema` before it is decoded into typed records. Only a passing
//! `VerificationReport` lets the payload into the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything a payload is checked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadSchema {
    /// Unique identifier for this schema (e.g. "history-response-v1").
    pub schema_id: String,
    /// A JSON Schema document used for structural validation.
    pub json_schema: Value,
    /// Additional rules evaluated after structural validation.
    pub rules: Vec<VerificationRule>,
}

/// A single verification rule applied to a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRule {
    /// Unique identifier for this rule, referenced in failure reports.
    pub rule_id: String,
    pub description: String,
    pub rule_type: VerificationRuleType,
}

/// The kinds of semantic checks supported out of the box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VerificationRuleType {
    /// The field at `field_path` must be present and non-null.
    RequiredField {
        /// Dotted path, e.g. "result.risk_score".
        field_path: String,
    },

    /// The field at `field_path` must equal one of `allowed`.
    AllowedValues {
        field_path: String,
        allowed: Vec<Value>,
    },

    /// Delegate to a named function registered with the verifier.
    Custom {
        function_name: String,
    },
}

/// The result of running a `PayloadSchema` against a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// True only if all rules passed.
    pub passed: bool,
    /// Every failure collected during the run. Empty on pass.
    pub failures: Vec<VerificationFailure>,
}

impl VerificationReport {
    /// `"[rule] message; [rule] message"` for error messages and logs.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("[{}] {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A single rule failure within a `VerificationReport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub rule_id: String,
    pub message: String,
}
