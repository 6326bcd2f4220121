//! # riskview-verify
//!
//! Boundary validation for prediction-service payloads.
//!
//! [`engine::SchemaVerifier`] implements [`riskview_core::traits::ResponseVerifier`].
//! Raw JSON bodies are checked against a [`PayloadSchema`] (JSON Schema plus
//! semantic rules) before anything decodes them; [`schemas`] holds the
//! built-in schemas for each endpoint.
//!
//! ```rust,ignore
//! use riskview_verify::{ensure_valid, schemas, SchemaVerifier};
//!
//! let verifier = SchemaVerifier::with_builtin_rules();
//! ensure_valid(&verifier, &body, &schemas::history_response_schema())?;
//! ```
//!
//! [`PayloadSchema`]: riskview_contracts::verify::PayloadSchema

pub mod engine;
pub mod schemas;

pub use engine::{ensure_valid, CustomRuleFn, SchemaVerifier};
