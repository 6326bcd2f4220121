//! # riskview-core
//!
//! The client-side state and derivation engine behind the RiskView dashboard,
//! prediction form and patient history views.
//!
//! This crate provides:
//! - The collaborator traits (`RiskApi`, `PreferenceStorage`, `ResponseVerifier`)
//! - The risk classifier and chart projector (pure derivations)
//! - The `QueryController`, which commits only the freshest fetch result
//! - The `ViewAggregator` and the history / prediction view models built on it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use riskview_core::{QueryController, HistoryView};
//!
//! let controller = QueryController::new(api, settings);
//! let mut view = HistoryView::new(controller, "P1001");
//! view.load()?.settled().await;
//! let snapshot = view.snapshot();
//! ```

pub mod aggregator;
pub mod chart;
pub mod classifier;
pub mod controller;
pub mod history;
pub mod prediction;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{RefreshOutcome, ViewAggregator};
pub use classifier::classify;
pub use controller::{Completion, Dispatch, QueryController};
pub use history::{HistorySnapshot, HistoryView, ViewDisplay};
pub use prediction::{PredictionForm, PredictionPanel, Vital};
