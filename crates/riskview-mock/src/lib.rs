//! # riskview-mock
//!
//! An in-memory stand-in for the prediction service, plus walkthroughs of
//! the engine's behavior against it:
//!
//! 1. **Out-of-order responses**: a superseded history page is discarded.
//! 2. **Pagination guard**: a page past the end is rejected before dispatch.
//! 3. **Presentation preference**: user intent outranks the system signal.
//! 4. **Dashboard refresh**: overlapping refresh triggers collapse to one.
//!
//! All data is fictional. No network calls are made.

pub mod api;
pub mod mock_data;
pub mod scenarios;

pub use api::{GatedRiskApi, MockRiskApi};
