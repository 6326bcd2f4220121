//! # riskview-prefs
//!
//! The light/dark presentation preference shared by every RiskView view.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use riskview_prefs::{FilePreferenceStorage, PreferenceStore, terminal_prefers_dark};
//!
//! let storage = FilePreferenceStorage::new(path);
//! let store = PreferenceStore::initialize(Box::new(storage), terminal_prefers_dark());
//! store.toggle();
//! assert_eq!(store.state().origin, PreferenceOrigin::User);
//! ```

pub mod storage;
pub mod store;

pub use storage::{FilePreferenceStorage, InMemoryPreferenceStorage};
pub use store::{terminal_prefers_dark, PreferenceStore};

// ── Tests ─────────────────────────────────────────────────────────────────────
