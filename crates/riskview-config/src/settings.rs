//! Configuration schema.
//!
//! Every section and field is optional; a missing value takes the default
//! shown in the field docs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Root of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub api: ApiSection,
    pub history: HistorySection,
    pub dashboard: DashboardSection,
    pub preferences: PreferencesSection,
}

/// `[api]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSection {
    /// Default `"http://localhost:8000"`.
    pub base_url: String,
    /// Upper bound on one request. Default 10.
    pub timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

/// `[history]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistorySection {
    /// Records per page. Default 5.
    pub page_size: u32,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self { page_size: 5 }
    }
}

/// `[dashboard]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardSection {
    /// Predictions shown in the recent feed. Default 5.
    pub recent_limit: u32,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self { recent_limit: 5 }
    }
}

/// `[preferences]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreferencesSection {
    /// Overrides the platform location of the theme-mode file.
    pub path: Option<PathBuf>,
}
