//! # riskview-config
//!
//! TOML configuration for the RiskView front ends.
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8000"
//! timeout_secs = 10
//!
//! [history]
//! page_size = 5
//!
//! [dashboard]
//! recent_limit = 5
//!
//! [preferences]
//! path = "/home/nurse/.config/riskview/theme-mode"
//! ```

pub mod settings;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info};

use riskview_contracts::{
    error::{RiskViewError, RiskViewResult},
    query::QuerySettings,
};

pub use settings::{ApiSection, AppConfig, DashboardSection, HistorySection, PreferencesSection};

impl AppConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> RiskViewResult<Self> {
        let config: AppConfig = toml::from_str(s).map_err(|e| RiskViewError::ConfigError {
            reason: format!("failed to parse configuration TOML: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the file at `path`.
    pub fn from_file(path: &Path) -> RiskViewResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RiskViewError::ConfigError {
            reason: format!("failed to read configuration file '{}': {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), base_url = %config.api.base_url, "configuration loaded");
        Ok(config)
    }

    /// Load `path` when given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> RiskViewResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                debug!("no configuration file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> RiskViewResult<()> {
        let problem = if self.api.base_url.trim().is_empty() {
            Some("api.base_url must not be empty")
        } else if self.api.timeout_secs == 0 {
            Some("api.timeout_secs must be at least 1")
        } else if self.history.page_size == 0 {
            Some("history.page_size must be at least 1")
        } else if self.dashboard.recent_limit == 0 {
            Some("dashboard.recent_limit must be at least 1")
        } else {
            None
        };
        match problem {
            Some(reason) => Err(RiskViewError::ConfigError {
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Settings for the query controllers.
    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            page_size: self.history.page_size,
            recent_limit: self.dashboard.recent_limit,
            fetch_timeout: self.timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Where the theme mode is persisted: the configured override, else
    /// `<config dir>/riskview/theme-mode`.
    pub fn preference_path(&self) -> Option<PathBuf> {
        self.preferences
            .path
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("riskview").join("theme-mode")))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
