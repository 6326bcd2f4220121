//! Presentation preference types.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::RiskViewError;

/// Light or dark presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    /// The literal persisted to storage.
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }

    pub fn from_prefers_dark(prefers_dark: bool) -> Self {
        if prefers_dark {
            ThemeMode::Dark
        } else {
            ThemeMode::Light
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = RiskViewError;

    /// Only the exact persisted literals are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(RiskViewError::Persistence {
                reason: format!("unrecognized theme mode '{other}'"),
            }),
        }
    }
}

/// Who decided the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceOrigin {
    /// An explicit set or toggle, or a persisted value.
    User,
    /// The OS/environment signal or the built-in default.
    System,
}

/// The process-wide presentation preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceState {
    pub mode: ThemeMode,
    pub origin: PreferenceOrigin,
}

impl PreferenceState {
    pub fn is_dark(&self) -> bool {
        self.mode == ThemeMode::Dark
    }
}

impl Default for PreferenceState {
    fn default() -> Self {
        Self {
            mode: ThemeMode::Light,
            origin: PreferenceOrigin::System,
        }
    }
}
