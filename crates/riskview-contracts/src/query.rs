//! Query keys and the observable query state cell.
//!
//! A view asks its query controller for data with a `QueryKey`; the
//! controller publishes a `QueryState` that the view renders. Only the
//! controller mutates `QueryState`.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::record::{HistoryPage, TimeFilter};

/// Identifier of one view instance (and therefore one controller).
///
/// Appears in every log line the controller emits so interleaved views can
/// be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewId(pub uuid::Uuid);

impl ViewId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a view wants to see. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryKey {
    /// One page of one patient's history.
    History {
        patient_id: String,
        page: u32,
        time_filter: TimeFilter,
    },
    /// The dashboard's recent-predictions feed. Has no page or filter.
    Aggregate,
}

impl QueryKey {
    pub fn history(patient_id: impl Into<String>, page: u32, time_filter: TimeFilter) -> Self {
        QueryKey::History {
            patient_id: patient_id.into(),
            page,
            time_filter,
        }
    }

    /// True when both keys address the same patient and filter, ignoring the page.
    pub fn same_listing(&self, other: &QueryKey) -> bool {
        match (self, other) {
            (
                QueryKey::History { patient_id: a, time_filter: fa, .. },
                QueryKey::History { patient_id: b, time_filter: fb, .. },
            ) => a == b && fa == fb,
            (QueryKey::Aggregate, QueryKey::Aggregate) => true,
            _ => false,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::History { patient_id, page, time_filter } => {
                write!(f, "history({patient_id}, page {page}, {time_filter})")
            }
            QueryKey::Aggregate => f.write_str("aggregate"),
        }
    }
}

/// Lifecycle of the current query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// The committed state a view renders.
///
/// `data` survives both key changes (display continuity while loading) and
/// failed refreshes (an error never blanks a previously good view).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryState {
    pub status: QueryStatus,
    /// The key of the most recently issued request.
    pub key: Option<QueryKey>,
    pub data: Option<HistoryPage>,
    /// User-facing message, present only in `Error` status.
    pub error: Option<String>,
}

/// Tunables the controller needs from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Records per history page.
    pub page_size: u32,
    /// Records requested for the dashboard feed.
    pub recent_limit: u32,
    /// Upper bound on one collaborator call.
    pub fetch_timeout: Duration,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            recent_limit: 5,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}
