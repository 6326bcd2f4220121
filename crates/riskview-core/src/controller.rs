//! The query controller: async fetch orchestration with staleness control.
//!
//! Each view owns one controller. The controller owns a live `QueryState`
//! cell (a `tokio::sync::watch` channel) and is the only thing that mutates
//! it. Commitment follows one rule:
//!
//!   issue → epoch += 1 → fetch on its own task → on completion, commit only
//!   if the request's epoch is still the controller's current epoch
//!
//! Superseded requests are never cancelled; their results are dropped when
//! they arrive. Out-of-order completions therefore cannot overwrite the
//! state of a newer request, and a stale result is never surfaced as an
//! error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use riskview_contracts::{
    error::{RiskViewError, RiskViewResult},
    query::{QueryKey, QuerySettings, QueryState, QueryStatus, ViewId},
    record::{HistoryPage, HistoryQuery, TimeFilter},
};

use crate::traits::RiskApi;

/// How a dispatched fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The result was current and is now the committed data.
    Committed,
    /// The fetch was current but failed; the error is in the state and the
    /// previous data was kept.
    Failed,
    /// A newer request was issued meanwhile; the result was discarded.
    Stale,
}

/// What `request` did with a key.
#[derive(Debug)]
pub enum Dispatch {
    /// A fetch was started under `epoch`.
    Issued {
        epoch: u64,
        task: JoinHandle<Completion>,
    },
    /// The key is already loading or loaded; nothing was sent.
    Unchanged,
}

impl Dispatch {
    pub fn epoch(&self) -> Option<u64> {
        match self {
            Dispatch::Issued { epoch, .. } => Some(*epoch),
            Dispatch::Unchanged => None,
        }
    }

    /// Wait for the fetch to finish. `None` when nothing was issued or the
    /// task was aborted by runtime shutdown.
    pub async fn settled(self) -> Option<Completion> {
        match self {
            Dispatch::Issued { task, .. } => task.await.ok(),
            Dispatch::Unchanged => None,
        }
    }
}

/// Clamp `page` into `[1, max(page_count, 1)]`.
pub fn clamp_page(page: u32, page_count: u32) -> u32 {
    page.clamp(1, page_count.max(1))
}

/// Epoch bookkeeping guarded together so compare-and-commit is atomic.
#[derive(Debug, Default)]
struct Ledger {
    epoch: u64,
    /// Key whose result is in `QueryState::data`.
    committed_key: Option<QueryKey>,
}

struct ControllerInner<A> {
    view_id: ViewId,
    api: Arc<A>,
    settings: QuerySettings,
    ledger: Mutex<Ledger>,
    state: watch::Sender<QueryState>,
}

/// Fetch orchestrator for one view.
///
/// Cloning is cheap and yields a handle to the same controller.
pub struct QueryController<A: RiskApi> {
    inner: Arc<ControllerInner<A>>,
}

impl<A: RiskApi> Clone for QueryController<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: RiskApi> QueryController<A> {
    /// Create an idle controller for a freshly mounted view.
    pub fn new(api: Arc<A>, settings: QuerySettings) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        let inner = ControllerInner {
            view_id: ViewId::new(),
            api,
            settings,
            ledger: Mutex::new(Ledger::default()),
            state,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn view_id(&self) -> &ViewId {
        &self.inner.view_id
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.inner.settings
    }

    /// Snapshot of the committed state.
    pub fn state(&self) -> QueryState {
        self.inner.state.borrow().clone()
    }

    /// Observe every state change.
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.inner.state.subscribe()
    }

    /// Epoch of the most recently issued request (0 before the first).
    pub fn current_epoch(&self) -> u64 {
        self.inner.lock_ledger().epoch
    }

    /// Ask for the data behind `key`.
    ///
    /// - Invalid keys (empty patient id, page 0, page past the last page of
    ///   the committed listing) are rejected with `InvalidKey`; nothing is
    ///   sent and the state is untouched.
    /// - A key equal to the current one while loading or loaded is a no-op.
    /// - Anything else is issued under a new epoch.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn request(&self, key: QueryKey) -> RiskViewResult<Dispatch> {
        let mut ledger = self.inner.lock_ledger();
        self.inner.validate(&key, &ledger)?;

        let unchanged = {
            let state = self.inner.state.borrow();
            state.key.as_ref() == Some(&key)
                && matches!(state.status, QueryStatus::Loading | QueryStatus::Success)
        };
        if unchanged {
            debug!(
                view_id = %self.inner.view_id,
                key = %key,
                "key unchanged, request deduplicated"
            );
            return Ok(Dispatch::Unchanged);
        }

        Ok(self.issue(&mut ledger, key))
    }

    /// Issue `key` under a new epoch even if it is already loading or loaded.
    ///
    /// Validation still applies.
    pub fn force(&self, key: QueryKey) -> RiskViewResult<Dispatch> {
        let mut ledger = self.inner.lock_ledger();
        self.inner.validate(&key, &ledger)?;
        Ok(self.issue(&mut ledger, key))
    }

    /// Re-issue the current key. This backs the retry action.
    pub fn refetch(&self) -> RiskViewResult<Dispatch> {
        let key = self
            .inner
            .state
            .borrow()
            .key
            .clone()
            .ok_or_else(|| RiskViewError::InvalidKey {
                reason: "nothing has been requested yet".to_string(),
            })?;
        self.force(key)
    }

    fn issue(&self, ledger: &mut Ledger, key: QueryKey) -> Dispatch {
        ledger.epoch += 1;
        let epoch = ledger.epoch;

        self.inner.state.send_modify(|state| {
            state.status = QueryStatus::Loading;
            state.key = Some(key.clone());
            state.error = None;
        });

        info!(
            view_id = %self.inner.view_id,
            epoch,
            key = %key,
            "query dispatched"
        );

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.fetch(&key).await;
            inner.complete(epoch, key, result)
        });

        Dispatch::Issued { epoch, task }
    }
}

impl<A: RiskApi> ControllerInner<A> {
    fn lock_ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate(&self, key: &QueryKey, ledger: &Ledger) -> RiskViewResult<()> {
        let QueryKey::History { patient_id, page, .. } = key else {
            return Ok(());
        };

        let rejection = if patient_id.trim().is_empty() {
            Some("patient id is empty".to_string())
        } else if *page == 0 {
            Some("page index starts at 1".to_string())
        } else {
            // Bounds are only known for the listing whose page is committed.
            let same_listing = ledger
                .committed_key
                .as_ref()
                .is_some_and(|committed| committed.same_listing(key));
            let state = self.state.borrow();
            match &state.data {
                Some(data) if same_listing && *page > data.page_count().max(1) => Some(format!(
                    "page {} is outside 1..={}",
                    page,
                    data.page_count().max(1)
                )),
                _ => None,
            }
        };

        match rejection {
            Some(reason) => {
                warn!(
                    view_id = %self.view_id,
                    key = %key,
                    reason = %reason,
                    "query key rejected before dispatch"
                );
                Err(RiskViewError::InvalidKey { reason })
            }
            None => Ok(()),
        }
    }

    async fn fetch(&self, key: &QueryKey) -> RiskViewResult<HistoryPage> {
        let call = async {
            match key {
                QueryKey::History { patient_id, page, time_filter } => {
                    let page_size = self.settings.page_size;
                    let query = HistoryQuery {
                        patient_id: patient_id.clone(),
                        page: *page,
                        page_size,
                        time_filter: *time_filter,
                    };
                    let response = self.api.fetch_history(query).await?;
                    Ok(HistoryPage::from_response(response, *page, page_size, *time_filter))
                }
                QueryKey::Aggregate => {
                    let limit = self.settings.recent_limit;
                    let response = self.api.fetch_recent_predictions(limit).await?;
                    Ok(HistoryPage::from_response(response, 1, limit, TimeFilter::All))
                }
            }
        };

        let timeout = self.settings.fetch_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RiskViewError::Timeout { after: timeout }),
        }
    }

    fn complete(&self, epoch: u64, key: QueryKey, result: RiskViewResult<HistoryPage>) -> Completion {
        let mut ledger = self.lock_ledger();

        // Race resolution: only the most recently issued request may commit.
        if ledger.epoch != epoch {
            debug!(
                view_id = %self.view_id,
                epoch,
                current_epoch = ledger.epoch,
                key = %key,
                "discarding stale result"
            );
            return Completion::Stale;
        }

        let page = match result {
            Ok(page) if page.page_index > page.page_count().max(1) => {
                Err(RiskViewError::InvalidKey {
                    reason: format!(
                        "page {} is beyond the last page ({})",
                        page.page_index,
                        page.page_count().max(1)
                    ),
                })
            }
            other => other,
        };

        match page {
            Ok(page) => {
                info!(
                    view_id = %self.view_id,
                    epoch,
                    key = %key,
                    records = page.records.len(),
                    total_records = page.total_records,
                    "query result committed"
                );
                ledger.committed_key = Some(key);
                self.state.send_modify(|state| {
                    state.status = QueryStatus::Success;
                    state.data = Some(page);
                    state.error = None;
                });
                Completion::Committed
            }
            Err(err) => {
                let message = user_message(&key, &err);
                warn!(
                    view_id = %self.view_id,
                    epoch,
                    key = %key,
                    error = %err,
                    "query failed, keeping previous data"
                );
                self.state.send_modify(|state| {
                    state.status = QueryStatus::Error;
                    state.error = Some(message);
                });
                Completion::Failed
            }
        }
    }
}

/// The inline message a view shows for a failed fetch.
fn user_message(key: &QueryKey, err: &RiskViewError) -> String {
    let detail = match err {
        RiskViewError::Transport { message } => message.clone(),
        other => other.to_string(),
    };
    match key {
        QueryKey::History { .. } => format!("Failed to fetch patient history: {detail}"),
        QueryKey::Aggregate => format!("Failed to refresh dashboard: {detail}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use riskview_contracts::{
        error::RiskViewError,
        query::{QueryKey, QuerySettings, QueryStatus},
        record::TimeFilter,
    };

    use super::{clamp_page, Completion, Dispatch, QueryController};
    use crate::testing::{tagged_response, ScriptedApi};

    fn settings() -> QuerySettings {
        QuerySettings {
            page_size: 5,
            recent_limit: 5,
            fetch_timeout: Duration::from_secs(5),
        }
    }

    fn key(page: u32) -> QueryKey {
        QueryKey::history("P1", page, TimeFilter::All)
    }

    fn controller(api: &Arc<ScriptedApi>) -> QueryController<ScriptedApi> {
        QueryController::new(Arc::clone(api), settings())
    }

    fn first_record_id(controller: &QueryController<ScriptedApi>) -> String {
        controller.state().data.expect("data committed").records[0].id.clone()
    }

    // ── Race resolution ──────────────────────────────────────────────────────

    /// k1 then k2; k2 resolves first, k1 last. Only k2 may be committed.
    #[tokio::test]
    async fn older_request_completing_last_is_discarded() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let release_k1 = api.gate_page(1);
        let release_k2 = api.gate_page(2);
        let controller = controller(&api);

        let k1 = controller.request(key(1)).unwrap();
        let k2 = controller.request(key(2)).unwrap();
        assert_eq!(k1.epoch(), Some(1));
        assert_eq!(k2.epoch(), Some(2));

        release_k2.send(Ok(tagged_response("k2", 5, 12))).unwrap();
        assert_eq!(k2.settled().await, Some(Completion::Committed));
        let committed = controller.state();

        release_k1.send(Ok(tagged_response("k1", 5, 12))).unwrap();
        assert_eq!(k1.settled().await, Some(Completion::Stale));

        // The late k1 result changed nothing at all.
        assert_eq!(controller.state(), committed);
        assert_eq!(first_record_id(&controller), "k2");
        assert_eq!(controller.state().key, Some(key(2)));
    }

    /// k1 then k2; k1 resolves first while k2 is already current.
    #[tokio::test]
    async fn older_request_completing_first_is_discarded() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let release_k1 = api.gate_page(1);
        let release_k2 = api.gate_page(2);
        let controller = controller(&api);

        let k1 = controller.request(key(1)).unwrap();
        let k2 = controller.request(key(2)).unwrap();

        release_k1.send(Ok(tagged_response("k1", 5, 12))).unwrap();
        assert_eq!(k1.settled().await, Some(Completion::Stale));

        let state = controller.state();
        assert_eq!(state.status, QueryStatus::Loading);
        assert!(state.data.is_none(), "stale data must not be committed");

        release_k2.send(Ok(tagged_response("k2", 5, 12))).unwrap();
        assert_eq!(k2.settled().await, Some(Completion::Committed));
        assert_eq!(first_record_id(&controller), "k2");
    }

    /// A stale failure is not surfaced either.
    #[tokio::test]
    async fn stale_failure_is_silent() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let release_k1 = api.gate_page(1);
        let controller = controller(&api);

        let k1 = controller.request(key(1)).unwrap();
        let k2 = controller.request(key(2)).unwrap();
        assert_eq!(k2.settled().await, Some(Completion::Committed));

        release_k1
            .send(Err(RiskViewError::Transport { message: "boom".to_string() }))
            .unwrap();
        assert_eq!(k1.settled().await, Some(Completion::Stale));

        let state = controller.state();
        assert_eq!(state.status, QueryStatus::Success);
        assert!(state.error.is_none());
    }

    // ── Idempotent re-request ────────────────────────────────────────────────

    #[tokio::test]
    async fn same_key_is_not_refetched_while_loading_or_loaded() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let release = api.gate_page(1);
        let controller = controller(&api);

        let first = controller.request(key(1)).unwrap();
        assert!(matches!(controller.request(key(1)).unwrap(), Dispatch::Unchanged));

        release.send(Ok(tagged_response("p1", 5, 12))).unwrap();
        first.settled().await;
        assert!(matches!(controller.request(key(1)).unwrap(), Dispatch::Unchanged));

        assert_eq!(api.history_call_count(), 1);
        assert_eq!(controller.current_epoch(), 1);
    }

    #[tokio::test]
    async fn same_key_is_reissued_after_an_error() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let release = api.gate_page(1);
        let controller = controller(&api);

        let first = controller.request(key(1)).unwrap();
        release
            .send(Err(RiskViewError::Transport { message: "offline".to_string() }))
            .unwrap();
        assert_eq!(first.settled().await, Some(Completion::Failed));

        let retry = controller.request(key(1)).unwrap();
        assert_eq!(retry.settled().await, Some(Completion::Committed));
        assert_eq!(api.history_call_count(), 2);
    }

    // ── Loading and failure semantics ────────────────────────────────────────

    #[tokio::test]
    async fn loading_keeps_previous_data_and_clears_error() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let controller = controller(&api);
        controller.request(key(1)).unwrap().settled().await;

        let _hold = api.gate_page(2);
        let _pending = controller.request(key(2)).unwrap();

        let state = controller.state();
        assert_eq!(state.status, QueryStatus::Loading);
        assert_eq!(state.key, Some(key(2)));
        assert_eq!(first_record_id(&controller), "page-1");
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn failure_retains_last_good_data() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let controller = controller(&api);
        controller.request(key(1)).unwrap().settled().await;

        let release = api.gate_page(2);
        let pending = controller.request(key(2)).unwrap();
        release
            .send(Err(RiskViewError::Transport { message: "502 Bad Gateway".to_string() }))
            .unwrap();
        assert_eq!(pending.settled().await, Some(Completion::Failed));

        let state = controller.state();
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to fetch patient history: 502 Bad Gateway")
        );
        assert_eq!(first_record_id(&controller), "page-1");
    }

    #[tokio::test]
    async fn slow_fetch_times_out_into_error() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let _never_released = api.gate_page(1);
        let controller = QueryController::new(
            Arc::clone(&api),
            QuerySettings {
                fetch_timeout: Duration::from_millis(50),
                ..settings()
            },
        );

        let pending = controller.request(key(1)).unwrap();
        assert_eq!(pending.settled().await, Some(Completion::Failed));

        let state = controller.state();
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to fetch patient history: request timed out after 50ms")
        );
    }

    // ── Pagination guard ─────────────────────────────────────────────────────

    /// 12 records at 5 per page is 3 pages; page 4 never reaches the network.
    #[tokio::test]
    async fn page_past_last_is_rejected_before_dispatch() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let controller = controller(&api);
        controller.request(key(1)).unwrap().settled().await;
        assert_eq!(controller.state().data.as_ref().unwrap().page_count(), 3);

        let before = controller.state();
        let err = controller.request(key(4)).unwrap_err();
        assert!(matches!(err, RiskViewError::InvalidKey { .. }));
        assert_eq!(controller.state(), before);
        assert_eq!(api.history_call_count(), 1);
        assert_eq!(controller.current_epoch(), 1);

        // The last valid page is still reachable.
        let last = controller.request(key(3)).unwrap();
        assert_eq!(last.settled().await, Some(Completion::Committed));
    }

    #[tokio::test]
    async fn page_zero_and_empty_patient_are_rejected() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let controller = controller(&api);

        assert!(matches!(
            controller.request(key(0)),
            Err(RiskViewError::InvalidKey { .. })
        ));
        assert!(matches!(
            controller.request(QueryKey::history("  ", 1, TimeFilter::All)),
            Err(RiskViewError::InvalidKey { .. })
        ));
        assert_eq!(controller.state().status, QueryStatus::Idle);
        assert_eq!(api.history_call_count(), 0);
    }

    /// Bounds of one listing do not constrain another filter.
    #[tokio::test]
    async fn bounds_apply_only_to_the_committed_listing() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let controller = controller(&api);
        controller.request(key(1)).unwrap().settled().await;

        let other_filter = QueryKey::history("P1", 4, TimeFilter::Month);
        assert!(controller.request(other_filter).is_ok());
    }

    /// A response that claims a page past its own last page is not committed.
    #[tokio::test]
    async fn response_beyond_its_page_count_is_an_error() {
        let api = Arc::new(ScriptedApi::with_total(3));
        let release = api.gate_page(2);
        let controller = controller(&api);

        let pending = controller.request(key(2)).unwrap();
        release.send(Ok(tagged_response("ghost", 0, 3))).unwrap();
        assert_eq!(pending.settled().await, Some(Completion::Failed));

        let state = controller.state();
        assert_eq!(state.status, QueryStatus::Error);
        assert!(state.data.is_none());
    }

    #[test]
    fn clamp_page_stays_in_range() {
        assert_eq!(clamp_page(4, 3), 3);
        assert_eq!(clamp_page(0, 3), 1);
        assert_eq!(clamp_page(2, 3), 2);
        assert_eq!(clamp_page(7, 0), 1);
    }

    // ── Refetch and observation ──────────────────────────────────────────────

    #[tokio::test]
    async fn refetch_reissues_current_key_with_new_epoch() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let controller = controller(&api);

        assert!(matches!(
            controller.refetch(),
            Err(RiskViewError::InvalidKey { .. })
        ));

        controller.request(key(1)).unwrap().settled().await;
        let again = controller.refetch().unwrap();
        assert_eq!(again.epoch(), Some(2));
        assert_eq!(again.settled().await, Some(Completion::Committed));
        assert_eq!(api.history_call_count(), 2);
    }

    #[tokio::test]
    async fn subscribers_observe_commit() {
        let api = Arc::new(ScriptedApi::with_total(12));
        let controller = controller(&api);
        let mut rx = controller.subscribe();

        controller.request(key(1)).unwrap();
        let state = rx
            .wait_for(|state| state.status == QueryStatus::Success)
            .await
            .unwrap()
            .clone();
        assert_eq!(state.data.unwrap().records.len(), 5);
    }
}
