//! The process-wide preference store.
//!
//! Initialization order is persisted value, then the system signal, then
//! light. A user action always wins over the system signal: once the user
//! has chosen a mode, system signals are ignored until the value this store
//! persisted disappears.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use riskview_contracts::preference::{PreferenceOrigin, PreferenceState, ThemeMode};
use riskview_core::traits::PreferenceStorage;

type ChangeHandler = Arc<dyn Fn(PreferenceState) + Send + Sync>;

struct StoreInner {
    storage: Box<dyn PreferenceStorage>,
    state: watch::Sender<PreferenceState>,
    /// Serializes user actions and system signals. Holds whether the
    /// current user choice is known to be in storage.
    decision: Mutex<bool>,
    handlers: Mutex<Vec<ChangeHandler>>,
}

impl StoreInner {
    fn lock_decision(&self) -> MutexGuard<'_, bool> {
        self.decision.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the presentation preference. Clones share one state.
#[derive(Clone)]
pub struct PreferenceStore {
    inner: Arc<StoreInner>,
}

impl PreferenceStore {
    /// Build the store from `storage` and the current system signal.
    ///
    /// Storage failures and unrecognized persisted values are logged and
    /// treated as "nothing persisted".
    pub fn initialize(storage: Box<dyn PreferenceStorage>, system_prefers_dark: Option<bool>) -> Self {
        let persisted = match storage.load() {
            Ok(Some(raw)) => match raw.parse::<ThemeMode>() {
                Ok(mode) => Some(mode),
                Err(err) => {
                    warn!(error = %err, "ignoring persisted preference");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "could not read persisted preference");
                None
            }
        };

        let initial = match persisted {
            Some(mode) => PreferenceState {
                mode,
                origin: PreferenceOrigin::User,
            },
            None => PreferenceState {
                mode: ThemeMode::from_prefers_dark(system_prefers_dark.unwrap_or(false)),
                origin: PreferenceOrigin::System,
            },
        };
        info!(mode = %initial.mode, origin = ?initial.origin, "preference initialized");

        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(StoreInner {
                storage,
                state,
                decision: Mutex::new(persisted.is_some()),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn state(&self) -> PreferenceState {
        *self.inner.state.borrow()
    }

    pub fn mode(&self) -> ThemeMode {
        self.state().mode
    }

    pub fn subscribe(&self) -> watch::Receiver<PreferenceState> {
        self.inner.state.subscribe()
    }

    /// Record an explicit user choice.
    ///
    /// The in-memory state changes first; a failed write is logged and the
    /// change stands.
    pub fn set_mode(&self, mode: ThemeMode) -> PreferenceState {
        let mut persisted = self.inner.lock_decision();
        self.choose(&mut persisted, mode)
    }

    /// Flip the current mode as a user action.
    pub fn toggle(&self) -> PreferenceState {
        let mut persisted = self.inner.lock_decision();
        let mode = self.mode().flipped();
        self.choose(&mut persisted, mode)
    }

    fn choose(&self, persisted: &mut bool, mode: ThemeMode) -> PreferenceState {
        let next = PreferenceState {
            mode,
            origin: PreferenceOrigin::User,
        };
        self.inner.state.send_replace(next);
        info!(mode = %mode, origin = ?next.origin, "preference set by user");

        match self.inner.storage.save(mode.as_str()) {
            Ok(()) => *persisted = true,
            Err(err) => {
                *persisted = false;
                warn!(mode = %mode, error = %err, "preference not persisted, keeping in-memory value");
            }
        }
        next
    }

    /// Feed one system dark-mode signal. Returns whether it was applied.
    ///
    /// Ignored while the user's choice stands. The choice only lapses when a
    /// value this store wrote has since disappeared from storage; a choice
    /// that never reached storage stays in force.
    pub fn apply_system_signal(&self, prefers_dark: bool) -> bool {
        let changed = {
            let mut persisted = self.inner.lock_decision();

            if self.state().origin == PreferenceOrigin::User {
                if !*persisted {
                    debug!(prefers_dark, "system signal ignored, unsaved user preference in effect");
                    return false;
                }
                match self.inner.storage.load() {
                    Ok(None) => {
                        info!("persisted preference cleared externally, following system again");
                        *persisted = false;
                    }
                    Ok(Some(_)) => {
                        debug!(prefers_dark, "system signal ignored, user preference in effect");
                        return false;
                    }
                    Err(err) => {
                        debug!(prefers_dark, error = %err, "system signal ignored, storage unreadable");
                        return false;
                    }
                }
            }

            let next = PreferenceState {
                mode: ThemeMode::from_prefers_dark(prefers_dark),
                origin: PreferenceOrigin::System,
            };
            let changed = self.inner.state.send_if_modified(|state| {
                let modified = *state != next;
                *state = next;
                modified
            });
            changed.then_some(next)
        };

        if let Some(next) = changed {
            info!(mode = %next.mode, origin = ?next.origin, "preference follows system signal");
            let handlers: Vec<ChangeHandler> = self
                .inner
                .handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for handler in handlers {
                handler(next);
            }
        }
        true
    }

    /// Register `handler` to run after each system-driven change.
    ///
    /// Handlers run with no store lock held and may call back into the
    /// store.
    pub fn on_external_change<F>(&self, handler: F)
    where
        F: Fn(PreferenceState) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    /// Forward every value published on `signal` to `apply_system_signal`.
    ///
    /// The task ends when the sender is dropped. Must be called from within a
    /// Tokio runtime.
    pub fn attach_system_signal(&self, mut signal: watch::Receiver<bool>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            while signal.changed().await.is_ok() {
                let prefers_dark = *signal.borrow_and_update();
                store.apply_system_signal(prefers_dark);
            }
            debug!("system signal source closed");
        })
    }
}

/// Best-effort dark-background probe for terminals.
///
/// Reads `COLORFGBG` (`"<fg>;<bg>"`, set by rxvt, Konsole and others). Dark
/// when the background is one of the eight dark ANSI colors other than 7.
pub fn terminal_prefers_dark() -> Option<bool> {
    std::env::var("COLORFGBG")
        .ok()
        .and_then(|value| parse_colorfgbg(&value))
}

fn parse_colorfgbg(value: &str) -> Option<bool> {
    let background: u8 = value.rsplit(';').next()?.trim().parse().ok()?;
    Some(background < 8 && background != 7)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
