//! Debounced, supersession-safe patient search.
//!
//! Every query change bumps a generation counter. A dispatched request
//! remembers the generation it was issued under and its response is only
//! applied while that generation is still current, so a slow answer to an old
//! query can never overwrite a newer one.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use shared::domain::Patient;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{error::RemoteError, remote::RemoteDirectoryClient, timer::DebounceTimer};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPhase {
    #[default]
    Idle,
    Debouncing,
    InFlight,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<Patient>,
    pub pending: bool,
    pub error: Option<String>,
    pub phase: SearchPhase,
}

impl SearchState {
    pub fn is_blank(&self) -> bool {
        self.query.trim().is_empty()
    }
}

/// What happened to a response when it came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settlement {
    Applied,
    Superseded,
    TornDown,
}

struct SearchInner {
    state: SearchState,
    generation: u64,
    torn_down: bool,
    timer: DebounceTimer,
}

struct SearchShared {
    client: Arc<dyn RemoteDirectoryClient>,
    debounce: Duration,
    inner: Mutex<SearchInner>,
    updates: watch::Sender<SearchState>,
}

pub struct SearchController {
    shared: Arc<SearchShared>,
}

impl SearchController {
    pub fn new(client: Arc<dyn RemoteDirectoryClient>, debounce: Duration) -> Self {
        let (updates, _) = watch::channel(SearchState::default());
        Self {
            shared: Arc::new(SearchShared {
                client,
                debounce,
                inner: Mutex::new(SearchInner {
                    state: SearchState::default(),
                    generation: 0,
                    torn_down: false,
                    timer: DebounceTimer::new(),
                }),
                updates,
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.shared.debounce
    }

    pub fn state(&self) -> SearchState {
        self.shared.lock().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.shared.updates.subscribe()
    }

    /// Records new input text. Blank text clears everything and never reaches
    /// the network; anything else (re)starts the debounce window.
    pub fn set_query(&self, text: impl Into<String>) {
        let text = text.into();
        let mut inner = self.shared.lock();
        if inner.torn_down || inner.state.query == text {
            return;
        }

        inner.generation += 1;
        let generation = inner.generation;
        inner.timer.cancel();
        inner.state.query = text;
        inner.state.pending = false;
        inner.state.error = None;

        if inner.state.is_blank() {
            inner.state.results.clear();
            inner.state.phase = SearchPhase::Idle;
        } else {
            inner.state.phase = SearchPhase::Debouncing;
            let shared: Weak<SearchShared> = Arc::downgrade(&self.shared);
            let delay = self.shared.debounce;
            inner.timer.schedule(delay, move || {
                if let Some(shared) = shared.upgrade() {
                    shared.dispatch(generation);
                }
            });
        }

        self.shared.publish(&inner.state);
    }

    /// Re-runs the current query right away. Returns false when there is
    /// nothing to search for.
    pub fn retry(&self) -> bool {
        let generation = {
            let mut inner = self.shared.lock();
            if inner.torn_down || inner.state.is_blank() {
                return false;
            }
            inner.timer.cancel();
            inner.generation += 1;
            inner.state.error = None;
            inner.generation
        };
        self.shared.dispatch(generation);
        true
    }

    /// Teardown: no dispatch happens after this and late responses are dropped.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        if !inner.torn_down {
            inner.torn_down = true;
            if inner.timer.cancel() {
                debug!("cancelled pending search debounce on shutdown");
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().torn_down
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    #[cfg(test)]
    pub(crate) fn settle(
        &self,
        generation: u64,
        outcome: Result<Vec<Patient>, RemoteError>,
    ) -> Settlement {
        self.shared.settle(generation, outcome)
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl SearchShared {
    fn lock(&self) -> MutexGuard<'_, SearchInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SearchState) {
        self.updates.send_replace(state.clone());
    }

    fn dispatch(self: &Arc<Self>, generation: u64) {
        let query = {
            let mut inner = self.lock();
            if inner.torn_down || inner.generation != generation {
                return;
            }
            inner.state.pending = true;
            inner.state.phase = SearchPhase::InFlight;
            self.publish(&inner.state);
            inner.state.query.clone()
        };

        debug!(generation, query = %query, "dispatching patient search");
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = shared.client.search(&query).await;
            shared.settle(generation, outcome);
        });
    }

    fn settle(&self, generation: u64, outcome: Result<Vec<Patient>, RemoteError>) -> Settlement {
        let mut inner = self.lock();
        if inner.torn_down {
            debug!(generation, "search response arrived after shutdown");
            return Settlement::TornDown;
        }
        if inner.generation != generation {
            debug!(
                generation,
                current = inner.generation,
                "discarding superseded search response"
            );
            return Settlement::Superseded;
        }

        inner.state.pending = false;
        match outcome {
            Ok(results) => {
                debug!(generation, count = results.len(), "search resolved");
                inner.state.results = results;
                inner.state.error = None;
                inner.state.phase = SearchPhase::Resolved;
            }
            Err(err) => {
                warn!(generation, kind = ?err.kind, error = %err, "search failed");
                inner.state.results.clear();
                inner.state.error = Some(err.message);
                inner.state.phase = SearchPhase::Failed;
            }
        }
        self.publish(&inner.state);
        Settlement::Applied
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
