//! Intent intake from the presentation layer, routed to the search and roster
//! controllers.

use std::{sync::Arc, time::Duration};

use shared::domain::{Patient, PatientId};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    notify::NotificationSink,
    remote::RemoteDirectoryClient,
    roster::{AddOutcome, RemoveOutcome, RosterController},
    search::{SearchController, DEFAULT_DEBOUNCE},
    view::{RosterView, SearchView},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    QueryChanged(String),
    RetrySearch,
    AddRequested(Patient),
    RemoveRequested(PatientId),
}

impl UserIntent {
    pub fn name(&self) -> &'static str {
        match self {
            UserIntent::QueryChanged(_) => "query_changed",
            UserIntent::RetrySearch => "retry_search",
            UserIntent::AddRequested(_) => "add_requested",
            UserIntent::RemoveRequested(_) => "remove_requested",
        }
    }
}

/// Handle to the work an intent started. Query intents finish synchronously.
pub enum IntentTicket {
    Immediate,
    Add(JoinHandle<AddOutcome>),
    Remove(JoinHandle<RemoveOutcome>),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

pub struct PatientLinkEngine {
    search: SearchController,
    roster: Arc<RosterController>,
}

impl PatientLinkEngine {
    pub fn new(
        client: Arc<dyn RemoteDirectoryClient>,
        notifier: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            search: SearchController::new(Arc::clone(&client), config.debounce),
            roster: Arc::new(RosterController::new(client, notifier)),
        }
    }

    /// Loads the linked roster; returns how many patients it holds.
    pub async fn start(&self) -> usize {
        self.roster.load_initial().await.len()
    }

    pub fn search(&self) -> &SearchController {
        &self.search
    }

    pub fn roster(&self) -> &Arc<RosterController> {
        &self.roster
    }

    /// Never blocks: roster mutations run on their own task.
    pub fn dispatch(&self, intent: UserIntent) -> IntentTicket {
        debug!(intent = intent.name(), "handling user intent");
        match intent {
            UserIntent::QueryChanged(text) => {
                self.search.set_query(text);
                IntentTicket::Immediate
            }
            UserIntent::RetrySearch => {
                self.search.retry();
                IntentTicket::Immediate
            }
            UserIntent::AddRequested(patient) => {
                let roster = Arc::clone(&self.roster);
                IntentTicket::Add(tokio::spawn(async move { roster.add(patient).await }))
            }
            UserIntent::RemoveRequested(patient_id) => {
                let roster = Arc::clone(&self.roster);
                IntentTicket::Remove(tokio::spawn(
                    async move { roster.remove(&patient_id).await },
                ))
            }
        }
    }

    pub fn search_view(&self) -> SearchView {
        SearchView::from_state(&self.search.state(), &self.roster.patients())
    }

    pub fn roster_view(&self) -> RosterView {
        RosterView::from_patients(&self.roster.patients())
    }

    pub fn shutdown(&self) {
        self.search.shutdown();
        self.roster.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
