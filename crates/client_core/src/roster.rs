//! The clinician's linked-patient roster, mutated optimistically.
//!
//! Add and remove change the local roster first and confirm with the
//! directory afterwards. While a call is out, the change is recorded as a
//! [`PendingMutation`] under the patient id; a failure applies the exact
//! inverse of that record, so overlapping operations on other ids are left
//! alone.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::{Patient, PatientId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    notify::{NotificationSink, Severity},
    remote::RemoteDirectoryClient,
};

pub const ALREADY_LINKED_MESSAGE: &str = "Patient is already linked to your account";
pub const NOT_LINKED_MESSAGE: &str = "Patient is not linked to your account";
pub const ADDED_MESSAGE: &str = "Patient added successfully";
pub const REMOVED_MESSAGE: &str = "Patient removed from your list";
pub const BUSY_MESSAGE: &str = "Patient update still in progress";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyLinked,
    /// Another add/remove for the same patient has not settled yet.
    Busy,
    RolledBack { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotLinked,
    Busy,
    RolledBack { reason: String },
}

#[derive(Debug, Clone)]
enum PendingMutation {
    Insert,
    Remove { patient: Patient, index: usize },
}

#[derive(Default)]
struct RosterInner {
    patients: Vec<Patient>,
    in_flight: HashMap<PatientId, PendingMutation>,
    torn_down: bool,
}

impl RosterInner {
    fn position(&self, patient_id: &PatientId) -> Option<usize> {
        self.patients.iter().position(|p| &p.id == patient_id)
    }

    fn revert(&mut self, patient_id: &PatientId, mutation: PendingMutation) {
        match mutation {
            PendingMutation::Insert => self.patients.retain(|p| &p.id != patient_id),
            PendingMutation::Remove { patient, index } => {
                if self.position(patient_id).is_none() {
                    let index = index.min(self.patients.len());
                    self.patients.insert(index, patient);
                }
            }
        }
    }

    /// Takes the authoritative list, then re-applies whatever is still in
    /// flight so a late load does not undo an optimistic change.
    fn replace_with(&mut self, authoritative: Vec<Patient>) {
        let mut patients: Vec<Patient> = Vec::with_capacity(authoritative.len());
        for patient in authoritative {
            if !patients.iter().any(|p| p.id == patient.id) {
                patients.push(patient);
            }
        }

        for (patient_id, mutation) in &self.in_flight {
            match mutation {
                PendingMutation::Insert => {
                    let optimistic = self.patients.iter().find(|p| &p.id == patient_id);
                    if let Some(patient) = optimistic {
                        if !patients.iter().any(|p| &p.id == patient_id) {
                            patients.push(patient.clone());
                        }
                    }
                }
                PendingMutation::Remove { .. } => patients.retain(|p| &p.id != patient_id),
            }
        }

        self.patients = patients;
    }
}

pub struct RosterController {
    client: Arc<dyn RemoteDirectoryClient>,
    notifier: Arc<dyn NotificationSink>,
    inner: Mutex<RosterInner>,
    updates: watch::Sender<Vec<Patient>>,
}

impl RosterController {
    pub fn new(client: Arc<dyn RemoteDirectoryClient>, notifier: Arc<dyn NotificationSink>) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            client,
            notifier,
            inner: Mutex::new(RosterInner::default()),
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RosterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &RosterInner) {
        self.updates.send_replace(inner.patients.clone());
    }

    fn notify(&self, message: &str, severity: Severity) {
        if self.lock().torn_down {
            debug!(notification = message, "dropping notification after shutdown");
            return;
        }
        self.notifier.notify(message, severity);
    }

    pub fn patients(&self) -> Vec<Patient> {
        self.lock().patients.clone()
    }

    pub fn contains(&self, patient_id: &PatientId) -> bool {
        self.lock().position(patient_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().patients.is_empty()
    }

    pub fn is_in_flight(&self, patient_id: &PatientId) -> bool {
        self.lock().in_flight.contains_key(patient_id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Patient>> {
        self.updates.subscribe()
    }

    /// Loads the authoritative roster. A failure is reported and leaves the
    /// roster as it was (empty at startup); it is never fatal.
    pub async fn load_initial(&self) -> Vec<Patient> {
        match self.client.list_linked().await {
            Ok(patients) => {
                let mut inner = self.lock();
                inner.replace_with(patients);
                info!(count = inner.patients.len(), "loaded linked patients");
                self.publish(&inner);
                inner.patients.clone()
            }
            Err(err) => {
                warn!(kind = ?err.kind, error = %err, "failed to load linked patients");
                self.notify(
                    &format!("Failed to load your patients: {err}"),
                    Severity::Error,
                );
                self.patients()
            }
        }
    }

    pub async fn add(&self, patient: Patient) -> AddOutcome {
        {
            let mut inner = self.lock();
            // An in-flight insert already shows the patient, so this check goes first.
            if inner.in_flight.contains_key(&patient.id) {
                drop(inner);
                debug!(patient_id = %patient.id, "add skipped: operation in flight");
                self.notify(BUSY_MESSAGE, Severity::Info);
                return AddOutcome::Busy;
            }
            if inner.position(&patient.id).is_some() {
                drop(inner);
                debug!(patient_id = %patient.id, "add skipped: already linked");
                self.notify(ALREADY_LINKED_MESSAGE, Severity::Info);
                return AddOutcome::AlreadyLinked;
            }
            inner.patients.push(patient.clone());
            inner
                .in_flight
                .insert(patient.id.clone(), PendingMutation::Insert);
            self.publish(&inner);
        }

        let result = self.client.add_linked(&patient.id).await;

        let mut inner = self.lock();
        let mutation = inner.in_flight.remove(&patient.id);
        match result {
            Ok(_) => {
                drop(inner);
                info!(patient_id = %patient.id, "patient linked");
                self.notify(ADDED_MESSAGE, Severity::Info);
                AddOutcome::Added
            }
            Err(err) => {
                if let Some(mutation) = mutation {
                    inner.revert(&patient.id, mutation);
                }
                self.publish(&inner);
                drop(inner);
                warn!(patient_id = %patient.id, error = %err, "link failed; rolled back");
                self.notify(&format!("Failed to add patient: {err}"), Severity::Error);
                AddOutcome::RolledBack {
                    reason: err.message,
                }
            }
        }
    }

    pub async fn remove(&self, patient_id: &PatientId) -> RemoveOutcome {
        {
            let mut inner = self.lock();
            if inner.in_flight.contains_key(patient_id) {
                drop(inner);
                debug!(%patient_id, "remove skipped: operation in flight");
                self.notify(BUSY_MESSAGE, Severity::Info);
                return RemoveOutcome::Busy;
            }
            // Remove is only offered from the roster view, so an id missing here
            // is settled locally instead of asking the directory.
            let Some(index) = inner.position(patient_id) else {
                drop(inner);
                debug!(%patient_id, "remove skipped: not linked");
                self.notify(NOT_LINKED_MESSAGE, Severity::Info);
                return RemoveOutcome::NotLinked;
            };
            let patient = inner.patients.remove(index);
            inner
                .in_flight
                .insert(patient_id.clone(), PendingMutation::Remove { patient, index });
            self.publish(&inner);
        }

        let result = self.client.remove_linked(patient_id).await;

        let mut inner = self.lock();
        let mutation = inner.in_flight.remove(patient_id);
        match result {
            Ok(_) => {
                drop(inner);
                info!(%patient_id, "patient unlinked");
                self.notify(REMOVED_MESSAGE, Severity::Info);
                RemoveOutcome::Removed
            }
            Err(err) => {
                if let Some(mutation) = mutation {
                    inner.revert(patient_id, mutation);
                }
                self.publish(&inner);
                drop(inner);
                warn!(%patient_id, error = %err, "unlink failed; rolled back");
                self.notify(&format!("Failed to remove patient: {err}"), Severity::Error);
                RemoveOutcome::RolledBack {
                    reason: err.message,
                }
            }
        }
    }

    /// After this, settling calls still keep the roster exact but no longer
    /// notify anyone.
    pub fn shutdown(&self) {
        self.lock().torn_down = true;
    }
}

#[cfg(test)]
#[path = "tests/roster_tests.rs"]
mod tests;
