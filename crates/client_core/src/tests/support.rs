use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Gender, Patient, PatientId},
    protocol::Ack,
};
use tokio::sync::oneshot;

use crate::{
    error::RemoteError,
    notify::{ChannelNotificationSink, Notification},
    remote::RemoteDirectoryClient,
};

type SearchReply = Result<Vec<Patient>, RemoteError>;
type AckReply = Result<Ack, RemoteError>;

pub fn pid(id: i64) -> PatientId {
    PatientId::from(id)
}

pub fn patient(id: i64, name: &str) -> Patient {
    Patient {
        id: pid(id),
        name: name.to_string(),
        age: 30 + id as u32,
        gender: if id % 2 == 0 { Gender::Male } else { Gender::Female },
        condition: "Hypertension".into(),
        profile_photo: None,
    }
}

/// Lets the scheduler run everything that is ready, including tasks woken by
/// a gate release. Under a paused clock this costs no wall time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut seen = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        seen.push(notification);
    }
    seen
}

pub fn notification_channel() -> (
    Arc<ChannelNotificationSink>,
    tokio::sync::mpsc::UnboundedReceiver<Notification>,
) {
    let (sink, rx) = ChannelNotificationSink::new();
    (Arc::new(sink), rx)
}

/// In-memory directory with canned answers. Any call can instead be parked
/// on a gate so the test decides when (and how) it completes.
#[derive(Default)]
pub struct ScriptedDirectory {
    search_results: Mutex<HashMap<String, SearchReply>>,
    search_gates: Mutex<HashMap<String, oneshot::Receiver<SearchReply>>>,
    linked: Mutex<Option<SearchReply>>,
    add_failures: Mutex<HashMap<PatientId, RemoteError>>,
    remove_failures: Mutex<HashMap<PatientId, RemoteError>>,
    add_gates: Mutex<HashMap<PatientId, oneshot::Receiver<AckReply>>>,
    remove_gates: Mutex<HashMap<PatientId, oneshot::Receiver<AckReply>>>,
    search_calls: Mutex<Vec<String>>,
    add_calls: Mutex<Vec<PatientId>>,
    remove_calls: Mutex<Vec<PatientId>>,
    list_calls: Mutex<usize>,
}

impl ScriptedDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer_search(&self, query: &str, reply: SearchReply) {
        self.search_results
            .lock()
            .expect("lock")
            .insert(query.to_string(), reply);
    }

    pub fn gate_search(&self, query: &str) -> oneshot::Sender<SearchReply> {
        let (tx, rx) = oneshot::channel();
        self.search_gates
            .lock()
            .expect("lock")
            .insert(query.to_string(), rx);
        tx
    }

    pub fn answer_linked(&self, reply: SearchReply) {
        *self.linked.lock().expect("lock") = Some(reply);
    }

    pub fn fail_add(&self, patient_id: PatientId, err: RemoteError) {
        self.add_failures
            .lock()
            .expect("lock")
            .insert(patient_id, err);
    }

    pub fn fail_remove(&self, patient_id: PatientId, err: RemoteError) {
        self.remove_failures
            .lock()
            .expect("lock")
            .insert(patient_id, err);
    }

    pub fn gate_add(&self, patient_id: PatientId) -> oneshot::Sender<AckReply> {
        let (tx, rx) = oneshot::channel();
        self.add_gates
            .lock()
            .expect("lock")
            .insert(patient_id, rx);
        tx
    }

    pub fn gate_remove(&self, patient_id: PatientId) -> oneshot::Sender<AckReply> {
        let (tx, rx) = oneshot::channel();
        self.remove_gates
            .lock()
            .expect("lock")
            .insert(patient_id, rx);
        tx
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().expect("lock").clone()
    }

    pub fn add_calls(&self) -> Vec<PatientId> {
        self.add_calls.lock().expect("lock").clone()
    }

    pub fn remove_calls(&self) -> Vec<PatientId> {
        self.remove_calls.lock().expect("lock").clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().expect("lock")
    }
}

async fn await_gate<T>(
    gate: Option<oneshot::Receiver<Result<T, RemoteError>>>,
) -> Option<Result<T, RemoteError>> {
    match gate {
        Some(rx) => Some(
            rx.await
                .unwrap_or_else(|_| Err(RemoteError::transport("gate dropped"))),
        ),
        None => None,
    }
}

#[async_trait]
impl RemoteDirectoryClient for ScriptedDirectory {
    async fn search(&self, query: &str) -> Result<Vec<Patient>, RemoteError> {
        self.search_calls
            .lock()
            .expect("lock")
            .push(query.to_string());
        let gate = self.search_gates.lock().expect("lock").remove(query);
        if let Some(reply) = await_gate(gate).await {
            return reply;
        }
        self.search_results
            .lock()
            .expect("lock")
            .get(query)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn list_linked(&self) -> Result<Vec<Patient>, RemoteError> {
        *self.list_calls.lock().expect("lock") += 1;
        self.linked
            .lock()
            .expect("lock")
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn add_linked(&self, patient_id: &PatientId) -> Result<Ack, RemoteError> {
        self.add_calls.lock().expect("lock").push(patient_id.clone());
        let gate = self.add_gates.lock().expect("lock").remove(patient_id);
        if let Some(reply) = await_gate(gate).await {
            return reply;
        }
        match self.add_failures.lock().expect("lock").get(patient_id) {
            Some(err) => Err(err.clone()),
            None => Ok(Ack::default()),
        }
    }

    async fn remove_linked(&self, patient_id: &PatientId) -> Result<Ack, RemoteError> {
        self.remove_calls
            .lock()
            .expect("lock")
            .push(patient_id.clone());
        let gate = self.remove_gates.lock().expect("lock").remove(patient_id);
        if let Some(reply) = await_gate(gate).await {
            return reply;
        }
        match self.remove_failures.lock().expect("lock").get(patient_id) {
            Some(err) => Err(err.clone()),
            None => Ok(Ack::default()),
        }
    }
}
