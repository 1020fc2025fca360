//! Client-side engine for searching the patient directory and keeping the
//! clinician's linked-patient roster in sync with it.

pub mod engine;
pub mod error;
pub mod notify;
pub mod remote;
pub mod roster;
pub mod search;
pub mod timer;
pub mod view;

pub use engine::{EngineConfig, IntentTicket, PatientLinkEngine, UserIntent};
pub use error::{RemoteError, RemoteErrorKind};
pub use notify::{
    ChannelNotificationSink, Notification, NotificationSink, Severity, TracingNotificationSink,
};
pub use remote::{DirectoryClientConfig, HttpDirectoryClient, RemoteDirectoryClient};
pub use roster::{AddOutcome, RemoveOutcome, RosterController};
pub use search::{SearchController, SearchPhase, SearchState, DEFAULT_DEBOUNCE};
pub use view::{Avatar, ResultRow, RosterRow, RosterView, SearchView};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
