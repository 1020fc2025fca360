use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// No usable response: connect failure, timeout, undecodable body.
    Transport,
    /// Non-2xx response with a server-supplied (or fallback) message.
    Application,
    /// Add of an already linked patient, or remove of one that is not linked.
    Conflict,
}

/// Every failure of the directory service, normalized. Controllers only care
/// that a call failed and what to tell the user; `kind` and `status` are kept
/// for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Transport,
            status: None,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = if status == 409 {
            RemoteErrorKind::Conflict
        } else {
            RemoteErrorKind::Application
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::from_status(409, message)
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == RemoteErrorKind::Conflict
    }
}
