//! Session state machine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mirroring session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No client, receiver idle or not running
    #[default]
    Idle,
    /// A client has opened a connection
    Connecting,
    /// A client is mirroring
    Connected,
    /// The receiver failed to start or died unexpectedly
    Error,
}

impl SessionStatus {
    /// Check if an observed transition to `next` is legal
    ///
    /// `Connecting -> Idle` is a sender giving up before the stream starts.
    /// Resets to `Idle` on process stop bypass this check.
    #[must_use]
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::{Connected, Connecting, Error, Idle};

        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Connected | Idle)
                | (Connected, Idle)
                | (_, Error)
        )
    }

    /// Is a client attached (connecting or connected)?
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Connected)
    }

    /// Lowercase wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published session state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Current status
    pub status: SessionStatus,
    /// Name of the connected client, if known
    pub client_name: Option<String>,
}

impl SessionState {
    /// `{idle, None}`
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// `{error, None}`
    #[must_use]
    pub fn error() -> Self {
        Self {
            status: SessionStatus::Error,
            client_name: None,
        }
    }

    /// `{connecting, client}`
    #[must_use]
    pub fn connecting(client_name: Option<String>) -> Self {
        Self {
            status: SessionStatus::Connecting,
            client_name,
        }
    }

    /// `{connected, client}`
    #[must_use]
    pub fn connected(client_name: Option<String>) -> Self {
        Self {
            status: SessionStatus::Connected,
            client_name,
        }
    }

    /// Check if an observed change to `next` is legal
    ///
    /// On top of the status transitions, a connecting session may learn its
    /// client's name late.
    #[must_use]
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        let renamed = self.status == SessionStatus::Connecting
            && next.status == SessionStatus::Connecting
            && next.client_name.is_some()
            && next.client_name != self.client_name;
        renamed || self.status.can_transition_to(next.status)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.client_name {
            Some(client) => write!(f, "{} ({client})", self.status),
            None => write!(f, "{}", self.status),
        }
    }
}
