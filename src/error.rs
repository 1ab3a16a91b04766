use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that can occur while supervising the receiver
#[derive(Debug, Error)]
pub enum SupervisorError {
    // ===== Configuration Errors =====
    /// A configuration value was rejected before being applied
    #[error("invalid {field}: {message}")]
    ConfigValidation {
        /// The offending field (store key or option name)
        field: String,
        /// Why the value was rejected
        message: String,
    },

    // ===== Process Errors =====
    /// The receiver process could not be started
    #[error("failed to start {binary}: {message}")]
    ProcessStart {
        /// Receiver binary that was launched
        binary: String,
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The receiver process exited without being asked to
    #[error("receiver exited unexpectedly ({status})")]
    ProcessCrash {
        /// Exit status reported by the OS
        status: ExitStatus,
    },

    // ===== Collaborator Errors =====
    /// Lost the subscription to the command channel
    #[error("command channel disconnected: {message}")]
    CommandChannelDisconnect {
        /// Description of the failure
        message: String,
    },

    /// Settings store read or write failed
    #[error("settings store error: {message}")]
    Store {
        /// Description of the failure
        message: String,
    },

    /// Malformed reply from the settings store
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the failure
        message: String,
    },

    /// State could not be published
    #[error("publish failed: {message}")]
    Publish {
        /// Description of the failure
        message: String,
    },

    /// The supervisor loop has stopped and no longer accepts messages
    #[error("supervisor is not running")]
    NotRunning,

    // ===== I/O Errors =====
    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SupervisorError {
    /// Shorthand for a validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Check if retrying (or waiting for the next command) can clear this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProcessStart { .. }
                | Self::ProcessCrash { .. }
                | Self::CommandChannelDisconnect { .. }
                | Self::Store { .. }
                | Self::Publish { .. }
                | Self::Io(_)
        )
    }

    /// Check if this error was caused by the stored settings rather than the runtime
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigValidation { .. })
    }

    /// Nothing in the supervisor takes the host process down
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        false
    }
}

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;
