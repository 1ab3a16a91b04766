//! # airplay-supervisor
//!
//! Keeps an `AirPlay` mirroring receiver (`uxplay`) running on a signage
//! display in line with the settings a web UI stores in Redis.
//!
//! ## Features
//!
//! - Start, stop and restart the receiver on command
//! - Launch arguments derived from the stored name, frame rate and the
//!   attached display
//! - Session tracking (idle, connecting, connected, error) from the
//!   receiver's own log output
//! - State published over Redis pub/sub and mirrored into store keys
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use airplay_supervisor::prelude::*;
//!
//! # async fn example() -> Result<(), SupervisorError> {
//! let address: RedisAddress = "redis://127.0.0.1:6379/0".parse()?;
//! let store = Arc::new(RedisStore::new(address));
//! let publisher = Arc::new(StorePublisher::new(store.clone(), "airplay_state"));
//!
//! let supervisor = Supervisor::new(SupervisorConfig::default(), store, publisher);
//! let handle = supervisor.handle();
//! tokio::spawn(supervisor.run());
//!
//! handle.send_command(Command::Start).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Control**: [`Supervisor`] owns the receiver process and the session
//!   state and processes one message at a time
//! - **Inputs**: [`CommandListener`] and the receiver's output reader only
//!   enqueue into the supervisor
//! - **Collaborators**: settings store, command channel and state publisher
//!   sit behind traits so tests run without Redis

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Session state and events
pub mod state;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod protocol;
pub mod receiver;
pub mod store;
pub mod supervisor;

// Re-exports
pub use error::{Result, SupervisorError};
pub use state::{EventBus, SessionState, SessionStatus, SupervisorEvent};
pub use store::{RedisAddress, RedisCommandSource, RedisStore};
pub use supervisor::{
    Command, CommandListener, FanoutPublisher, StatePublisher, StorePublisher, Supervisor,
    SupervisorHandle, ZmqPublisher,
};
pub use types::{
    AudioOutput, Configuration, DeviceName, Framerate, Resolution, SupervisorConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        AudioOutput, Command, CommandListener, Configuration, DeviceName, Framerate,
        RedisAddress, RedisCommandSource, RedisStore, Resolution, SessionState, SessionStatus,
        StorePublisher, Supervisor, SupervisorConfig, SupervisorError, SupervisorEvent,
        SupervisorHandle,
    };
}

#[cfg(test)]
mod error_tests;
