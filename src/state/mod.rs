//! Session state and events

mod events;
mod session;

pub use events::{EventBus, EventFilter, SupervisorEvent};
pub use session::{SessionState, SessionStatus};
