//! Receiver supervision
//!
//! [`Supervisor`] owns the receiver process and the session state and is the
//! only thing that touches either. [`CommandListener`] feeds it commands from
//! the pub/sub channel and a [`StatePublisher`] tells everyone else what it
//! is doing, over Redis and optionally the player's ZeroMQ bus.

mod command;
mod control;
mod listener;
mod publisher;
mod zmq;

#[cfg(test)]
mod tests;

pub use command::Command;
pub use control::{Supervisor, SupervisorHandle, SupervisorMessage};
pub use listener::{Backoff, CommandListener};
pub use publisher::{
    FanoutPublisher, STATE_EVENT_TYPE, StateEvent, StatePublisher, StorePublisher,
};
pub use zmq::{DEFAULT_SEND_TIMEOUT, ZmqPublisher};
