//! Event bus for supervisor events

use futures::Stream;
use tokio::sync::broadcast;

use super::session::SessionState;

/// Supervisor events
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    /// Published session state changed
    StateChanged {
        /// Previous state
        old: SessionState,
        /// New state
        new: SessionState,
    },

    /// A receiver process was spawned and survived its startup grace period
    ProcessStarted {
        /// OS process id
        pid: Option<u32>,
        /// Launch generation
        generation: u64,
        /// Full argument vector, binary first
        args: Vec<String>,
    },

    /// A receiver process is gone
    ProcessExited {
        /// Launch generation
        generation: u64,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Whether the supervisor asked it to stop
        requested: bool,
    },

    /// Error occurred
    Error {
        /// Error message
        message: String,
        /// Whether the next command can clear it
        recoverable: bool,
    },
}

/// Event bus for distributing events
pub struct EventBus {
    /// Broadcast sender
    tx: broadcast::Sender<SupervisorEvent>,
}

impl EventBus {
    /// Create a new event bus
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    /// Subscribe to events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    pub fn emit(&self, event: SupervisorEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    /// Subscribe as a stream, skipping over lag
    pub fn stream(&self) -> impl Stream<Item = SupervisorEvent> + Send + 'static {
        futures::stream::unfold(self.tx.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event stream lagged, {} events dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Get subscriber count
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Event filter for selective subscription
pub struct EventFilter {
    rx: broadcast::Receiver<SupervisorEvent>,
    filter: Box<dyn Fn(&SupervisorEvent) -> bool + Send>,
}

impl EventFilter {
    /// Create a filtered event receiver
    pub fn new<F>(bus: &EventBus, filter: F) -> Self
    where
        F: Fn(&SupervisorEvent) -> bool + Send + 'static,
    {
        Self {
            rx: bus.subscribe(),
            filter: Box::new(filter),
        }
    }

    /// Receive next matching event
    pub async fn recv(&mut self) -> Option<SupervisorEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Helper functions for common filters
impl EventFilter {
    /// Filter for state changes only
    #[must_use]
    pub fn state_changes(bus: &EventBus) -> Self {
        Self::new(bus, |e| matches!(e, SupervisorEvent::StateChanged { .. }))
    }

    /// Filter for process lifecycle events only
    #[must_use]
    pub fn process_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                SupervisorEvent::ProcessStarted { .. } | SupervisorEvent::ProcessExited { .. }
            )
        })
    }

    /// Filter for error events only
    #[must_use]
    pub fn error_events(bus: &EventBus) -> Self {
        Self::new(bus, |e| matches!(e, SupervisorEvent::Error { .. }))
    }
}
