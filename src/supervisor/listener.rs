//! Command channel subscription
//!
//! Runs as its own task and only ever enqueues into the supervisor, so a slow
//! or flapping broker never blocks process control.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::command::Command;
use super::control::SupervisorHandle;
use crate::error::SupervisorError;
use crate::store::CommandSource;

/// Exponential reconnect delay
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    /// Start at `initial`, doubling up to `max`
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            next: initial,
        }
    }

    /// Delay to wait now; the following one doubles
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    /// Back to the initial delay after a successful connection
    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// Forwards commands from a pub/sub channel into the supervisor
pub struct CommandListener {
    source: Arc<dyn CommandSource>,
    channel: String,
    handle: SupervisorHandle,
    backoff: Backoff,
}

impl CommandListener {
    /// Listen on `channel` of `source`
    pub fn new(
        source: Arc<dyn CommandSource>,
        channel: impl Into<String>,
        handle: SupervisorHandle,
        backoff: Backoff,
    ) -> Self {
        Self {
            source,
            channel: channel.into(),
            handle,
            backoff,
        }
    }

    /// Run until cancelled or the supervisor goes away
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let subscribed = tokio::select! {
                () = cancel.cancelled() => return,
                result = self.source.subscribe(&self.channel) => result,
            };

            let disconnect = match subscribed {
                Ok(mut stream) => {
                    self.backoff.reset();
                    loop {
                        let message = tokio::select! {
                            () = cancel.cancelled() => return,
                            message = stream.next_message() => message,
                        };

                        match message {
                            Ok(Some(text)) => {
                                if !self.forward(&text).await {
                                    return;
                                }
                            }
                            Ok(None) => break SupervisorError::CommandChannelDisconnect {
                                message: "subscription closed".to_string(),
                            },
                            Err(e) => {
                                break SupervisorError::CommandChannelDisconnect {
                                    message: e.to_string(),
                                };
                            }
                        }
                    }
                }
                Err(e) => SupervisorError::CommandChannelDisconnect {
                    message: e.to_string(),
                },
            };

            let delay = self.backoff.next_delay();
            tracing::error!("{}; reconnecting in {:?}", disconnect, delay);

            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Returns false once the supervisor no longer accepts commands
    async fn forward(&self, text: &str) -> bool {
        let command = match text.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Ignoring message on {}: {}", self.channel, e);
                return true;
            }
        };

        tracing::info!("Received {} command", command);
        match self.handle.send_command(command).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Command listener stopping: {}", e);
                false
            }
        }
    }
}
