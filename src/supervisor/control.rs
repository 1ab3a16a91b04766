//! The supervisor control loop
//!
//! One task owns the receiver process and the session state. Commands, log
//! lines and shutdown requests arrive on a single bounded queue and are
//! handled strictly one at a time; the same `select!` also watches the
//! current child for an exit nobody asked for.

use std::process::ExitStatus;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use super::command::Command;
use super::publisher::StatePublisher;
use crate::error::{Result, SupervisorError};
use crate::receiver::{
    LogEvent, ReceiverInvocation, ReceiverProcess, detect_resolution, parse_line,
};
use crate::state::{EventBus, SessionState, SessionStatus, SupervisorEvent};
use crate::store::{LocalSettings, SettingsStore, load_configuration_with};
use crate::types::{Configuration, Resolution, SupervisorConfig};

/// Everything the control loop reacts to
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Control command
    Command(Command),
    /// One line of receiver output, tagged with the process that wrote it
    LogLine {
        /// Launch generation of the writer
        generation: u64,
        /// The line, without its terminator
        line: String,
    },
    /// Stop the receiver and leave the loop
    Shutdown,
}

/// Cloneable way in to a running [`Supervisor`]
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<SupervisorMessage>,
}

impl SupervisorHandle {
    #[cfg(test)]
    pub(crate) fn from_sender(tx: mpsc::Sender<SupervisorMessage>) -> Self {
        Self { tx }
    }

    /// Queue a command
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::NotRunning` if the loop has exited.
    pub async fn send_command(&self, command: Command) -> Result<()> {
        self.send(SupervisorMessage::Command(command)).await
    }

    /// Ask the loop to stop the receiver and exit
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::NotRunning` if the loop has already exited.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(SupervisorMessage::Shutdown).await
    }

    /// Whether the loop has exited
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, message: SupervisorMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| SupervisorError::NotRunning)
    }
}

/// Owner of the receiver process and the published session state
pub struct Supervisor {
    config: SupervisorConfig,
    store: Arc<dyn SettingsStore>,
    publisher: Arc<dyn StatePublisher>,
    events: EventBus,
    state: SessionState,
    process: Option<ReceiverProcess>,
    generation: u64,
    tx: mpsc::Sender<SupervisorMessage>,
    rx: mpsc::Receiver<SupervisorMessage>,
}

impl Supervisor {
    /// Create a supervisor; nothing is launched until told to
    pub fn new(
        config: SupervisorConfig,
        store: Arc<dyn SettingsStore>,
        publisher: Arc<dyn StatePublisher>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            config,
            store,
            publisher,
            events: EventBus::new(),
            state: SessionState::idle(),
            process: None,
            generation: 0,
            tx,
            rx,
        }
    }

    /// Handle for queueing work from other tasks
    #[must_use]
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Subscribe to supervisor events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    /// Event bus, for filtered subscriptions
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether a receiver process is currently held
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    /// OS process id of the current receiver
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(ReceiverProcess::pid)
    }

    /// Launch generation of the current receiver
    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        self.process.as_ref().map(ReceiverProcess::generation)
    }

    /// Make the receiver match `cfg`
    ///
    /// Any running receiver is stopped and reaped first. When `cfg` is
    /// enabled a fresh receiver is launched; if it cannot be spawned or dies
    /// within the startup grace period the state goes to `error` and no
    /// process is kept.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::ProcessStart` if the receiver did not come up.
    pub async fn apply_configuration(&mut self, cfg: &Configuration) -> Result<()> {
        self.stop_process().await;
        self.reset_state().await;

        if !cfg.enabled {
            tracing::info!("AirPlay disabled, receiver not started");
            return Ok(());
        }

        let resolution = self.resolution().await;
        let invocation = ReceiverInvocation::build(cfg, &self.config, resolution);

        self.generation += 1;
        let generation = self.generation;

        tracing::info!(
            "Starting AirPlay receiver as {:?} ({}@{})",
            cfg.name.as_str(),
            resolution,
            cfg.framerate
        );
        tracing::info!("Command: {}", invocation);

        let spawned = ReceiverProcess::spawn(
            &invocation,
            generation,
            self.tx.clone(),
            move |line| SupervisorMessage::LogLine { generation, line },
        )
        .await;

        let mut process = match spawned {
            Ok(process) => process,
            Err(e) => {
                let message = e.to_string();
                return Err(self
                    .fail_start(&invocation, message, Some(Box::new(e)))
                    .await);
            }
        };

        match tokio::time::timeout(self.config.startup_grace, process.wait_for_exit()).await {
            Err(_) => {}
            Ok(Ok(status)) => {
                let message = format!("exited during startup ({status})");
                return Err(self.fail_start(&invocation, message, None).await);
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                return Err(self
                    .fail_start(&invocation, message, Some(Box::new(e)))
                    .await);
            }
        }

        let pid = process.pid();
        tracing::info!("AirPlay receiver started (pid {:?})", pid);
        self.process = Some(process);
        self.events.emit(SupervisorEvent::ProcessStarted {
            pid,
            generation,
            args: invocation.argv(),
        });

        Ok(())
    }

    /// Act on a control command
    ///
    /// `start` and `restart` re-read the settings store; `stop` does not.
    /// Invalid or unreadable settings leave the current receiver untouched.
    ///
    /// # Errors
    ///
    /// Returns the settings or start failure; the supervisor stays usable.
    pub async fn handle_command(&mut self, command: Command) -> Result<()> {
        tracing::debug!("Handling {} command", command);

        if !command.reloads_settings() {
            self.stop_process().await;
            self.reset_state().await;
            return Ok(());
        }

        let cfg = match self.load_configuration().await {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("Ignoring {} command, settings unusable: {}", command, e);
                self.events.emit(SupervisorEvent::Error {
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                return Err(e);
            }
        };

        self.apply_configuration(&cfg).await
    }

    /// Update the session state from one line of receiver output
    pub async fn observe_log_line(&mut self, line: &str) {
        let Some(event) = parse_line(line) else {
            return;
        };

        let status = self.state.status;
        match event {
            LogEvent::SessionOpening { client } => match status {
                SessionStatus::Idle => self.set_state(SessionState::connecting(client)).await,
                SessionStatus::Connecting if client.is_some() => {
                    self.set_state(SessionState::connecting(client)).await;
                }
                _ => ignored(status, line),
            },
            LogEvent::ClientConnected { client } => match status {
                SessionStatus::Idle => {
                    self.set_state(SessionState::connecting(Some(client.clone())))
                        .await;
                    self.set_state(SessionState::connected(Some(client))).await;
                }
                SessionStatus::Connecting => {
                    self.set_state(SessionState::connected(Some(client))).await;
                }
                _ => ignored(status, line),
            },
            LogEvent::StreamStarted => match status {
                SessionStatus::Connecting => {
                    let client = self.state.client_name.clone();
                    self.set_state(SessionState::connected(client)).await;
                }
                _ => ignored(status, line),
            },
            LogEvent::SessionClosed => match status {
                // Connecting: the sender gave up before the stream started
                SessionStatus::Connecting | SessionStatus::Connected => {
                    self.set_state(SessionState::idle()).await;
                }
                _ => ignored(status, line),
            },
        }
    }

    /// Stop the receiver and publish `idle`
    pub async fn shutdown(&mut self) {
        tracing::info!("Shutting down AirPlay supervisor");
        self.stop_process().await;
        self.reset_state().await;
    }

    /// Drain the queue until shutdown, then stop the receiver
    pub async fn run(mut self) {
        tracing::info!("AirPlay supervisor running");

        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    match message {
                        Some(SupervisorMessage::Command(command)) => {
                            if let Err(e) = self.handle_command(command).await {
                                tracing::error!("{} failed: {}", command, e);
                            }
                        }
                        Some(SupervisorMessage::LogLine { generation, line }) => {
                            if self.generation() == Some(generation) {
                                self.observe_log_line(&line).await;
                            } else {
                                tracing::trace!("Dropping output of generation {}", generation);
                            }
                        }
                        Some(SupervisorMessage::Shutdown) | None => break,
                    }
                }
                status = wait_current(self.process.as_mut()) => {
                    self.on_unexpected_exit(status).await;
                }
            }
        }

        self.shutdown().await;
    }

    /// Read the store, bounded so an unresponsive broker cannot stall the loop
    async fn load_configuration(&self) -> Result<Configuration> {
        let local = match &self.config.settings_file {
            Some(path) => LocalSettings::load(path).await,
            None => None,
        };

        let load = load_configuration_with(self.store.as_ref(), local.as_ref());
        tokio::time::timeout(self.config.store_timeout, load)
            .await
            .unwrap_or_else(|_| {
                Err(SupervisorError::Store {
                    message: format!(
                        "settings not readable within {:?}",
                        self.config.store_timeout
                    ),
                })
            })
    }

    async fn resolution(&self) -> Resolution {
        match self.config.resolution {
            Some(resolution) => resolution,
            None => detect_resolution().await,
        }
    }

    /// Stop and reap the current receiver, if any
    async fn stop_process(&mut self) {
        let Some(process) = self.process.take() else {
            return;
        };

        let generation = process.generation();
        tracing::info!("Stopping AirPlay receiver (pid {:?})", process.pid());

        match process.stop(self.config.stop_timeout).await {
            Ok(status) => {
                tracing::info!("AirPlay receiver stopped ({})", status);
                self.events.emit(SupervisorEvent::ProcessExited {
                    generation,
                    code: status.code(),
                    requested: true,
                });
            }
            Err(e) => tracing::warn!("Could not reap AirPlay receiver: {}", e),
        }
    }

    async fn on_unexpected_exit(&mut self, status: std::io::Result<ExitStatus>) {
        let Some(process) = self.process.take() else {
            return;
        };
        let generation = process.generation();
        let uptime = process.uptime();
        // Already reaped; this only drains the output reader
        let _ = process.stop(self.config.stop_timeout).await;

        let error = match status {
            Ok(status) => SupervisorError::ProcessCrash { status },
            Err(e) => SupervisorError::Io(e),
        };
        tracing::error!("AirPlay receiver died after {:?}: {}", uptime, error);

        let code = match &error {
            SupervisorError::ProcessCrash { status } => status.code(),
            _ => None,
        };
        self.events.emit(SupervisorEvent::ProcessExited {
            generation,
            code,
            requested: false,
        });
        self.events.emit(SupervisorEvent::Error {
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        });
        self.set_state(SessionState::error()).await;
    }

    async fn fail_start(
        &mut self,
        invocation: &ReceiverInvocation,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> SupervisorError {
        let error = SupervisorError::ProcessStart {
            binary: invocation.program().display().to_string(),
            message,
            source,
        };
        tracing::error!("{}", error);

        self.events.emit(SupervisorEvent::Error {
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        });
        self.set_state(SessionState::error()).await;
        error
    }

    /// Publish `next` if it differs from the current state
    async fn set_state(&mut self, next: SessionState) {
        if next == self.state {
            return;
        }

        let old = std::mem::replace(&mut self.state, next);
        tracing::info!("AirPlay state: {} -> {}", old, self.state);
        self.events.emit(SupervisorEvent::StateChanged {
            old,
            new: self.state.clone(),
        });
        self.publish().await;
    }

    /// Force `idle` and publish it even when nothing changed
    async fn reset_state(&mut self) {
        if self.state == SessionState::idle() {
            self.publish().await;
        } else {
            self.set_state(SessionState::idle()).await;
        }
    }

    async fn publish(&self) {
        let publish = self.publisher.publish(&self.state);
        match tokio::time::timeout(self.config.store_timeout, publish).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Could not publish AirPlay state: {}", e),
            Err(_) => tracing::warn!(
                "Publishing AirPlay state {} timed out after {:?}",
                self.state,
                self.config.store_timeout
            ),
        }
    }
}

fn ignored(status: SessionStatus, line: &str) {
    tracing::debug!("Ignoring {:?} while {}", line, status);
}

/// Resolve when the current receiver exits; pending forever without one
async fn wait_current(process: Option<&mut ReceiverProcess>) -> std::io::Result<ExitStatus> {
    match process {
        Some(process) => process.wait_for_exit().await,
        None => std::future::pending().await,
    }
}
