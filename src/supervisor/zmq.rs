//! State fan-out over ZeroMQ
//!
//! The player's viewer and websocket bridge listen on a ZeroMQ bus rather
//! than Redis. State changes go out on a PUB socket for broadcast listeners
//! and on a PUSH socket for the single consumer that queues them. Either
//! endpoint may be left unset.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use zeromq::{PubSocket, PushSocket, Socket, SocketSend, ZmqMessage};

use crate::error::{Result, SupervisorError};
use crate::state::{SessionState, SessionStatus};

use super::publisher::{STATE_EVENT_TYPE, StatePublisher};

/// Default bound on connecting and on a single send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Message shape the viewer dispatches on
#[derive(Debug, Serialize)]
struct BusEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    state: SessionStatus,
    client_name: Option<&'a str>,
}

impl<'a> From<&'a SessionState> for BusEvent<'a> {
    fn from(state: &'a SessionState) -> Self {
        Self {
            kind: STATE_EVENT_TYPE,
            state: state.status,
            client_name: state.client_name.as_deref(),
        }
    }
}

#[derive(Default)]
struct Sockets {
    publisher: Option<PubSocket>,
    pusher: Option<PushSocket>,
}

/// Publishes state on the ZeroMQ bus
///
/// Sockets connect on first use. A socket that fails to connect or send is
/// dropped and reconnected on the next state change.
pub struct ZmqPublisher {
    pub_endpoint: Option<String>,
    push_endpoint: Option<String>,
    timeout: Duration,
    sockets: Mutex<Sockets>,
}

impl ZmqPublisher {
    /// Publisher with no endpoints; add them with the `with_*` methods
    #[must_use]
    pub fn new() -> Self {
        Self {
            pub_endpoint: None,
            push_endpoint: None,
            timeout: DEFAULT_SEND_TIMEOUT,
            sockets: Mutex::new(Sockets::default()),
        }
    }

    /// Broadcast on a PUB socket connected to `endpoint`
    #[must_use]
    pub fn with_pub_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.pub_endpoint = Some(endpoint.into());
        self
    }

    /// Queue on a PUSH socket connected to `endpoint`
    #[must_use]
    pub fn with_push_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.push_endpoint = Some(endpoint.into());
        self
    }

    /// Bound connecting and each send by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether any endpoint is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.pub_endpoint.is_some() || self.push_endpoint.is_some()
    }

    async fn send_on<S>(
        slot: &mut Option<S>,
        endpoint: &str,
        payload: &str,
        timeout: Duration,
    ) -> Result<()>
    where
        S: Socket + SocketSend,
    {
        let send = async {
            if slot.is_none() {
                let mut socket = S::new();
                socket.connect(endpoint).await.map_err(zmq_error)?;
                tracing::debug!("Connected to {}", endpoint);
                *slot = Some(socket);
            }
            match slot.as_mut() {
                Some(socket) => socket
                    .send(ZmqMessage::from(payload.to_string()))
                    .await
                    .map_err(zmq_error),
                None => Err(zmq_error("socket unavailable")),
            }
        };

        let result = match tokio::time::timeout(timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(SupervisorError::Publish {
                message: format!("{endpoint} did not accept a message within {timeout:?}"),
            }),
        };
        if result.is_err() {
            *slot = None;
        }
        result
    }
}

impl Default for ZmqPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatePublisher for ZmqPublisher {
    async fn publish(&self, state: &SessionState) -> Result<()> {
        let payload = serde_json::to_string(&BusEvent::from(state)).map_err(|e| {
            SupervisorError::Publish {
                message: e.to_string(),
            }
        })?;

        let mut sockets = self.sockets.lock().await;
        let mut outcome = Ok(());

        if let Some(endpoint) = &self.pub_endpoint {
            let sent =
                Self::send_on(&mut sockets.publisher, endpoint, &payload, self.timeout).await;
            if let Err(e) = sent {
                outcome = Err(e);
            }
        }
        if let Some(endpoint) = &self.push_endpoint {
            let sent = Self::send_on(&mut sockets.pusher, endpoint, &payload, self.timeout).await;
            if let Err(e) = sent {
                outcome = outcome.and(Err(e));
            }
        }

        if outcome.is_ok() {
            tracing::debug!("Sent {} to the ZeroMQ bus", payload);
        }
        outcome
    }
}

fn zmq_error(err: impl std::fmt::Display) -> SupervisorError {
    SupervisorError::Publish {
        message: format!("zeromq: {err}"),
    }
}
