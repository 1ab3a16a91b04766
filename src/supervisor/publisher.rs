//! State publication to the rest of the system

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Result, SupervisorError};
use crate::state::{SessionState, SessionStatus};
use crate::store::{ChannelPublisher, SettingsStore, keys};

/// Event type tag consumers dispatch on
pub const STATE_EVENT_TYPE: &str = "airplay_state";

/// Wire form of a state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateEvent<'a> {
    /// Always [`STATE_EVENT_TYPE`]
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// New status
    pub status: SessionStatus,
    /// Connected sender, if any
    pub client_name: Option<&'a str>,
}

impl<'a> From<&'a SessionState> for StateEvent<'a> {
    fn from(state: &'a SessionState) -> Self {
        Self {
            kind: STATE_EVENT_TYPE,
            status: state.status,
            client_name: state.client_name.as_deref(),
        }
    }
}

impl StateEvent<'_> {
    /// Encode as JSON
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Publish` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SupervisorError::Publish {
            message: e.to_string(),
        })
    }
}

/// Outbound state sink
#[async_trait]
pub trait StatePublisher: Send + Sync {
    /// Announce `state`
    ///
    /// # Errors
    ///
    /// Returns error if the state could not be delivered. Callers log and move on.
    async fn publish(&self, state: &SessionState) -> Result<()>;
}

/// Publishes on a pub/sub channel and mirrors the state into store keys
pub struct StorePublisher<S> {
    store: Arc<S>,
    channel: String,
}

impl<S> StorePublisher<S>
where
    S: SettingsStore + ChannelPublisher,
{
    /// Publish on `channel` through `store`
    pub fn new(store: Arc<S>, channel: impl Into<String>) -> Self {
        Self {
            store,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl<S> StatePublisher for StorePublisher<S>
where
    S: SettingsStore + ChannelPublisher + 'static,
{
    async fn publish(&self, state: &SessionState) -> Result<()> {
        let payload = StateEvent::from(state).to_json()?;
        let receivers = self.store.publish(&self.channel, &payload).await?;
        tracing::debug!("Published {} to {} subscriber(s)", payload, receivers);

        self.store.set(keys::STATE, state.status.as_str()).await?;
        match &state.client_name {
            Some(name) => self.store.set(keys::CLIENT, name).await?,
            None => self.store.delete(keys::CLIENT).await?,
        }
        Ok(())
    }
}

/// Sends every state to each inner publisher in turn
///
/// One failing sink does not stop the others; the first failure is returned.
#[derive(Default)]
pub struct FanoutPublisher {
    publishers: Vec<Arc<dyn StatePublisher>>,
}

impl FanoutPublisher {
    /// Empty fan-out
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with(mut self, publisher: Arc<dyn StatePublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    /// Number of sinks
    #[must_use]
    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    /// True when there are no sinks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

#[async_trait]
impl StatePublisher for FanoutPublisher {
    async fn publish(&self, state: &SessionState) -> Result<()> {
        let mut first_error = None;
        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(state).await {
                tracing::debug!("State sink failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
