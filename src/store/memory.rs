//! In-memory settings store and pub/sub broker

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{ChannelPublisher, CommandSource, CommandStream, SettingsStore};
use crate::error::{Result, SupervisorError};

/// In-memory store (non-persistent)
///
/// Doubles as a pub/sub broker: anything published or passed to
/// [`MemoryStore::broadcast`] is delivered to every subscriber of that channel.
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    pubsub: broadcast::Sender<(String, String)>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        let (pubsub, _) = broadcast::channel(64);
        Self {
            values: Mutex::new(HashMap::new()),
            pubsub,
        }
    }

    /// Create a store pre-filled with `entries`
    #[must_use]
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.lock() {
            for (key, value) in entries {
                values.insert(key.to_string(), value.to_string());
            }
        }
        store
    }

    /// Deliver `message` on `channel` from outside, as the web UI would
    pub fn broadcast(&self, channel: &str, message: &str) -> usize {
        self.pubsub
            .send((channel.to_string(), message.to_string()))
            .unwrap_or(0)
    }

    /// Watch everything published through this store
    #[must_use]
    pub fn watch_published(&self) -> broadcast::Receiver<(String, String)> {
        self.pubsub.subscribe()
    }

    /// Number of open subscriptions and watchers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.pubsub.receiver_count()
    }

    /// Synchronous read, for assertions
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values.lock().map_err(|_| SupervisorError::Store {
            message: "memory store lock poisoned".to_string(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[async_trait]
impl ChannelPublisher for MemoryStore {
    async fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        Ok(self.broadcast(channel, message))
    }
}

#[async_trait]
impl CommandSource for MemoryStore {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn CommandStream>> {
        Ok(Box::new(MemorySubscription {
            channel: channel.to_string(),
            rx: self.pubsub.subscribe(),
        }))
    }
}

/// Subscription to one channel of a [`MemoryStore`]
pub struct MemorySubscription {
    channel: String,
    rx: broadcast::Receiver<(String, String)>,
}

#[async_trait]
impl CommandStream for MemorySubscription {
    async fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            match self.rx.recv().await {
                Ok((channel, message)) if channel == self.channel => return Ok(Some(message)),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscription to {} lagged by {} messages", self.channel, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}
