//! Settings store and command channel access
//!
//! The web UI writes desired settings into a shared key-value store and then
//! announces the change on a pub/sub channel. Both sides are reached through
//! the traits here so the supervisor can run against Redis in production and
//! an in-memory broker in tests.

mod local;
mod memory;
mod redis;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

use crate::error::{Result, SupervisorError};
use crate::types::{Configuration, DeviceName, Framerate, parse_flag};

pub use local::{LocalSettings, default_settings_file};
pub use memory::{MemoryStore, MemorySubscription};
pub use redis::{
    RedisAddress, RedisCommandSource, RedisConnection, RedisStore, RedisSubscription,
};

/// Store keys shared with the web UI
pub mod keys {
    /// `true`/`false`: whether the receiver should run
    pub const ENABLED: &str = "airplay.enabled";
    /// Advertised device name
    pub const NAME: &str = "airplay.name";
    /// Frame rate, one of 24, 30, 60
    pub const FRAMERATE: &str = "airplay.framerate";
    /// Last published session status
    pub const STATE: &str = "airplay.state";
    /// Last published client name (absent when no client)
    pub const CLIENT: &str = "airplay.client";
}

/// Key-value access to the settings store
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a key
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be reached
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Fire-and-forget publishing on a pub/sub channel
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Publish `message` on `channel`, returning how many subscribers received it
    ///
    /// # Errors
    ///
    /// Returns error if the broker cannot be reached
    async fn publish(&self, channel: &str, message: &str) -> Result<usize>;
}

/// Something that can open a subscription to a pub/sub channel
#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Subscribe to `channel`
    ///
    /// # Errors
    ///
    /// Returns error if the subscription cannot be established
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn CommandStream>>;
}

/// An open subscription
#[async_trait]
pub trait CommandStream: Send {
    /// Wait for the next message payload
    ///
    /// Returns `Ok(None)` once the subscription has been closed.
    ///
    /// # Errors
    ///
    /// Returns error if the connection drops
    async fn next_message(&mut self) -> Result<Option<String>>;
}

/// Read the desired configuration from the store
///
/// Missing keys fall back to defaults (enabled, "Checkin Cast", 30 fps).
///
/// # Errors
///
/// Returns `SupervisorError::ConfigValidation` if a stored value is invalid,
/// or a store error if the store cannot be read.
pub async fn load_configuration(store: &dyn SettingsStore) -> Result<Configuration> {
    load_configuration_with(store, None).await
}

/// Like [`load_configuration`], but a missing name is taken from `local` first
///
/// # Errors
///
/// Returns `SupervisorError::ConfigValidation` if a stored or local value is
/// invalid, or a store error if the store cannot be read.
pub async fn load_configuration_with(
    store: &dyn SettingsStore,
    local: Option<&LocalSettings>,
) -> Result<Configuration> {
    let enabled = match store.get(keys::ENABLED).await? {
        Some(value) => parse_flag(keys::ENABLED, &value)?,
        None => true,
    };

    let local_name = local.and_then(|l| l.airplay_name.as_deref());
    let name = match (store.get(keys::NAME).await?, local_name) {
        (Some(value), _) => DeviceName::new(&value).map_err(|e| relabel(e, keys::NAME))?,
        (None, Some(value)) => {
            tracing::debug!("No name in store, using {:?} from settings file", value);
            DeviceName::new(value).map_err(|e| relabel(e, local::NAME_KEY))?
        }
        (None, None) => DeviceName::default(),
    };

    let framerate = match store.get(keys::FRAMERATE).await? {
        Some(value) => value
            .parse::<Framerate>()
            .map_err(|e| relabel(e, keys::FRAMERATE))?,
        None => Framerate::default(),
    };

    Ok(Configuration {
        enabled,
        name,
        framerate,
    })
}

/// Write a configuration back to the store (what the web UI does before `restart`)
///
/// # Errors
///
/// Returns error if the store cannot be written
pub async fn save_configuration(store: &dyn SettingsStore, cfg: &Configuration) -> Result<()> {
    store
        .set(keys::ENABLED, if cfg.enabled { "true" } else { "false" })
        .await?;
    store.set(keys::NAME, cfg.name.as_str()).await?;
    store
        .set(keys::FRAMERATE, &cfg.framerate.to_string())
        .await?;
    Ok(())
}

/// Report validation errors against the store key rather than the field name
fn relabel(err: SupervisorError, key: &str) -> SupervisorError {
    match err {
        SupervisorError::ConfigValidation { message, .. } => SupervisorError::invalid(key, message),
        other => other,
    }
}
