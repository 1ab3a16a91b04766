use std::path::PathBuf;
use std::time::Duration;

use super::settings::{AudioOutput, Resolution};

/// Configuration for the supervisor daemon itself
///
/// Unlike [`Configuration`](super::Configuration) these values are fixed for
/// the lifetime of the daemon and never come from the settings store.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Receiver binary to launch (default: `uxplay`, resolved via `PATH`)
    pub binary: PathBuf,

    /// Audio output for the receiver (default: HDMI)
    pub audio_output: AudioOutput,

    /// Fixed display resolution (None = auto-detect at every launch)
    pub resolution: Option<Resolution>,

    /// Pass `-avdec` to force software H.264 decoding (default: true)
    pub software_decode: bool,

    /// How long a freshly spawned receiver must stay alive to count as started (default: 500ms)
    pub startup_grace: Duration,

    /// How long to wait after SIGTERM before SIGKILL (default: 5 seconds)
    pub stop_timeout: Duration,

    /// Channel carrying start/stop/restart commands (default: `airplay_cmd`)
    pub command_channel: String,

    /// Channel state events are published on (default: `airplay_state`)
    pub state_channel: String,

    /// First reconnect delay for the command channel (default: 500ms)
    pub reconnect_initial: Duration,

    /// Upper bound on the reconnect delay (default: 30 seconds)
    pub reconnect_max: Duration,

    /// Capacity of the serialized message queue (default: 256)
    pub queue_capacity: usize,

    /// Upper bound on any single settings store or publisher call (default: 2 seconds)
    pub store_timeout: Duration,

    /// Local INI file consulted when the store has no device name
    /// (default: `~/.screenly/screenly.conf`)
    pub settings_file: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("uxplay"),
            audio_output: AudioOutput::Hdmi,
            resolution: None,
            software_decode: true,
            startup_grace: Duration::from_millis(500),
            stop_timeout: Duration::from_secs(5),
            command_channel: "airplay_cmd".to_string(),
            state_channel: "airplay_state".to_string(),
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
            queue_capacity: 256,
            store_timeout: Duration::from_secs(2),
            settings_file: crate::store::default_settings_file(),
        }
    }
}

impl SupervisorConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::default()
    }
}

/// Builder for `SupervisorConfig`
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfigBuilder {
    config: SupervisorConfig,
}

impl SupervisorConfigBuilder {
    /// Set the receiver binary
    #[must_use]
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.config.binary = binary.into();
        self
    }

    /// Set the audio output
    #[must_use]
    pub fn audio_output(mut self, output: AudioOutput) -> Self {
        self.config.audio_output = output;
        self
    }

    /// Use a fixed resolution instead of detecting one
    #[must_use]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.config.resolution = Some(resolution);
        self
    }

    /// Enable or disable forced software decoding
    #[must_use]
    pub fn software_decode(mut self, enable: bool) -> Self {
        self.config.software_decode = enable;
        self
    }

    /// Set the startup grace period
    #[must_use]
    pub fn startup_grace(mut self, grace: Duration) -> Self {
        self.config.startup_grace = grace;
        self
    }

    /// Set the SIGTERM to SIGKILL timeout
    #[must_use]
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    /// Set the command channel name
    #[must_use]
    pub fn command_channel(mut self, channel: impl Into<String>) -> Self {
        self.config.command_channel = channel.into();
        self
    }

    /// Set the state channel name
    #[must_use]
    pub fn state_channel(mut self, channel: impl Into<String>) -> Self {
        self.config.state_channel = channel.into();
        self
    }

    /// Set reconnect backoff bounds
    #[must_use]
    pub fn reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.reconnect_initial = initial;
        self.config.reconnect_max = max.max(initial);
        self
    }

    /// Set queue capacity (at least 1)
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity.max(1);
        self
    }

    /// Bound every settings store and publisher call
    #[must_use]
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.config.store_timeout = timeout;
        self
    }

    /// Read fallback settings from `path`
    #[must_use]
    pub fn settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.settings_file = Some(path.into());
        self
    }

    /// Never consult a local settings file
    #[must_use]
    pub fn without_settings_file(mut self) -> Self {
        self.config.settings_file = None;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> SupervisorConfig {
        self.config
    }
}
