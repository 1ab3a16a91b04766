mod settings;

use super::*;
use std::path::PathBuf;
use std::time::Duration;

// --- config.rs tests ---

#[test]
fn test_config_defaults() {
    let config = SupervisorConfig::default();

    assert_eq!(config.binary, PathBuf::from("uxplay"));
    assert_eq!(config.audio_output, AudioOutput::Hdmi);
    assert!(config.resolution.is_none());
    assert!(config.software_decode);
    assert_eq!(config.startup_grace, Duration::from_millis(500));
    assert_eq!(config.stop_timeout, Duration::from_secs(5));
    assert_eq!(config.command_channel, "airplay_cmd");
    assert_eq!(config.state_channel, "airplay_state");
}

#[test]
fn test_config_builder() {
    let config = SupervisorConfig::builder()
        .binary("/usr/local/bin/uxplay")
        .audio_output(AudioOutput::Headphones)
        .resolution(Resolution::new(1280, 720))
        .software_decode(false)
        .stop_timeout(Duration::from_secs(2))
        .command_channel("cmd")
        .state_channel("state")
        .build();

    assert_eq!(config.binary, PathBuf::from("/usr/local/bin/uxplay"));
    assert_eq!(config.audio_output, AudioOutput::Headphones);
    assert_eq!(config.resolution, Some(Resolution::new(1280, 720)));
    assert!(!config.software_decode);
    assert_eq!(config.stop_timeout, Duration::from_secs(2));
    assert_eq!(config.command_channel, "cmd");
    assert_eq!(config.state_channel, "state");
}

#[test]
fn test_config_builder_clamps() {
    let config = SupervisorConfig::builder()
        .reconnect_backoff(Duration::from_secs(5), Duration::from_secs(1))
        .queue_capacity(0)
        .build();

    assert_eq!(config.reconnect_max, Duration::from_secs(5));
    assert_eq!(config.queue_capacity, 1);
}
