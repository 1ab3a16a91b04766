use crate::types::*;

#[test]
fn test_device_name_valid() {
    let name = DeviceName::new("Room A").unwrap();
    assert_eq!(name.as_str(), "Room A");

    let name = DeviceName::new("  Lobby Screen  ").unwrap();
    assert_eq!(name.as_str(), "Lobby Screen");

    // Multi-byte characters count once
    let name = DeviceName::new("Café über alles ☕").unwrap();
    assert_eq!(name.to_string(), "Café über alles ☕");
}

#[test]
fn test_device_name_length_limits() {
    assert!(DeviceName::new("").is_err());
    assert!(DeviceName::new("   ").is_err());
    assert!(DeviceName::new("a".repeat(32)).is_ok());
    assert!(DeviceName::new("a".repeat(33)).is_err());
    assert!(DeviceName::new("é".repeat(32)).is_ok());
}

#[test]
fn test_device_name_rejects_unsafe_characters() {
    for bad in [
        "Room;reboot",
        "$(whoami)",
        "a`b`",
        "quote\"d",
        "single'quote",
        "pipe|me",
        "amp&",
        "<tag>",
        "back\\slash",
        "line\nbreak",
        "tab\there",
        "-fs",
    ] {
        let err = DeviceName::new(bad).unwrap_err();
        assert!(err.is_config_error(), "{bad:?} should be rejected");
    }
}

#[test]
fn test_framerate_parse() {
    assert_eq!("24".parse::<Framerate>().unwrap(), Framerate::Fps24);
    assert_eq!(" 30 ".parse::<Framerate>().unwrap(), Framerate::Fps30);
    assert_eq!("60".parse::<Framerate>().unwrap(), Framerate::Fps60);

    assert!("25".parse::<Framerate>().is_err());
    assert!("0".parse::<Framerate>().is_err());
    assert!("sixty".parse::<Framerate>().is_err());
    assert!(Framerate::try_from(120).is_err());

    assert_eq!(Framerate::default(), Framerate::Fps30);
    assert_eq!(Framerate::Fps60.to_string(), "60");
}

#[test]
fn test_parse_flag() {
    for truthy in ["1", "true", "TRUE", "yes", "on", " True "] {
        assert!(parse_flag("enabled", truthy).unwrap());
    }
    for falsy in ["0", "false", "no", "off", "False"] {
        assert!(!parse_flag("enabled", falsy).unwrap());
    }
    assert!(parse_flag("enabled", "maybe").is_err());
}

#[test]
fn test_configuration_serde() {
    let cfg = Configuration::enabled(DeviceName::new("Room A").unwrap(), Framerate::Fps30);
    let json = serde_json::to_value(&cfg).unwrap();

    assert_eq!(
        json,
        serde_json::json!({"enabled": true, "name": "Room A", "framerate": 30})
    );

    let bad: Result<Configuration, _> =
        serde_json::from_value(serde_json::json!({"enabled": true, "name": "x", "framerate": 25}));
    assert!(bad.is_err());

    let bad: Result<Configuration, _> =
        serde_json::from_value(serde_json::json!({"enabled": true, "name": "", "framerate": 30}));
    assert!(bad.is_err());
}

#[test]
fn test_disabled_configuration() {
    let cfg = Configuration::disabled();
    assert!(!cfg.enabled);
    assert_eq!(cfg.name, DeviceName::default());
}

#[test]
fn test_audio_output_sink() {
    assert_eq!(
        "hdmi".parse::<AudioOutput>().unwrap().sink(),
        "alsasink device=hw:0,0"
    );
    assert_eq!(
        "Headphones".parse::<AudioOutput>().unwrap().sink(),
        "alsasink device=hw:1,0"
    );
    assert_eq!("spdif".parse::<AudioOutput>().unwrap().sink(), "alsasink");
}

#[test]
fn test_resolution_parse() {
    assert_eq!(
        "1920x1080".parse::<Resolution>().unwrap(),
        Resolution::FULL_HD
    );
    assert_eq!(
        "1280X720".parse::<Resolution>().unwrap(),
        Resolution::new(1280, 720)
    );
    assert!("1920".parse::<Resolution>().is_err());
    assert!("0x1080".parse::<Resolution>().is_err());
    assert!("wide x tall".parse::<Resolution>().is_err());
    assert_eq!(Resolution::new(3840, 2160).to_string(), "3840x2160");
}
