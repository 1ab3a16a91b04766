use super::invocation::*;
use crate::types::{
    AudioOutput, Configuration, DeviceName, Framerate, Resolution, SupervisorConfig,
};

fn room_a() -> Configuration {
    Configuration::enabled(DeviceName::new("Room A").unwrap(), Framerate::Fps30)
}

#[test]
fn test_full_argument_vector() {
    let launch = SupervisorConfig::default();
    let invocation = ReceiverInvocation::build(&room_a(), &launch, Resolution::FULL_HD);

    assert_eq!(
        invocation.argv(),
        [
            "uxplay",
            "-n",
            "Room A",
            "-nh",
            "-s",
            "1920x1080@30",
            "-fps",
            "30",
            "-vsync",
            "no",
            "-avdec",
            "-vs",
            "kmssink",
            "-fs",
            "-reset",
            "0",
            "-as",
            "alsasink device=hw:0,0",
        ]
    );
}

#[test]
fn test_hardware_decode_and_headphones() {
    let launch = SupervisorConfig::builder()
        .binary("/opt/uxplay/bin/uxplay")
        .software_decode(false)
        .audio_output(AudioOutput::Headphones)
        .build();
    let cfg = Configuration::enabled(DeviceName::new("Lab").unwrap(), Framerate::Fps60);
    let invocation = ReceiverInvocation::build(&cfg, &launch, Resolution::new(3840, 2160));

    assert!(!invocation.args().iter().any(|a| a == "-avdec"));
    assert_eq!(invocation.flag_value("-s"), Some("3840x2160@60"));
    assert_eq!(invocation.flag_value("-fps"), Some("60"));
    assert_eq!(invocation.flag_value("-as"), Some("alsasink device=hw:1,0"));
    assert_eq!(
        invocation.program(),
        std::path::Path::new("/opt/uxplay/bin/uxplay")
    );
}

#[test]
fn test_name_is_one_argument() {
    let cfg = Configuration::enabled(
        DeviceName::new("Conference Room 2").unwrap(),
        Framerate::Fps24,
    );
    let invocation = ReceiverInvocation::build(&cfg, &SupervisorConfig::default(), Resolution::FULL_HD);

    assert_eq!(invocation.flag_value("-n"), Some("Conference Room 2"));
    assert_eq!(invocation.args()[2], "-nh");
}

#[test]
fn test_build_is_deterministic() {
    let launch = SupervisorConfig::default();
    let a = ReceiverInvocation::build(&room_a(), &launch, Resolution::FULL_HD);
    let b = ReceiverInvocation::build(&room_a(), &launch, Resolution::FULL_HD);
    assert_eq!(a, b);
}

#[test]
fn test_display_quotes_spaced_args() {
    let invocation =
        ReceiverInvocation::build(&room_a(), &SupervisorConfig::default(), Resolution::FULL_HD);
    let line = invocation.to_string();

    assert!(line.starts_with("uxplay -n \"Room A\" -nh"));
    assert!(line.ends_with("-as \"alsasink device=hw:0,0\""));
}
