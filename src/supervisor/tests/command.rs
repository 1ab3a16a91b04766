use crate::supervisor::Command;

#[test]
fn test_parse_commands() {
    assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
    assert_eq!(" STOP\n".parse::<Command>().unwrap(), Command::Stop);
    assert_eq!("Restart".parse::<Command>().unwrap(), Command::Restart);
}

#[test]
fn test_parse_unknown_command() {
    let err = "reboot".parse::<Command>().unwrap_err();
    assert!(err.is_config_error());
    assert!(err.to_string().contains("reboot"));
    assert!("".parse::<Command>().is_err());
}

#[test]
fn test_command_display_and_reload() {
    assert_eq!(Command::Restart.to_string(), "restart");
    assert!(Command::Start.reloads_settings());
    assert!(Command::Restart.reloads_settings());
    assert!(!Command::Stop.reloads_settings());
}
