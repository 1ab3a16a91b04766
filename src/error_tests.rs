use crate::error::*;
use std::io;

#[test]
fn test_error_display() {
    let err = SupervisorError::invalid("airplay.framerate", "must be one of 24, 30, 60");
    assert_eq!(
        err.to_string(),
        "invalid airplay.framerate: must be one of 24, 30, 60"
    );

    let err = SupervisorError::ProcessStart {
        binary: "uxplay".to_string(),
        message: "No such file or directory".to_string(),
        source: None,
    };
    assert_eq!(
        err.to_string(),
        "failed to start uxplay: No such file or directory"
    );
}

#[test]
fn test_error_is_recoverable() {
    let err = SupervisorError::CommandChannelDisconnect {
        message: "connection reset".to_string(),
    };
    assert!(err.is_recoverable());
    assert!(!err.is_fatal());

    let err = SupervisorError::invalid("airplay.name", "empty");
    assert!(!err.is_recoverable());
    assert!(err.is_config_error());
    assert!(!err.is_fatal());
}

#[test]
fn test_error_from_io() {
    let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
    let err: SupervisorError = io_err.into();

    assert!(matches!(err, SupervisorError::Io(_)));
    assert!(err.is_recoverable());
}

#[test]
fn test_error_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SupervisorError>();
}
