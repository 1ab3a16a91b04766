use std::fmt;
use std::str::FromStr;

use crate::error::SupervisorError;

/// Control command received on the command channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Re-read settings and (re)launch the receiver
    Start,
    /// Stop the receiver
    Stop,
    /// Re-read settings and relaunch the receiver
    Restart,
}

impl Command {
    /// Whether this command reads the settings store
    #[must_use]
    pub fn reloads_settings(self) -> bool {
        matches!(self, Command::Start | Command::Restart)
    }

    /// Wire form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Restart => "restart",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "restart" => Ok(Command::Restart),
            other => Err(SupervisorError::invalid(
                "command",
                format!("unknown command {other:?}"),
            )),
        }
    }
}
