//! Session markers in the receiver's log output
//!
//! The receiver has no control interface; the only way to learn that a
//! sender connected or left is to watch what it prints.

use std::sync::LazyLock;

use regex::Regex;

/// A session event recognized in one log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A sender opened a connection
    SessionOpening {
        /// Sender's device name, if printed
        client: Option<String>,
    },
    /// A sender is fully connected
    ClientConnected {
        /// Sender's device name
        client: String,
    },
    /// Mirrored video started flowing
    StreamStarted,
    /// The sender went away
    SessionClosed,
}

static SESSION_CLOSED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)connection closed|video stream stopped|client disconnected")
        .expect("static regex")
});

static CLIENT_CONNECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)client connected:\s*(?P<client>.*\S)").expect("static regex")
});

static SESSION_OPENING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)connection from\s+\S+(?:\s+\((?P<client>[^)]+)\))?").expect("static regex")
});

static STREAM_STARTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)starting video stream|mirror(?:ing)? started").expect("static regex")
});

/// Recognize a session marker
///
/// Returns `None` for every line that carries no session information.
#[must_use]
pub fn parse_line(line: &str) -> Option<LogEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if SESSION_CLOSED.is_match(line) {
        return Some(LogEvent::SessionClosed);
    }

    if let Some(caps) = CLIENT_CONNECTED.captures(line) {
        return Some(LogEvent::ClientConnected {
            client: caps["client"].trim().to_string(),
        });
    }

    if let Some(caps) = SESSION_OPENING.captures(line) {
        return Some(LogEvent::SessionOpening {
            client: caps.name("client").map(|m| m.as_str().trim().to_string()),
        });
    }

    if STREAM_STARTED.is_match(line) {
        return Some(LogEvent::StreamStarted);
    }

    None
}
