//! Testing utilities
//!
//! A mock Redis server, a publisher that records everything it is given, and
//! a builder for shell scripts that stand in for the receiver binary.

pub mod mock_redis;

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::state::SessionState;
use crate::supervisor::StatePublisher;

/// Publisher that keeps every published state in memory
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<SessionState>>,
}

impl RecordingPublisher {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, oldest first
    #[must_use]
    pub fn states(&self) -> Vec<SessionState> {
        self.published
            .lock()
            .map(|states| states.clone())
            .unwrap_or_default()
    }

    /// Most recently published state
    #[must_use]
    pub fn last(&self) -> Option<SessionState> {
        self.states().pop()
    }

    /// Forget what has been recorded
    pub fn clear(&self) {
        if let Ok(mut states) = self.published.lock() {
            states.clear();
        }
    }
}

#[async_trait]
impl StatePublisher for RecordingPublisher {
    async fn publish(&self, state: &SessionState) -> Result<()> {
        if let Ok(mut states) = self.published.lock() {
            states.push(state.clone());
        }
        Ok(())
    }
}

/// Builds a `/bin/sh` script that behaves like a receiver binary
///
/// ```no_run
/// # use airplay_supervisor::testing::FakeReceiver;
/// let dir = tempfile::TempDir::new().unwrap();
/// let binary = FakeReceiver::new()
///     .record_pid(dir.path().join("pid"))
///     .print("Connection from 10.0.0.2 (iPad)")
///     .keep_running()
///     .install(dir.path(), "uxplay")
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeReceiver {
    body: String,
    tail: Option<String>,
}

impl FakeReceiver {
    /// Empty script (exits 0 immediately)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `$$` to `path`
    #[must_use]
    pub fn record_pid(mut self, path: impl AsRef<Path>) -> Self {
        let _ = writeln!(
            self.body,
            "echo $$ >> {}",
            quote(&path.as_ref().display().to_string())
        );
        self
    }

    /// Write the arguments to `path`, one per line
    #[must_use]
    pub fn record_args(mut self, path: impl AsRef<Path>) -> Self {
        let _ = writeln!(
            self.body,
            "for arg in \"$@\"; do printf '%s\\n' \"$arg\"; done > {}",
            quote(&path.as_ref().display().to_string())
        );
        self
    }

    /// Print `line` to stdout
    #[must_use]
    pub fn print(mut self, line: &str) -> Self {
        let _ = writeln!(self.body, "echo {}", quote(line));
        self
    }

    /// Print `line` to stderr
    #[must_use]
    pub fn print_stderr(mut self, line: &str) -> Self {
        let _ = writeln!(self.body, "echo {} >&2", quote(line));
        self
    }

    /// Append a raw shell line
    #[must_use]
    pub fn raw(mut self, line: &str) -> Self {
        self.body.push_str(line);
        self.body.push('\n');
        self
    }

    /// Pause for `seconds` (fractions allowed where `sleep` supports them)
    #[must_use]
    pub fn sleep(mut self, seconds: f32) -> Self {
        let _ = writeln!(self.body, "sleep {seconds}");
        self
    }

    /// Keep running until signalled
    #[must_use]
    pub fn keep_running(mut self) -> Self {
        self.tail = Some("exec sleep 300".to_string());
        self
    }

    /// Keep running and ignore SIGTERM
    #[must_use]
    pub fn ignore_sigterm(mut self) -> Self {
        self.tail = Some("trap '' TERM\nwhile :; do sleep 1; done".to_string());
        self
    }

    /// Exit with `code`
    #[must_use]
    pub fn exit(mut self, code: i32) -> Self {
        self.tail = Some(format!("exit {code}"));
        self
    }

    /// Script text
    #[must_use]
    pub fn script(&self) -> String {
        let mut script = String::from("#!/bin/sh\n");
        script.push_str(&self.body);
        if let Some(tail) = &self.tail {
            script.push_str(tail);
            script.push('\n');
        }
        script
    }

    /// Write the script as an executable `dir/name`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn install(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, self.script())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(path)
    }
}

/// Single-quote for `/bin/sh`
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Check whether `pid` still exists
#[cfg(unix)]
#[must_use]
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    i32::try_from(pid).is_ok_and(|pid| kill(Pid::from_raw(pid), None).is_ok())
}
