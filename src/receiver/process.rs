//! Receiver child process lifecycle

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::invocation::ReceiverInvocation;

/// How often a busy executable is retried before giving up
const SPAWN_ATTEMPTS: u32 = 3;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(50);
/// How long the output reader may drain after the child is gone
const READER_DRAIN: Duration = Duration::from_millis(200);

/// A running receiver
///
/// The child runs in its own process group so that stopping it also reaches
/// anything it forked. Its stdout and stderr are merged line by line into
/// the channel given to [`ReceiverProcess::spawn`]. Dropping the handle kills
/// the child; [`ReceiverProcess::stop`] is the orderly way out.
pub struct ReceiverProcess {
    child: Child,
    pid: Option<u32>,
    generation: u64,
    started_at: Instant,
    reader: JoinHandle<()>,
}

impl ReceiverProcess {
    /// Launch the receiver
    ///
    /// Every output line is passed through `wrap` and sent on `lines`.
    ///
    /// # Errors
    ///
    /// Returns error if the binary cannot be executed.
    pub async fn spawn<T, F>(
        invocation: &ReceiverInvocation,
        generation: u64,
        lines: mpsc::Sender<T>,
        wrap: F,
    ) -> io::Result<Self>
    where
        T: Send + 'static,
        F: Fn(String) -> T + Send + 'static,
    {
        let mut attempt = 1;
        let mut child = loop {
            match Self::command(invocation).spawn() {
                Ok(child) => break child,
                // The binary is still open for writing (e.g. mid-upgrade)
                Err(e) if is_text_busy(&e) && attempt < SPAWN_ATTEMPTS => {
                    tracing::debug!("{} is busy, retrying", invocation.program().display());
                    attempt += 1;
                    tokio::time::sleep(SPAWN_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        };

        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let reader = tokio::spawn(forward_output(stdout, stderr, lines, wrap));

        tracing::debug!("Spawned receiver pid {:?} (generation {})", pid, generation);

        Ok(Self {
            child,
            pid,
            generation,
            started_at: Instant::now(),
            reader,
        })
    }

    fn command(invocation: &ReceiverInvocation) -> Command {
        let mut std_cmd = std::process::Command::new(invocation.program());
        std_cmd.args(invocation.args());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        let mut command = Command::from(std_cmd);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// OS process id
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Launch generation this process belongs to
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time since spawn
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Wait until the child exits on its own
    ///
    /// Cancel-safe, so it can sit in a `select!` next to other work.
    ///
    /// # Errors
    ///
    /// Returns error if the exit status cannot be collected.
    pub async fn wait_for_exit(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Terminate the process group and reap the child
    ///
    /// Sends SIGTERM, waits up to `grace`, then SIGKILL. Returns once the
    /// child has been reaped and its output drained.
    ///
    /// # Errors
    ///
    /// Returns error if the exit status cannot be collected.
    pub async fn stop(mut self, grace: Duration) -> io::Result<ExitStatus> {
        let status = match self.child.try_wait()? {
            Some(status) => status,
            None => {
                self.signal_group(Signal::Terminate);
                if let Ok(status) = tokio::time::timeout(grace, self.child.wait()).await {
                    status?
                } else {
                    tracing::warn!(
                        "Receiver pid {:?} ignored SIGTERM for {:?}, killing",
                        self.pid,
                        grace
                    );
                    self.signal_group(Signal::Kill);
                    let _ = self.child.start_kill();
                    self.child.wait().await?
                }
            }
        };

        if tokio::time::timeout(READER_DRAIN, &mut self.reader)
            .await
            .is_err()
        {
            self.reader.abort();
        }

        Ok(status)
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: Signal) {
        use nix::errno::Errno;
        use nix::sys::signal::{self, killpg};
        use nix::unistd::Pid;

        let Some(pid) = self.pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        let sig = match signal {
            Signal::Terminate => signal::Signal::SIGTERM,
            Signal::Kill => signal::Signal::SIGKILL,
        };

        match killpg(Pid::from_raw(pid), sig) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => {
                tracing::warn!("killpg({}, {:?}) failed: {}, signalling child only", pid, sig, e);
                let _ = signal::kill(Pid::from_raw(pid), sig);
            }
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&mut self, _signal: Signal) {
        let _ = self.child.start_kill();
    }
}

impl std::fmt::Debug for ReceiverProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverProcess")
            .field("pid", &self.pid)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
fn is_text_busy(err: &io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::ETXTBSY as i32)
}

#[cfg(not(unix))]
fn is_text_busy(_err: &io::Error) -> bool {
    false
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

/// Merge stdout and stderr into one line stream
///
/// Both pipes are drained to EOF whatever they carry; invalid UTF-8 is
/// replaced rather than ending the stream, since closing a pipe early would
/// kill the receiver with SIGPIPE on its next write.
async fn forward_output<T, F>(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    lines: mpsc::Sender<T>,
    wrap: F,
) where
    F: Fn(String) -> T,
{
    let mut stdout = stdout.map(OutputLines::new);
    let mut stderr = stderr.map(OutputLines::new);

    while stdout.is_some() || stderr.is_some() {
        let line = tokio::select! {
            line = next_line(stdout.as_mut()), if stdout.is_some() => {
                if line.is_none() {
                    stdout = None;
                }
                line
            }
            line = next_line(stderr.as_mut()), if stderr.is_some() => {
                if line.is_none() {
                    stderr = None;
                }
                line
            }
        };

        if let Some(line) = line {
            tracing::debug!("uxplay: {}", line);
            if lines.send(wrap(line)).await.is_err() {
                break;
            }
        }
    }
}

/// Byte-oriented line reader over one pipe
struct OutputLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> OutputLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator; `None` at EOF
    ///
    /// Cancel-safe: a partially read line stays in the buffer.
    async fn next_line(&mut self) -> Option<String> {
        match self.reader.read_until(b'\n', &mut self.buf).await {
            Ok(0) if self.buf.is_empty() => None,
            Ok(_) => {
                let line = String::from_utf8_lossy(&self.buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                self.buf.clear();
                Some(line)
            }
            Err(e) => {
                tracing::debug!("Receiver output closed: {}", e);
                None
            }
        }
    }
}

async fn next_line<R: AsyncRead + Unpin>(reader: Option<&mut OutputLines<R>>) -> Option<String> {
    reader?.next_line().await
}
