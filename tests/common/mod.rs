//! Common test utilities and fixtures
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt};

use airplay_supervisor::store::MemoryStore;
use airplay_supervisor::testing::{FakeReceiver, RecordingPublisher};
use airplay_supervisor::{
    Resolution, SessionState, Supervisor, SupervisorConfig, SupervisorEvent, SupervisorHandle,
};

static INIT: Once = Once::new();

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env()
            .add_directive("airplay_supervisor=debug".parse().unwrap());

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Supervisor config pointing at `binary`, with short timeouts
pub fn test_config(binary: &Path) -> SupervisorConfig {
    SupervisorConfig::builder()
        .binary(binary)
        .resolution(Resolution::FULL_HD)
        .startup_grace(Duration::from_millis(150))
        .stop_timeout(Duration::from_secs(2))
        .without_settings_file()
        .build()
}

/// A supervisor running in the background over an in-memory store
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub handle: SupervisorHandle,
    pub events: broadcast::Receiver<SupervisorEvent>,
    pub task: tokio::task::JoinHandle<()>,
}

impl Harness {
    /// Install `receiver` as the binary and start the loop
    pub fn start(receiver: &FakeReceiver, store: MemoryStore) -> Self {
        init_logging();

        let dir = tempfile::TempDir::new().unwrap();
        let binary = receiver.install(dir.path(), "uxplay").unwrap();
        let store = Arc::new(store);
        let publisher = Arc::new(RecordingPublisher::new());

        let supervisor = Supervisor::new(test_config(&binary), store.clone(), publisher.clone());
        let handle = supervisor.handle();
        let events = supervisor.subscribe();
        let task = tokio::spawn(supervisor.run());

        Self {
            dir,
            store,
            publisher,
            handle,
            events,
            task,
        }
    }

    /// Path inside the scratch directory
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Wait for the first event matching `pred`
    pub async fn wait_for<F>(&mut self, mut pred: F) -> SupervisorEvent
    where
        F: FnMut(&SupervisorEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match self.events.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Wait until the published state equals `state`
    pub async fn wait_for_state(&mut self, state: SessionState) {
        let wanted = state.clone();
        self.wait_for(move |e| {
            matches!(e, SupervisorEvent::StateChanged { new, .. } if *new == wanted)
        })
        .await;
    }

    /// Shut the loop down and wait for it
    pub async fn shutdown(self) -> Arc<RecordingPublisher> {
        self.handle.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("supervisor did not shut down")
            .unwrap();
        self.publisher
    }
}

/// Every pid a fake receiver recorded, oldest first
pub fn recorded_pids(path: &Path) -> Vec<u32> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}

/// Poll until `path` has at least `count` lines
pub async fn wait_for_lines(path: &Path, count: usize) {
    for _ in 0..200 {
        let lines = std::fs::read_to_string(path)
            .map(|s| s.lines().count())
            .unwrap_or(0);
        if lines >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never reached {} lines", path.display(), count);
}
