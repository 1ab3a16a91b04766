mod command;

use std::sync::Arc;
use std::time::Duration;

use super::Supervisor;
use crate::store::MemoryStore;
use crate::testing::RecordingPublisher;
use crate::types::{Resolution, SupervisorConfig};

/// Supervisor over an in-memory store with a recording publisher
fn supervisor_with(
    store: MemoryStore,
    config: SupervisorConfig,
) -> (Supervisor, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::new());
    let supervisor = Supervisor::new(config, Arc::new(store), publisher.clone());
    (supervisor, publisher)
}

fn test_config() -> SupervisorConfig {
    SupervisorConfig::builder()
        .resolution(Resolution::FULL_HD)
        .startup_grace(Duration::from_millis(200))
        .stop_timeout(Duration::from_secs(2))
        .without_settings_file()
        .build()
}
