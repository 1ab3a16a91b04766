//! AirPlay receiver supervisor daemon
//!
//! Reads settings from Redis, launches the receiver, listens for
//! start/stop/restart commands and publishes session state until SIGTERM or
//! Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use airplay_supervisor::store::{LocalSettings, default_settings_file};
use airplay_supervisor::supervisor::Backoff;
use airplay_supervisor::{
    AudioOutput, Command, CommandListener, FanoutPublisher, RedisAddress, RedisCommandSource,
    RedisStore, Resolution, StatePublisher, StorePublisher, Supervisor, SupervisorConfig,
    SupervisorError, ZmqPublisher,
};

#[derive(Debug, Parser)]
#[command(name = "airplay-supervisor", version, about)]
struct Args {
    /// Redis server holding settings and carrying commands
    #[arg(long, env = "AIRPLAY_REDIS_URL", default_value = "redis://127.0.0.1:6379/0")]
    redis_url: RedisAddress,

    /// Receiver binary
    #[arg(long, env = "AIRPLAY_BINARY", default_value = "uxplay")]
    binary: PathBuf,

    /// Audio output: hdmi, headphones, or anything else for the default sink.
    /// Falls back to `[viewer] audio_output` in the settings file, then hdmi
    #[arg(long, env = "AUDIO_OUTPUT")]
    audio_output: Option<AudioOutput>,

    /// INI file with fallback name and audio output [default: ~/.screenly/screenly.conf]
    #[arg(long, env = "AIRPLAY_SETTINGS_FILE")]
    settings_file: Option<PathBuf>,

    /// Ignore the settings file entirely
    #[arg(long)]
    no_settings_file: bool,

    /// Fixed display resolution (WxH); detected at every launch when unset
    #[arg(long, env = "AIRPLAY_RESOLUTION")]
    resolution: Option<Resolution>,

    /// Let the receiver use hardware H.264 decoding
    #[arg(long, env = "AIRPLAY_HARDWARE_DECODE")]
    hardware_decode: bool,

    /// Seconds to wait after SIGTERM before killing the receiver
    #[arg(long, env = "AIRPLAY_STOP_TIMEOUT", default_value_t = 5)]
    stop_timeout: u64,

    /// Channel carrying start/stop/restart
    #[arg(long, env = "AIRPLAY_COMMAND_CHANNEL", default_value = "airplay_cmd")]
    command_channel: String,

    /// Channel state events are published on
    #[arg(long, env = "AIRPLAY_STATE_CHANNEL", default_value = "airplay_state")]
    state_channel: String,

    /// Milliseconds any single store or publisher call may take
    #[arg(long, env = "AIRPLAY_STORE_TIMEOUT_MS", default_value_t = 2000)]
    store_timeout_ms: u64,

    /// ZeroMQ endpoint to broadcast state on (PUB), e.g. tcp://127.0.0.1:10001
    #[arg(long, env = "AIRPLAY_ZMQ_PUB_URL")]
    zmq_pub_url: Option<String>,

    /// ZeroMQ endpoint to queue state on (PUSH), e.g. tcp://127.0.0.1:5559
    #[arg(long, env = "AIRPLAY_ZMQ_PUSH_URL")]
    zmq_push_url: Option<String>,
}

impl Args {
    fn settings_file(&self) -> Option<PathBuf> {
        if self.no_settings_file {
            return None;
        }
        self.settings_file.clone().or_else(default_settings_file)
    }

    fn supervisor_config(&self, local: Option<&LocalSettings>) -> SupervisorConfig {
        let audio_output = self
            .audio_output
            .or_else(|| {
                local
                    .and_then(|l| l.audio_output.as_deref())
                    .and_then(|value| value.parse().ok())
            })
            .unwrap_or(AudioOutput::Hdmi);

        let mut builder = SupervisorConfig::builder()
            .binary(self.binary.clone())
            .audio_output(audio_output)
            .software_decode(!self.hardware_decode)
            .stop_timeout(Duration::from_secs(self.stop_timeout))
            .store_timeout(Duration::from_millis(self.store_timeout_ms))
            .command_channel(self.command_channel.clone())
            .state_channel(self.state_channel.clone());
        builder = match self.settings_file() {
            Some(path) => builder.settings_file(path),
            None => builder.without_settings_file(),
        };
        if let Some(resolution) = self.resolution {
            builder = builder.resolution(resolution);
        }
        builder.build()
    }
}

#[tokio::main]
async fn main() -> Result<(), SupervisorError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let local = match args.settings_file() {
        Some(path) => LocalSettings::load(&path).await,
        None => None,
    };
    let config = args.supervisor_config(local.as_ref());

    tracing::info!(
        "airplay-supervisor {} using {}",
        airplay_supervisor::VERSION,
        args.redis_url
    );

    let store =
        Arc::new(RedisStore::new(args.redis_url.clone()).with_timeout(config.store_timeout));
    let publisher = state_publisher(&args, &config, store.clone());
    let backoff = Backoff::new(config.reconnect_initial, config.reconnect_max);
    let command_channel = config.command_channel.clone();
    let store_timeout = config.store_timeout;

    let supervisor = Supervisor::new(config, store, publisher);
    let handle = supervisor.handle();
    let supervisor_task = tokio::spawn(supervisor.run());

    let cancel = CancellationToken::new();
    let listener = CommandListener::new(
        Arc::new(RedisCommandSource::new(args.redis_url).with_timeout(store_timeout)),
        command_channel,
        handle.clone(),
        backoff,
    );
    let listener_task = tokio::spawn(listener.run(cancel.clone()));

    // Bring the receiver up with whatever is stored right now
    handle.send_command(Command::Start).await?;

    wait_for_signal().await;
    tracing::info!("Shutdown requested");

    cancel.cancel();
    let _ = listener_task.await;

    handle.shutdown().await?;
    if let Err(e) = supervisor_task.await {
        tracing::error!("Supervisor task failed: {}", e);
    }

    Ok(())
}

/// Redis channel and keys, plus the ZeroMQ bus when an endpoint is given
fn state_publisher(
    args: &Args,
    config: &SupervisorConfig,
    store: Arc<RedisStore>,
) -> Arc<dyn StatePublisher> {
    let redis = Arc::new(StorePublisher::new(store, config.state_channel.clone()));

    let mut zmq = ZmqPublisher::new().with_timeout(config.store_timeout);
    if let Some(url) = &args.zmq_pub_url {
        zmq = zmq.with_pub_endpoint(url.clone());
    }
    if let Some(url) = &args.zmq_push_url {
        zmq = zmq.with_push_endpoint(url.clone());
    }
    if !zmq.is_configured() {
        return redis;
    }

    tracing::info!("Also publishing state on the ZeroMQ bus");
    Arc::new(FanoutPublisher::new().with(redis).with(Arc::new(zmq)))
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
