//! Mock Redis server for testing purposes.
//!
//! Speaks just enough RESP2 for the supervisor: `PING`, `SELECT`, `GET`,
//! `SET`, `DEL`, `PUBLISH` and `SUBSCRIBE`. Published messages fan out to
//! every subscribed connection, and all connections can be dropped on demand
//! to exercise reconnect paths.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, broadcast, mpsc, watch};

use crate::protocol::resp::{RespCodec, RespValue};
use crate::store::RedisAddress;

/// Internal state of the mock server.
#[derive(Default)]
struct ServerState {
    /// Key-value data
    values: HashMap<String, String>,
    /// Every command received, in order
    commands: Vec<Vec<String>>,
}

/// A mock Redis server.
pub struct MockRedisServer {
    /// Shared server state.
    state: Arc<RwLock<ServerState>>,
    /// Pub/sub fan-out.
    pubsub: broadcast::Sender<(String, String)>,
    /// Bumped to make every open connection hang up.
    epoch: watch::Sender<u64>,
    /// Channel to signal shutdown to the accept loop.
    shutdown: Option<mpsc::Sender<()>>,
    /// The local address the server is listening on.
    address: SocketAddr,
}

impl MockRedisServer {
    /// Binds to an ephemeral port on localhost and starts accepting.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start() -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;

        let state = Arc::new(RwLock::new(ServerState::default()));
        let (pubsub, _) = broadcast::channel(64);
        let (epoch, _) = watch::channel(0u64);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let server = Self {
            state: state.clone(),
            pubsub: pubsub.clone(),
            epoch: epoch.clone(),
            shutdown: Some(shutdown_tx),
            address,
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let state = state.clone();
                                let pubsub = pubsub.clone();
                                let epoch = epoch.subscribe();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, state, pubsub, epoch).await;
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Ok(server)
    }

    /// Stops accepting new connections and drops the open ones.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(()).await;
        }
        self.disconnect_all();
    }

    /// Returns the address the server is listening on.
    #[must_use]
    pub fn address(&self) -> RedisAddress {
        RedisAddress {
            host: self.address.ip().to_string(),
            port: self.address.port(),
            db: 0,
        }
    }

    /// Reads a key.
    pub async fn value(&self, key: &str) -> Option<String> {
        self.state.read().await.values.get(key).cloned()
    }

    /// Writes a key.
    pub async fn insert(&self, key: &str, value: &str) {
        self.state
            .write()
            .await
            .values
            .insert(key.to_string(), value.to_string());
    }

    /// Publishes a message as if another client had sent `PUBLISH`.
    ///
    /// Returns the number of subscribed connections.
    pub fn publish(&self, channel: &str, message: &str) -> usize {
        self.pubsub
            .send((channel.to_string(), message.to_string()))
            .unwrap_or(0)
    }

    /// Observes everything published through the server.
    #[must_use]
    pub fn watch_published(&self) -> broadcast::Receiver<(String, String)> {
        self.pubsub.subscribe()
    }

    /// Number of connections currently subscribed (plus open watchers).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.pubsub.receiver_count()
    }

    /// Returns every command received so far.
    pub async fn commands(&self) -> Vec<Vec<String>> {
        self.state.read().await.commands.clone()
    }

    /// Hangs up every open connection.
    pub fn disconnect_all(&self) {
        self.epoch.send_modify(|e| *e += 1);
    }

    /// Handles a single client connection.
    async fn handle_connection(
        mut stream: TcpStream,
        state: Arc<RwLock<ServerState>>,
        pubsub: broadcast::Sender<(String, String)>,
        mut epoch: watch::Receiver<u64>,
    ) {
        let mut codec = RespCodec::new();
        let mut buf = vec![0u8; 4096];
        let mut subscription: Option<(String, broadcast::Receiver<(String, String)>)> = None;

        loop {
            tokio::select! {
                read = stream.read(&mut buf) => {
                    let n = match read {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    if codec.feed(&buf[..n]).is_err() {
                        break;
                    }
                    while let Ok(Some(frame)) = codec.decode() {
                        let args = command_args(&frame);
                        state.write().await.commands.push(args.clone());

                        let reply = Self::execute(&args, &state, &pubsub, &mut subscription).await;
                        if stream.write_all(&reply.encode()).await.is_err() {
                            return;
                        }
                    }
                }
                published = next_published(subscription.as_mut()) => {
                    if let Some((channel, payload)) = published {
                        let subscribed = subscription.as_ref().map(|(c, _)| c.as_str());
                        if subscribed == Some(channel.as_str()) {
                            let frame = RespValue::Array(vec![
                                RespValue::bulk("message"),
                                RespValue::bulk(&channel),
                                RespValue::bulk(&payload),
                            ]);
                            if stream.write_all(&frame.encode()).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                _ = epoch.changed() => {
                    break;
                }
            }
        }
    }

    async fn execute(
        args: &[String],
        state: &RwLock<ServerState>,
        pubsub: &broadcast::Sender<(String, String)>,
        subscription: &mut Option<(String, broadcast::Receiver<(String, String)>)>,
    ) -> RespValue {
        let name = args.first().map(|a| a.to_ascii_uppercase()).unwrap_or_default();

        match (name.as_str(), &args[1.min(args.len())..]) {
            ("PING", _) => RespValue::SimpleString("PONG".to_string()),
            ("SELECT", [_]) => RespValue::SimpleString("OK".to_string()),
            ("GET", [key]) => match state.read().await.values.get(key) {
                Some(value) => RespValue::bulk(value),
                None => RespValue::Null,
            },
            ("SET", [key, value]) => {
                state
                    .write()
                    .await
                    .values
                    .insert(key.clone(), value.clone());
                RespValue::SimpleString("OK".to_string())
            }
            ("DEL", [key]) => {
                let removed = state.write().await.values.remove(key).is_some();
                RespValue::Integer(i64::from(removed))
            }
            ("PUBLISH", [channel, message]) => {
                let receivers = pubsub
                    .send((channel.clone(), message.clone()))
                    .unwrap_or(0);
                RespValue::Integer(i64::try_from(receivers).unwrap_or(i64::MAX))
            }
            ("SUBSCRIBE", [channel]) => {
                *subscription = Some((channel.clone(), pubsub.subscribe()));
                RespValue::Array(vec![
                    RespValue::bulk("subscribe"),
                    RespValue::bulk(channel),
                    RespValue::Integer(1),
                ])
            }
            _ => RespValue::Error(format!("ERR unsupported command {args:?}")),
        }
    }
}

/// Wait for the next fan-out message; never resolves when not subscribed
async fn next_published(
    subscription: Option<&mut (String, broadcast::Receiver<(String, String)>)>,
) -> Option<(String, String)> {
    match subscription {
        Some((_, rx)) => rx.recv().await.ok(),
        None => std::future::pending().await,
    }
}

/// Flatten a command frame into its string arguments
fn command_args(frame: &RespValue) -> Vec<String> {
    match frame {
        RespValue::Array(items) => items.iter().filter_map(RespValue::as_text).collect(),
        other => other.as_text().into_iter().collect(),
    }
}

/// Accepts connections and never answers on them.
pub struct SilentServer {
    address: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl SilentServer {
    /// Binds to an ephemeral port on localhost and starts accepting.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start() -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;

        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        Ok(Self { address, task })
    }

    /// The address clients should connect to.
    #[must_use]
    pub fn address(&self) -> RedisAddress {
        RedisAddress {
            host: self.address.ip().to_string(),
            port: self.address.port(),
            db: 0,
        }
    }
}

impl Drop for SilentServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
