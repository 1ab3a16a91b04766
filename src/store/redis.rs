//! Redis-backed settings store and command channel

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::{ChannelPublisher, CommandSource, CommandStream, SettingsStore};
use crate::error::{Result, SupervisorError};
use crate::protocol::resp::{RespCodec, RespValue, encode_command};

/// Where to find the Redis server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisAddress {
    /// Host name or IP
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Logical database index
    pub db: u32,
}

impl Default for RedisAddress {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
        }
    }
}

impl fmt::Display for RedisAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

impl FromStr for RedisAddress {
    type Err = SupervisorError;

    /// Accepts `redis://host:port/db`, `host:port` or just `host`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| SupervisorError::invalid("redis url", format!("{s:?}: {why}"));

        let rest = s.trim();
        let rest = rest.strip_prefix("redis://").unwrap_or(rest);

        let (authority, db) = match rest.split_once('/') {
            Some((authority, "")) => (authority, 0),
            Some((authority, db)) => (
                authority,
                db.parse().map_err(|_| invalid("database must be a number"))?,
            ),
            None => (rest, 0),
        };

        let defaults = Self::default();
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse().map_err(|_| invalid("port must be a number"))?,
            ),
            None => (authority, defaults.port),
        };

        Ok(Self {
            host: if host.is_empty() {
                defaults.host
            } else {
                host.to_string()
            },
            port,
            db,
        })
    }
}

/// A single connection speaking RESP2
pub struct RedisConnection {
    stream: TcpStream,
    codec: RespCodec,
    buf: Vec<u8>,
}

impl RedisConnection {
    /// Connect and select the configured database
    ///
    /// # Errors
    ///
    /// Returns error if the TCP connection fails or `SELECT` is refused.
    pub async fn connect(address: &RedisAddress) -> Result<Self> {
        let stream = TcpStream::connect((address.host.as_str(), address.port)).await?;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream,
            codec: RespCodec::new(),
            buf: vec![0u8; 4096],
        };

        if address.db != 0 {
            conn.command(&["SELECT", &address.db.to_string()]).await?;
        }

        tracing::debug!("Connected to {}", address);
        Ok(conn)
    }

    /// Send a command and wait for its reply
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Store` if the server answers with an error
    /// reply, or an I/O / protocol error if the connection fails.
    pub async fn command<S: AsRef<[u8]>>(&mut self, args: &[S]) -> Result<RespValue> {
        self.stream.write_all(&encode_command(args)).await?;
        match self.read_frame().await? {
            RespValue::Error(message) => Err(SupervisorError::Store { message }),
            value => Ok(value),
        }
    }

    /// `GET key`
    ///
    /// # Errors
    ///
    /// See [`RedisConnection::command`].
    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        match self.command(&["GET", key]).await? {
            RespValue::Null => Ok(None),
            value => value.as_text().map(Some).ok_or_else(|| unexpected("GET", &value)),
        }
    }

    /// `SET key value`
    ///
    /// # Errors
    ///
    /// See [`RedisConnection::command`].
    pub async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.command(&["SET", key, value]).await.map(|_| ())
    }

    /// `DEL key`
    ///
    /// # Errors
    ///
    /// See [`RedisConnection::command`].
    pub async fn del(&mut self, key: &str) -> Result<()> {
        self.command(&["DEL", key]).await.map(|_| ())
    }

    /// `PUBLISH channel message`, returning the number of receivers
    ///
    /// # Errors
    ///
    /// See [`RedisConnection::command`].
    pub async fn publish(&mut self, channel: &str, message: &str) -> Result<i64> {
        match self.command(&["PUBLISH", channel, message]).await? {
            RespValue::Integer(n) => Ok(n),
            value => Err(unexpected("PUBLISH", &value)),
        }
    }

    /// Turn this connection into a subscription on `channel`
    ///
    /// # Errors
    ///
    /// Returns error if the server does not confirm the subscription.
    pub async fn subscribe(mut self, channel: &str) -> Result<RedisSubscription> {
        self.stream
            .write_all(&encode_command(&["SUBSCRIBE", channel]))
            .await?;

        match self.read_frame().await? {
            RespValue::Array(items)
                if items.first().and_then(RespValue::as_text).as_deref() == Some("subscribe") =>
            {
                tracing::info!("Subscribed to {} channel", channel);
                Ok(RedisSubscription {
                    conn: self,
                    channel: channel.to_string(),
                })
            }
            value => Err(unexpected("SUBSCRIBE", &value)),
        }
    }

    async fn read_frame(&mut self) -> Result<RespValue> {
        loop {
            if let Some(value) = self.codec.decode().map_err(protocol)? {
                return Ok(value);
            }

            let n = self.stream.read(&mut self.buf).await?;
            if n == 0 {
                return Err(SupervisorError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "redis closed the connection",
                )));
            }
            self.codec.feed(&self.buf[..n]).map_err(protocol)?;
        }
    }
}

fn protocol(err: impl fmt::Display) -> SupervisorError {
    SupervisorError::Protocol {
        message: err.to_string(),
    }
}

fn unexpected(command: &str, value: &RespValue) -> SupervisorError {
    SupervisorError::Protocol {
        message: format!("unexpected reply to {command}: {value:?}"),
    }
}

/// An open `SUBSCRIBE`
pub struct RedisSubscription {
    conn: RedisConnection,
    channel: String,
}

#[async_trait]
impl CommandStream for RedisSubscription {
    async fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            let frame = self.conn.read_frame().await?;
            match frame.as_pubsub_message() {
                Some((channel, payload)) if channel == self.channel => return Ok(Some(payload)),
                Some((channel, _)) => {
                    tracing::debug!("Ignoring message on unexpected channel {}", channel);
                }
                None => tracing::trace!("Ignoring subscription frame {:?}", frame),
            }
        }
    }
}

/// Default bound on a single store round trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Settings store over a lazily (re)established Redis connection
///
/// Every call, connecting included, is bounded by a timeout. A server that
/// stops answering costs one failed call and a fresh connection next time.
pub struct RedisStore {
    address: RedisAddress,
    timeout: Duration,
    conn: Mutex<Option<RedisConnection>>,
}

impl RedisStore {
    /// Create a store; no connection is made until first use
    #[must_use]
    pub fn new(address: RedisAddress) -> Self {
        Self {
            address,
            timeout: DEFAULT_TIMEOUT,
            conn: Mutex::new(None),
        }
    }

    /// Bound each call by `timeout` instead of [`DEFAULT_TIMEOUT`]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Server address
    #[must_use]
    pub fn address(&self) -> &RedisAddress {
        &self.address
    }

    /// Take the pooled connection out of `slot`, connecting if there is none
    ///
    /// The connection stays out of the slot while a command is in flight, so
    /// a call abandoned halfway never leaves an unread reply behind.
    async fn checkout(&self, slot: &mut Option<RedisConnection>) -> Result<RedisConnection> {
        match slot.take() {
            Some(conn) => Ok(conn),
            None => RedisConnection::connect(&self.address).await,
        }
    }

    /// Return `conn` to the slot unless the call broke the transport
    fn checkin<T>(slot: &mut Option<RedisConnection>, conn: RedisConnection, result: &Result<T>) {
        if matches!(
            result,
            Err(SupervisorError::Io(_) | SupervisorError::Protocol { .. })
        ) {
            tracing::warn!("Dropping broken connection to settings store");
        } else {
            *slot = Some(conn);
        }
    }

    /// Run `op` under the store timeout
    async fn timed<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        if let Ok(result) = tokio::time::timeout(self.timeout, op).await {
            return result;
        }

        tracing::warn!(
            "Settings store at {} did not answer within {:?}",
            self.address,
            self.timeout
        );
        Err(SupervisorError::Store {
            message: format!("no reply from {} within {:?}", self.address, self.timeout),
        })
    }
}

#[async_trait]
impl SettingsStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.timed(async {
            let mut guard = self.conn.lock().await;
            let mut conn = self.checkout(&mut guard).await?;
            let result = conn.get(key).await;
            Self::checkin(&mut guard, conn, &result);
            result
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.timed(async {
            let mut guard = self.conn.lock().await;
            let mut conn = self.checkout(&mut guard).await?;
            let result = conn.set(key, value).await;
            Self::checkin(&mut guard, conn, &result);
            result
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.timed(async {
            let mut guard = self.conn.lock().await;
            let mut conn = self.checkout(&mut guard).await?;
            let result = conn.del(key).await;
            Self::checkin(&mut guard, conn, &result);
            result
        })
        .await
    }
}

#[async_trait]
impl ChannelPublisher for RedisStore {
    async fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        let receivers = self
            .timed(async {
                let mut guard = self.conn.lock().await;
                let mut conn = self.checkout(&mut guard).await?;
                let result = conn.publish(channel, message).await;
                Self::checkin(&mut guard, conn, &result);
                result
            })
            .await?;
        Ok(usize::try_from(receivers).unwrap_or(0))
    }
}

/// Command channel over a dedicated Redis connection per subscription
pub struct RedisCommandSource {
    address: RedisAddress,
    timeout: Duration,
}

impl RedisCommandSource {
    /// Create a command source
    #[must_use]
    pub fn new(address: RedisAddress) -> Self {
        Self {
            address,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound connecting and subscribing by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CommandSource for RedisCommandSource {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn CommandStream>> {
        let subscribe = async {
            let conn = RedisConnection::connect(&self.address).await?;
            conn.subscribe(channel).await
        };
        match tokio::time::timeout(self.timeout, subscribe).await {
            Ok(subscription) => Ok(Box::new(subscription?)),
            Err(_) => Err(SupervisorError::CommandChannelDisconnect {
                message: format!("no reply from {} within {:?}", self.address, self.timeout),
            }),
        }
    }
}
