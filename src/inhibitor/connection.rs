//! Connection establishment with endpoint failover.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::config::InhibitorConfig;

use super::listener::{self, UpdateCallback};
use super::notify::ChangeNotifier;
use super::protocol::{self, MessageFields, ProtocolError};
use super::sender::{CommandSender, SendError};
use super::state::SharedState;

/// Opaque session credential issued by the daemon at handshake time.
///
/// Held for the life of one connection and replaced on reconnect; every
/// reconnect performs a fresh handshake (`renew_conn` is accepted from
/// the daemon but renewal is never solicited).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from a connection attempt. All of these are transient: the run
/// loop logs them and retries on its next tick.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("both endpoints unreachable: {host}:{main_port} then {host}:{alt_port}: {source}")]
    Dial {
        host: String,
        main_port: u16,
        alt_port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake send failed: {0}")]
    Handshake(#[from] SendError),

    #[error("handshake response read failed: {0}")]
    HandshakeRead(#[source] std::io::Error),

    #[error("handshake response malformed: {0}")]
    HandshakeDecode(#[from] ProtocolError),
}

/// Owns dialing, the handshake, the session token, and the listener's
/// lifetime. At most one listener ever runs: a new one may only be
/// spawned after the previous handle has been aborted and awaited.
pub struct ConnectionManager {
    config: InhibitorConfig,
    sender: CommandSender,
    state: SharedState,
    notifier: Arc<ChangeNotifier>,
    terminate: Arc<AtomicBool>,
    on_update_available: Option<UpdateCallback>,
    token: Mutex<Option<SessionToken>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    connecting: AtomicBool,
}

impl ConnectionManager {
    pub(crate) fn new(
        config: InhibitorConfig,
        sender: CommandSender,
        state: SharedState,
        notifier: Arc<ChangeNotifier>,
        terminate: Arc<AtomicBool>,
        on_update_available: Option<UpdateCallback>,
    ) -> Self {
        Self {
            config,
            sender,
            state,
            notifier,
            terminate,
            on_update_available,
            token: Mutex::new(None),
            listener: Mutex::new(None),
            connecting: AtomicBool::new(false),
        }
    }

    /// Establish a connection and spawn the listener.
    ///
    /// A no-op when already connected, and when another connect attempt
    /// is still in flight.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        if self.state.read().connected_to_inhibitor {
            debug!("already connected to inhibitor daemon");
            return Ok(());
        }
        if self.connecting.swap(true, Ordering::Acquire) {
            debug!("connect attempt already in progress");
            return Ok(());
        }
        let result = self.connect_inner().await;
        self.connecting.store(false, Ordering::Release);
        result
    }

    async fn connect_inner(&self) -> Result<(), ConnectError> {
        // Cancel-before-replace: the previous listener must be gone, and
        // the previous write half closed, before a new dial.
        let previous = self.listener.lock().take();
        if let Some(previous) = previous {
            previous.abort();
            let _ = previous.await;
        }
        self.sender.clear().await;

        let stream = self.dial().await?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        self.sender.install(write_half).await;

        match self.handshake(&mut reader).await {
            Ok(Some(token)) => {
                debug!(token = %token, "received session token");
                *self.token.lock() = Some(token);
            }
            Ok(None) => {}
            Err(err) => {
                self.state.write().connected_to_inhibitor = false;
                return Err(err);
            }
        }

        self.state.write().connected_to_inhibitor = true;
        let handle = listener::spawn(
            reader,
            Arc::clone(&self.state),
            Arc::clone(&self.notifier),
            Arc::clone(&self.terminate),
            self.on_update_available.clone(),
        );
        *self.listener.lock() = Some(handle);
        info!(host = %self.config.host, "connected to inhibitor daemon");
        Ok(())
    }

    /// Dial the primary endpoint, falling back to the alternate exactly
    /// once. Both failing surfaces the alternate's error.
    async fn dial(&self) -> Result<TcpStream, ConnectError> {
        let host = self.config.host.as_str();
        match TcpStream::connect((host, self.config.main_port)).await {
            Ok(stream) => {
                debug!(port = self.config.main_port, "dialed primary endpoint");
                Ok(stream)
            }
            Err(primary_err) => {
                warn!(
                    port = self.config.main_port,
                    error = %primary_err,
                    "primary endpoint unreachable, trying alternate"
                );
                match TcpStream::connect((host, self.config.alt_port)).await {
                    Ok(stream) => {
                        debug!(port = self.config.alt_port, "dialed alternate endpoint");
                        Ok(stream)
                    }
                    Err(source) => Err(ConnectError::Dial {
                        host: self.config.host.clone(),
                        main_port: self.config.main_port,
                        alt_port: self.config.alt_port,
                        source,
                    }),
                }
            }
        }
    }

    /// Send the handshake and wait for the daemon's first frame.
    ///
    /// Only `new_conn` / `renew_conn` carry a token, but any decodable
    /// frame proves a live channel. There is no read timeout here: an
    /// accepting-but-silent daemon stalls the connect step, a known gap
    /// carried over from the daemon's observed protocol.
    async fn handshake<R>(&self, reader: &mut R) -> Result<Option<SessionToken>, ConnectError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.sender
            .send(protocol::KIND_HANDSHAKE, &MessageFields::new())
            .await?;
        let raw = protocol::read_frame(reader)
            .await
            .map_err(ConnectError::HandshakeRead)?;
        let msg = protocol::decode_frame(&raw)?;
        match msg.kind() {
            protocol::KIND_NEW_CONN | protocol::KIND_RENEW_CONN => {
                Ok(Some(SessionToken::from(msg.str_field("token")?)))
            }
            other => {
                debug!(kind = other, "handshake acknowledged without a token");
                Ok(None)
            }
        }
    }

    /// The token from the most recent successful handshake.
    pub fn session_token(&self) -> Option<SessionToken> {
        self.token.lock().clone()
    }

    /// Cancel the current listener, if any. Used by teardown.
    pub(crate) fn abort_listener(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }
}
