//! Client facade for the inhibitor daemon.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::config::InhibitorConfig;

use super::connection::{ConnectError, ConnectionManager, SessionToken};
use super::listener::UpdateCallback;
use super::notify::ChangeNotifier;
use super::protocol::{self, MessageFields};
use super::sender::{CommandSender, SendError};
use super::state::{InhibitorState, SharedState};

/// Long-lived client that mirrors the inhibitor daemon's state.
///
/// `run` keeps the connection alive: it reconnects on a fixed interval
/// while disconnected and emits liveness refreshes while the link is
/// quiet. The listener spawned per connection feeds the state mirror and
/// raises the change notifier on observable differences.
pub struct InhibitorClient {
    connection: ConnectionManager,
    sender: CommandSender,
    state: SharedState,
    notifier: Arc<ChangeNotifier>,
    terminate: Arc<AtomicBool>,
    refresh_after: Duration,
    tick: Duration,
    last_refresh: Mutex<Option<Instant>>,
}

impl InhibitorClient {
    /// Create a client for the configured endpoints. The optional hook is
    /// awaited whenever the daemon announces a new release.
    pub fn new(config: InhibitorConfig, on_update_available: Option<UpdateCallback>) -> Self {
        let state: SharedState = Arc::new(RwLock::new(InhibitorState::new()));
        let notifier = Arc::new(ChangeNotifier::new());
        let terminate = Arc::new(AtomicBool::new(false));
        let sender = CommandSender::new();
        let refresh_after = Duration::from_secs(config.refresh_secs);
        let tick = Duration::from_millis(config.tick_ms);
        let connection = ConnectionManager::new(
            config,
            sender.clone(),
            Arc::clone(&state),
            Arc::clone(&notifier),
            Arc::clone(&terminate),
            on_update_available,
        );
        Self {
            connection,
            sender,
            state,
            notifier,
            terminate,
            refresh_after,
            tick,
            last_refresh: Mutex::new(None),
        }
    }

    /// Attempt to connect now. Idempotent while connected; the run loop
    /// calls this every tick while disconnected.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        self.connection.connect().await
    }

    /// Drive the client until `teardown`: reconnect while disconnected,
    /// refresh while the link is quiet. Connect failures are swallowed
    /// and retried next tick — fixed interval, no backoff, no limit.
    pub async fn run(&self) {
        while !self.terminate.load(Ordering::Acquire) {
            if !self.is_connected() {
                if let Err(err) = self.connection.connect().await {
                    warn!(error = %err, "connect attempt failed, retrying next tick");
                }
            } else if self.refresh_due() {
                debug!("sending liveness refresh");
                match self.send_refresh().await {
                    Ok(()) => *self.last_refresh.lock() = Some(Instant::now()),
                    Err(err) => warn!(error = %err, "liveness refresh failed"),
                }
            }
            tokio::time::sleep(self.tick).await;
        }
    }

    fn refresh_due(&self) -> bool {
        if self.state.read().last_update.elapsed() < self.refresh_after {
            return false;
        }
        // One refresh per quiet window, not one per tick.
        self.last_refresh
            .lock()
            .map_or(true, |sent| sent.elapsed() >= self.refresh_after)
    }

    async fn send_refresh(&self) -> Result<(), SendError> {
        let mut fields = MessageFields::new();
        if let Some(token) = self.connection.session_token() {
            fields.insert("token".to_string(), Value::String(token.as_str().to_string()));
        }
        self.sender.send(protocol::KIND_REFRESH, &fields).await
    }

    /// Send a user command (kind `command`) to the daemon.
    pub async fn execute(&self, fields: MessageFields) -> Result<(), SendError> {
        self.sender.send(protocol::KIND_COMMAND, &fields).await
    }

    /// Send an operational command (kind `sys_command`) to the daemon.
    pub async fn send_sys_command(&self, fields: MessageFields) -> Result<(), SendError> {
        self.sender.send(protocol::KIND_SYS_COMMAND, &fields).await
    }

    /// The rendered one-line status for display.
    pub fn status_text(&self) -> String {
        self.state.read().status_text()
    }

    /// Whether the daemon is currently inhibiting.
    pub fn inhibiting(&self) -> bool {
        self.state.read().inhibiting
    }

    /// The daemon's reported version, or the `unknown` sentinel.
    pub fn remote_version(&self) -> String {
        self.state.read().remote_version.clone()
    }

    /// Whether this client holds a live, handshaken connection.
    pub fn is_connected(&self) -> bool {
        self.state.read().connected_to_inhibitor
    }

    /// The session token from the most recent handshake.
    pub fn session_token(&self) -> Option<SessionToken> {
        self.connection.session_token()
    }

    /// The edge-consumed change signal. Consumers `wait().await`, react,
    /// then `clear()`.
    pub fn change_notifier(&self) -> Arc<ChangeNotifier> {
        Arc::clone(&self.notifier)
    }

    /// A point-in-time copy of the mirrored state.
    pub fn state_snapshot(&self) -> InhibitorState {
        self.state.read().clone()
    }

    /// Stop the client. Idempotent; cancels the listener and closes the
    /// write side rather than waiting for in-flight I/O to drain.
    pub fn teardown(&self) {
        if self.terminate.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("tearing down inhibitor client");
        self.connection.abort_listener();
        self.sender.abort();
        self.state.write().connected_to_inhibitor = false;
    }
}
