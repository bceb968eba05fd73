//! Serialized outbound command path.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::debug;

use super::protocol::{self, MessageFields};

/// Errors from sending a command frame.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("not connected to the inhibitor daemon")]
    NotConnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The only path that writes to the daemon socket.
///
/// One async mutex over the write half totally orders outbound frames:
/// concurrent callers are serialized and can never interleave a partial
/// frame. The listener owns the read half and never writes.
#[derive(Clone, Default)]
pub struct CommandSender {
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
}

impl CommandSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode and send one frame, flushing before the lock is released.
    pub async fn send(&self, kind: &str, fields: &MessageFields) -> Result<(), SendError> {
        let frame = protocol::encode_frame(kind, fields);
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SendError::NotConnected)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        debug!(kind, bytes = frame.len(), "sent frame");
        Ok(())
    }

    /// Install the write half of a fresh connection, dropping any
    /// previous one.
    pub(crate) async fn install(&self, writer: OwnedWriteHalf) {
        *self.writer.lock().await = Some(writer);
    }

    /// Close the write side of the current connection, if any. Dropping
    /// the half shuts down the socket's write direction.
    pub(crate) async fn clear(&self) {
        self.writer.lock().await.take();
    }

    /// Best-effort close for teardown: never waits behind an in-flight
    /// send.
    pub(crate) fn abort(&self) {
        if let Ok(mut guard) = self.writer.try_lock() {
            guard.take();
        }
    }
}
