//! Inbound frame listener.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufRead;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::notify::ChangeNotifier;
use super::protocol::{self, ProtocolError, StateUpdate};
use super::state::SharedState;

/// Host-supplied hook invoked when the daemon announces a new release.
///
/// Receives `(newest, current)` and is awaited in line with frame
/// processing, so a slow hook backpressures further reads. A hook error
/// is logged and the frame still counts as processed.
pub type UpdateCallback = Arc<
    dyn Fn(String, String) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Wrap an async closure into an [`UpdateCallback`].
pub fn update_callback<F, Fut>(hook: F) -> UpdateCallback
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |newest, current| Box::pin(hook(newest, current)))
}

/// Delay between loop iterations, so frame bursts never turn into a
/// tight spin.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Pause after a malformed frame before the loop guard re-checks.
const DECODE_FAILURE_PAUSE: Duration = Duration::from_secs(1);

struct Listener<R> {
    reader: R,
    state: SharedState,
    notifier: Arc<ChangeNotifier>,
    terminate: Arc<AtomicBool>,
    on_update_available: Option<UpdateCallback>,
}

/// Spawn the listener task for a fresh connection.
///
/// The spawned task owns the read half exclusively. Its completion hook
/// clears the connected flag on every exit path, so the run loop notices
/// the loss even when the loop body did not flag it.
pub(crate) fn spawn<R>(
    reader: R,
    state: SharedState,
    notifier: Arc<ChangeNotifier>,
    terminate: Arc<AtomicBool>,
    on_update_available: Option<UpdateCallback>,
) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let listener = Listener {
            reader,
            state: Arc::clone(&state),
            notifier,
            terminate,
            on_update_available,
        };
        listener.run().await;
        state.write().connected_to_inhibitor = false;
        debug!("listener finished");
    })
}

impl<R: AsyncBufRead + Unpin> Listener<R> {
    async fn run(mut self) {
        while !self.terminate.load(Ordering::Acquire) && self.state.read().connected_to_inhibitor {
            match protocol::read_frame(&mut self.reader).await {
                Ok(raw) => {
                    if let Err(err) = self.dispatch(&raw).await {
                        error!(
                            error = %err,
                            frame = %String::from_utf8_lossy(&raw),
                            "failed to process frame"
                        );
                        self.state.write().connected_to_inhibitor = false;
                        tokio::time::sleep(DECODE_FAILURE_PAUSE).await;
                    }
                }
                Err(err) => {
                    error!(error = %err, "lost connection to inhibitor daemon");
                    self.state.write().connected_to_inhibitor = false;
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn dispatch(&mut self, raw: &[u8]) -> Result<(), ProtocolError> {
        let msg = protocol::decode_frame(raw)?;
        match msg.kind() {
            protocol::KIND_STATE_UPDATE => {
                let update = StateUpdate::from_message(&msg)?;
                let changed = {
                    let mut state = self.state.write();
                    let changed = !state.matches_update(&update);
                    state.apply_update(&update);
                    changed
                };
                debug!(changed, "applied state update");
                if changed {
                    self.notifier.signal();
                }
            }
            protocol::KIND_ACK => {
                debug!("daemon acknowledged command");
            }
            protocol::KIND_NEW_VERSION => {
                let newest = msg.str_field("new_version")?.to_string();
                let current = msg.str_field("old_version")?.to_string();
                debug!(%newest, %current, "daemon announced a new release");
                if let Some(hook) = &self.on_update_available {
                    if let Err(err) = hook(newest, current).await {
                        warn!(error = %err, "update-available hook failed");
                    }
                }
            }
            other => {
                warn!(kind = other, "unrecognized message kind");
            }
        }
        Ok(())
    }
}
