//! Inhibitor module - persistent client for the upload inhibitor daemon

mod client;
mod connection;
mod listener;
mod notify;
mod protocol;
mod sender;
mod state;

pub use client::InhibitorClient;
pub use connection::{ConnectError, SessionToken};
pub use listener::{update_callback, UpdateCallback};
pub use notify::ChangeNotifier;
pub use protocol::{ApiMessage, MessageFields, ProtocolError, StateUpdate};
pub use sender::SendError;
pub use state::{InhibitorState, UNKNOWN_VERSION};
