//! Torrent Deck Companion
//!
//! A Rust application that connects a torrent upload inhibitor daemon to
//! desktop widgets.
//!
//! # Features
//! - Mirrors the daemon's state over a persistent, line-delimited TCP link
//! - Survives disconnects via primary/alternate endpoint failover
//! - Holds the session token issued by the daemon at handshake time
//! - Serializes outbound commands against the concurrent inbound listener
//! - Raises an edge-triggered signal only when the mirrored state changes
//! - Relays user inhibit/uninhibit commands and operational sys-commands

pub mod core;
pub mod inhibitor;

pub use crate::core::config::Config;
pub use crate::inhibitor::{ChangeNotifier, InhibitorClient, InhibitorState};
