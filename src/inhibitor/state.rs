//! Mirrored inhibitor daemon state.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use super::protocol::StateUpdate;

/// Version reported until the daemon supplies one.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Shared handle to the mirrored state. The listener is the only writer;
/// everything else holds read locks for single-field snapshots.
pub type SharedState = Arc<RwLock<InhibitorState>>;

/// Local mirror of the daemon's reported state.
#[derive(Debug, Clone)]
pub struct InhibitorState {
    /// Whether the daemon is currently suppressing uploads.
    pub inhibiting: bool,
    /// Subsystems holding an inhibit, in the daemon's reporting order.
    pub inhibit_sources: Vec<String>,
    /// Whether the current state was forced by a user command rather than
    /// the daemon's automatic logic.
    pub overridden: bool,
    /// Daemon-side qBittorrent link health.
    pub connected_to_qbt: bool,
    /// Daemon-side Plex link health.
    pub connected_to_plex: bool,
    /// Daemon-side VPN link health.
    pub connected_to_net: bool,
    /// Whether *this* client holds a live, handshaken daemon connection.
    /// Independent of the daemon-side flags above.
    pub connected_to_inhibitor: bool,
    /// Free-text override; non-empty text supersedes structured rendering.
    pub message: Option<String>,
    /// Version string reported by the daemon.
    pub remote_version: String,
    /// When the last `state_update` was applied; drives the liveness
    /// refresh.
    pub last_update: Instant,
}

impl Default for InhibitorState {
    fn default() -> Self {
        Self {
            inhibiting: false,
            inhibit_sources: Vec::new(),
            overridden: false,
            connected_to_qbt: false,
            connected_to_plex: false,
            connected_to_net: false,
            connected_to_inhibitor: false,
            message: None,
            remote_version: UNKNOWN_VERSION.to_string(),
            last_update: Instant::now(),
        }
    }
}

impl InhibitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one decoded `state_update` as a unit. Optional wire fields
    /// keep their previous value when absent from the frame.
    pub fn apply_update(&mut self, update: &StateUpdate) {
        self.inhibiting = update.inhibiting;
        self.inhibit_sources = update.inhibited_by.clone();
        self.connected_to_qbt = update.qbt_connection;
        self.connected_to_plex = update.plex_connection;
        if let Some(net) = update.net_connection {
            self.connected_to_net = net;
        }
        self.message = update.message.clone();
        if let Some(version) = &update.version {
            self.remote_version = version.clone();
        }
        self.last_update = Instant::now();
    }

    /// Render the one-line status. A non-empty free-text message wins
    /// outright; after that, disconnection dominates every other field.
    pub fn status_text(&self) -> String {
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            return message.to_string();
        }
        if !self.connected_to_inhibitor {
            return "Disconnected".to_string();
        }
        if !self.connected_to_qbt {
            return "No qBittorrent connection".to_string();
        }
        if !self.connected_to_plex {
            return "No Plex connection".to_string();
        }
        if !self.connected_to_net {
            return "VPN connection down".to_string();
        }
        if self.inhibiting {
            let mut text = String::from("Inhibited");
            for source in &self.inhibit_sources {
                text.push_str(" - ");
                text.push_str(source);
            }
            text
        } else {
            let mut text = String::from("Uninhibited");
            if !self.overridden {
                text.push_str(" - Auto");
            }
            text
        }
    }

    /// Value equality over everything a consumer can observe, including
    /// the rendered status text. The transient `last_update` stamp is
    /// excluded.
    pub fn observed_eq(&self, other: &Self) -> bool {
        self.inhibiting == other.inhibiting
            && self.inhibit_sources == other.inhibit_sources
            && self.overridden == other.overridden
            && self.connected_to_qbt == other.connected_to_qbt
            && self.connected_to_plex == other.connected_to_plex
            && self.connected_to_net == other.connected_to_net
            && self.connected_to_inhibitor == other.connected_to_inhibitor
            && self.message == other.message
            && self.remote_version == other.remote_version
            && self.status_text() == other.status_text()
    }

    /// Would applying `update` leave the observed state unchanged?
    /// Computed against a clone so the caller can decide before applying.
    pub fn matches_update(&self, update: &StateUpdate) -> bool {
        let mut next = self.clone();
        next.apply_update(update);
        self.observed_eq(&next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(inhibiting: bool, sources: &[&str]) -> StateUpdate {
        StateUpdate {
            inhibiting,
            inhibited_by: sources.iter().map(|s| s.to_string()).collect(),
            qbt_connection: true,
            plex_connection: true,
            net_connection: Some(true),
            message: None,
            version: None,
        }
    }

    fn connected_state() -> InhibitorState {
        let mut state = InhibitorState::new();
        state.connected_to_inhibitor = true;
        state
    }

    #[test]
    fn test_default_state() {
        let state = InhibitorState::new();
        assert!(!state.inhibiting);
        assert!(!state.connected_to_inhibitor);
        assert_eq!(state.remote_version, UNKNOWN_VERSION);
        assert_eq!(state.status_text(), "Disconnected");
    }

    #[test]
    fn test_apply_update_writes_all_fields() {
        let mut state = connected_state();
        state.apply_update(&StateUpdate {
            inhibiting: true,
            inhibited_by: vec!["plex".to_string(), "manual".to_string()],
            qbt_connection: true,
            plex_connection: false,
            net_connection: Some(true),
            message: Some("hello".to_string()),
            version: Some("2.1".to_string()),
        });
        assert!(state.inhibiting);
        assert_eq!(state.inhibit_sources, ["plex", "manual"]);
        assert!(state.connected_to_qbt);
        assert!(!state.connected_to_plex);
        assert!(state.connected_to_net);
        assert_eq!(state.message.as_deref(), Some("hello"));
        assert_eq!(state.remote_version, "2.1");
    }

    #[test]
    fn test_apply_update_no_stale_fields() {
        let mut state = connected_state();
        state.apply_update(&update(true, &["plex", "qbt"]));
        state.apply_update(&update(false, &[]));
        assert!(!state.inhibiting);
        assert!(state.inhibit_sources.is_empty());
    }

    #[test]
    fn test_apply_update_optional_fields_retained() {
        let mut state = connected_state();
        state.apply_update(&StateUpdate {
            version: Some("3.0".to_string()),
            ..update(false, &[])
        });
        let mut bare = update(false, &[]);
        bare.net_connection = None;
        state.apply_update(&bare);
        assert_eq!(state.remote_version, "3.0");
        assert!(state.connected_to_net);
    }

    #[test]
    fn test_message_supersedes_everything() {
        let mut state = InhibitorState::new();
        state.message = Some("maintenance tonight".to_string());
        assert_eq!(state.status_text(), "maintenance tonight");
        // An empty message does not count as an override.
        state.message = Some(String::new());
        assert_eq!(state.status_text(), "Disconnected");
    }

    #[test]
    fn test_disconnection_dominates_subsystem_flags() {
        let mut state = InhibitorState::new();
        state.connected_to_qbt = true;
        state.connected_to_plex = true;
        state.connected_to_net = true;
        state.inhibiting = true;
        state.inhibit_sources = vec!["plex".to_string()];
        assert_eq!(state.status_text(), "Disconnected");
    }

    #[test]
    fn test_status_text_precedence_and_rendering() {
        let mut state = connected_state();
        assert_eq!(state.status_text(), "No qBittorrent connection");
        state.connected_to_qbt = true;
        assert_eq!(state.status_text(), "No Plex connection");
        state.connected_to_plex = true;
        assert_eq!(state.status_text(), "VPN connection down");
        state.connected_to_net = true;
        assert_eq!(state.status_text(), "Uninhibited - Auto");
        state.overridden = true;
        assert_eq!(state.status_text(), "Uninhibited");
        state.inhibiting = true;
        state.inhibit_sources = vec!["plex".to_string(), "manual".to_string()];
        assert_eq!(state.status_text(), "Inhibited - plex - manual");
    }

    #[test]
    fn test_matches_update_identical() {
        let mut state = connected_state();
        let update = update(true, &["plex"]);
        state.apply_update(&update);
        assert!(state.matches_update(&update));
    }

    #[test]
    fn test_matches_update_detects_any_difference() {
        let mut state = connected_state();
        let baseline = update(true, &["plex"]);
        state.apply_update(&baseline);

        let mut changed = baseline.clone();
        changed.inhibited_by = vec!["qbt".to_string()];
        assert!(!state.matches_update(&changed));

        let mut changed = baseline.clone();
        changed.plex_connection = false;
        assert!(!state.matches_update(&changed));

        let mut changed = baseline.clone();
        changed.version = Some("9.9".to_string());
        assert!(!state.matches_update(&changed));
    }

    #[test]
    fn test_observed_eq_ignores_last_update() {
        let mut a = connected_state();
        let mut b = connected_state();
        a.apply_update(&update(false, &[]));
        std::thread::sleep(std::time::Duration::from_millis(2));
        b.apply_update(&update(false, &[]));
        assert!(a.last_update != b.last_update);
        assert!(a.observed_eq(&b));
    }
}
