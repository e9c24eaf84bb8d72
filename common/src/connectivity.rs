use log::info;

use crate::types::ConnectivityState;

#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    current: ConnectivityState,
    last_seen: ConnectivityState,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self {
            current: ConnectivityState::Idle,
            last_seen: ConnectivityState::Idle,
        }
    }

    pub fn current(&self) -> ConnectivityState {
        self.current
    }

    pub fn is_connected(&self) -> bool {
        self.current.is_connected()
    }

    /// Records the latest state and logs it when it differs from the last one seen.
    pub fn observe(&mut self, state: ConnectivityState) {
        self.current = state;
        if state == self.last_seen {
            return;
        }

        self.last_seen = state;
        info!("{}", describe(state));
    }
}

pub fn describe(state: ConnectivityState) -> String {
    match state {
        ConnectivityState::NoNetworkAvailable => "wifi: no SSID available".to_string(),
        ConnectivityState::Connected => "wifi: connected".to_string(),
        ConnectivityState::ConnectFailed => "wifi: connection failed".to_string(),
        ConnectivityState::ConnectionLost => "wifi: connection lost".to_string(),
        ConnectivityState::Disconnected => "wifi: disconnected".to_string(),
        ConnectivityState::Connecting => "wifi: connecting".to_string(),
        ConnectivityState::Idle => "wifi: idle".to_string(),
        ConnectivityState::Other(code) => format!("wifi: status changed to {code}"),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tracks_latest_state_and_gates_on_connected() {
        let mut monitor = ConnectivityMonitor::new();

        monitor.observe(ConnectivityState::Connecting);
        assert_eq!(monitor.current(), ConnectivityState::Connecting);
        assert!(!monitor.is_connected());

        monitor.observe(ConnectivityState::Connected);
        monitor.observe(ConnectivityState::Connected);
        assert_eq!(monitor.last_seen, ConnectivityState::Connected);
        assert!(monitor.is_connected());

        monitor.observe(ConnectivityState::ConnectionLost);
        assert_eq!(monitor.current(), ConnectivityState::ConnectionLost);
        assert!(!monitor.is_connected());
    }

    #[test]
    fn unknown_codes_are_described_numerically() {
        assert_eq!(
            describe(ConnectivityState::Other(12_300)),
            "wifi: status changed to 12300"
        );
    }
}
