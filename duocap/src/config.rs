//! Configuration types and defaults

use duocap_core::{MediaStore, PollPolicy, TransferPolicy};

/// Configuration for one capture session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the processing/relay server, e.g.
    /// `http://172.21.1.123:7777`
    pub server_url: String,
    /// Where recordings and downloaded meshes live
    pub store: MediaStore,
    /// Policy for the reconstruction status-poll loop
    pub poll: PollPolicy,
    /// Timeouts for large-payload transfers
    pub transfer: TransferPolicy,
}

impl SessionConfig {
    /// Configuration with default policies and the platform cache
    /// directory (falling back to a temp directory when none resolves)
    pub fn new(server_url: impl Into<String>) -> Self {
        let store = MediaStore::in_cache_dir()
            .unwrap_or_else(|| MediaStore::new(std::env::temp_dir().join("duocap")));
        Self {
            server_url: server_url.into(),
            store,
            poll: PollPolicy::default(),
            transfer: TransferPolicy::default(),
        }
    }

    /// WebSocket form of the server URL, used for the sync relay
    pub fn relay_url(&self) -> String {
        if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.server_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.server_url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_url_derivation() {
        let config = SessionConfig::new("http://172.21.1.123:7777");
        assert_eq!(config.relay_url(), "ws://172.21.1.123:7777");

        let config = SessionConfig::new("https://capture.example.com");
        assert_eq!(config.relay_url(), "wss://capture.example.com");
    }

    #[test]
    fn test_default_policies() {
        let config = SessionConfig::new("http://localhost:7777");
        assert_eq!(config.poll.max_attempts, 120);
        assert_eq!(config.transfer.request_timeout.as_secs(), 120);
    }
}
