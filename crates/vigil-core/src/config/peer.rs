use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Peer wake configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Port used when building peer sync URLs.
    #[serde(default = "default_port")]
    pub default_port: u16,

    /// Path of the sync endpoint on every peer.
    #[serde(default = "default_sync_path")]
    pub sync_path: String,

    /// Keep an explicit port found in the peer URI instead of `default_port`.
    #[serde(default)]
    pub keep_peer_port: bool,

    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl PeerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            default_port: default_port(),
            sync_path: default_sync_path(),
            keep_peer_port: false,
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_sync_path() -> String {
    "/storefront/api/app-instances/sync".to_string()
}

fn default_connect_timeout() -> u64 {
    2_000
}

fn default_request_timeout() -> u64 {
    5_000
}
