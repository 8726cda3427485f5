use serde::{Deserialize, Serialize};

/// Candidate peer base URI.
///
/// Ordered by its string value, so every process walks a region's peers in
/// the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerUri(String);

impl PeerUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerUri {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for PeerUri {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

impl std::fmt::Display for PeerUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-region host snapshot from the database control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStats {
    /// Region name.
    pub region: String,
    /// Hosts in the region currently running database processes.
    #[serde(default)]
    pub used_host_count: u32,
    /// Base URIs of those hosts, in no particular order.
    #[serde(default)]
    pub used_host_urls: Vec<PeerUri>,
}

impl RegionStats {
    /// Whether the region has hosts that could run a peer.
    pub fn is_used(&self) -> bool {
        self.used_host_count > 0
    }
}
