use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::InstanceConfig;

/// Stable process identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// Generate a new random instance ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Region identity of the database node serving a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbRegionInfo {
    pub region_name: String,
    pub node_id: i64,
}

/// One process in the fleet, as recorded in the shared database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstance {
    /// Primary key.
    pub uuid: InstanceId,
    /// Region name, from configuration or from the database node.
    pub region: String,
    /// Database node this process is attached to.
    pub node_id: i64,
    /// When set, `region` and `node_id` are owned by configuration.
    pub region_override: bool,
    /// Advertised base URL of the process.
    pub url: Option<String>,
    /// Process start.
    pub started_at: DateTime<Utc>,
    /// First successful heartbeat. Written once.
    pub first_heartbeat: Option<DateTime<Utc>>,
    /// Most recent successful heartbeat.
    pub last_heartbeat: DateTime<Utc>,
    /// Last user interaction, maintained by request handlers.
    pub last_api_activity: DateTime<Utc>,
    /// CPU utilization percentage sampled at the last heartbeat.
    pub cpu_utilization: f32,
    /// Stop simulated users when the whole fleet is idle.
    pub stop_users_when_idle: bool,
}

impl AppInstance {
    /// Seed the local instance from configuration.
    pub fn from_config(config: &InstanceConfig, now: DateTime<Utc>) -> Self {
        Self {
            uuid: config.uuid.map(InstanceId::from_uuid).unwrap_or_default(),
            region: config.region.clone().unwrap_or_default(),
            node_id: config.node_id.unwrap_or_default(),
            region_override: config.region_override(),
            url: config.url.clone(),
            started_at: now,
            first_heartbeat: None,
            last_heartbeat: now,
            last_api_activity: now,
            cpu_utilization: 0.0,
            stop_users_when_idle: config.stop_users_when_idle,
        }
    }

    /// No user activity since `threshold`.
    pub fn is_idle(&self, threshold: DateTime<Utc>) -> bool {
        self.last_api_activity < threshold
    }

    /// Heartbeat at or after `since`.
    pub fn is_alive_since(&self, since: DateTime<Utc>) -> bool {
        self.last_heartbeat >= since
    }
}
