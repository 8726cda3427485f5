mod database;
mod heartbeat;
mod peer;

pub use database::DatabaseConfig;
pub use heartbeat::HeartbeatConfig;
pub use peer::PeerConfig;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VigilError};

/// Upper bound for every duration setting in seconds (100 years).
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Root configuration for Vigil.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Database configuration.
    pub database: DatabaseConfig,

    /// Heartbeat timing.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Peer wake settings.
    #[serde(default)]
    pub peer: PeerConfig,

    /// Seed for the local app instance.
    #[serde(default)]
    pub instance: InstanceConfig,

    /// Database control plane.
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Workload simulator.
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Peer-facing HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,
}

impl VigilConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| VigilError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        let config: Self = toml::from_str(&content)
            .map_err(|e| VigilError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with defaults everywhere except the database URL.
    pub fn default_with_database_url(url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            heartbeat: HeartbeatConfig::default(),
            peer: PeerConfig::default(),
            instance: InstanceConfig::default(),
            fleet: FleetConfig::default(),
            simulator: SimulatorConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let hb = &self.heartbeat;
        for (name, secs) in [
            ("heartbeat.interval_secs", hb.interval_secs),
            ("heartbeat.purge_frequency_secs", hb.purge_frequency_secs),
            ("heartbeat.min_instance_purge_age_secs", hb.min_instance_purge_age_secs),
            ("heartbeat.stop_users_after_idle_ui_secs", hb.stop_users_after_idle_ui_secs),
            ("heartbeat.active_instance_window_secs", hb.active_instance_window_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(VigilError::Config(format!(
                    "{} ({}) must not exceed {}",
                    name, secs, MAX_DURATION_SECS
                )));
            }
        }
        if hb.interval_secs == 0 {
            return Err(VigilError::Config(
                "heartbeat.interval_secs must be greater than zero".into(),
            ));
        }
        if hb.purge_frequency_secs == 0 {
            return Err(VigilError::Config(
                "heartbeat.purge_frequency_secs must be greater than zero".into(),
            ));
        }
        // A live instance that misses one beat must not be purged.
        if hb.min_instance_purge_age_secs <= hb.interval_secs {
            return Err(VigilError::Config(format!(
                "heartbeat.min_instance_purge_age_secs ({}) must exceed heartbeat.interval_secs ({})",
                hb.min_instance_purge_age_secs, hb.interval_secs
            )));
        }
        if hb.active_instance_window_secs <= hb.interval_secs {
            return Err(VigilError::Config(format!(
                "heartbeat.active_instance_window_secs ({}) must exceed heartbeat.interval_secs ({})",
                hb.active_instance_window_secs, hb.interval_secs
            )));
        }
        // Peer calls must not stall the tick past the next beat.
        let interval_ms = hb.interval_secs.saturating_mul(1000);
        for (name, ms) in [
            ("peer.connect_timeout_ms", self.peer.connect_timeout_ms),
            ("peer.request_timeout_ms", self.peer.request_timeout_ms),
        ] {
            if ms == 0 {
                return Err(VigilError::Config(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
            if ms >= interval_ms {
                return Err(VigilError::Config(format!(
                    "{} ({}) must be below heartbeat.interval_secs ({}s)",
                    name, ms, hb.interval_secs
                )));
            }
        }
        Ok(())
    }
}

/// Seed values for the local app instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Stable identity; a random one is generated when absent.
    pub uuid: Option<Uuid>,

    /// Fixed region. Setting it turns on region override.
    pub region: Option<String>,

    /// Fixed node id, only meaningful together with `region`.
    pub node_id: Option<i64>,

    /// Stop simulated users once the whole fleet is idle.
    #[serde(default = "default_stop_users_when_idle")]
    pub stop_users_when_idle: bool,

    /// Advertised base URL of this process.
    pub url: Option<String>,
}

impl InstanceConfig {
    pub fn region_override(&self) -> bool {
        self.region.is_some()
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            uuid: None,
            region: None,
            node_id: None,
            stop_users_when_idle: default_stop_users_when_idle(),
            url: None,
        }
    }
}

fn default_stop_users_when_idle() -> bool {
    true
}

/// Database control plane configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Base URL of the control plane REST API.
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_fleet_timeout")]
    pub request_timeout_ms: u64,
}

impl FleetConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            control_plane_url: default_control_plane_url(),
            request_timeout_ms: default_fleet_timeout(),
        }
    }
}

fn default_control_plane_url() -> String {
    "http://localhost:8888/api".to_string()
}

fn default_fleet_timeout() -> u64 {
    5_000
}

/// Workload simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SimulatorConfig {
    /// Base URL of the simulator admin API; no simulator when absent.
    pub url: Option<String>,
}

/// Peer-facing HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_server_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return result;
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
