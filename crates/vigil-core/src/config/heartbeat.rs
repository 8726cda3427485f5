use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Heartbeat and fleet liveness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between heartbeat ticks.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Seconds between purges of dead instances.
    #[serde(default = "default_purge_frequency")]
    pub purge_frequency_secs: u64,

    /// Instances whose last heartbeat is older than this are purged.
    #[serde(default = "default_min_purge_age")]
    pub min_instance_purge_age_secs: u64,

    /// Without API activity for this long an instance counts as idle.
    #[serde(default = "default_idle_threshold")]
    pub stop_users_after_idle_ui_secs: u64,

    /// Instances with a heartbeat inside this window count as active.
    #[serde(default = "default_active_window")]
    pub active_instance_window_secs: u64,
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn min_instance_purge_age(&self) -> chrono::Duration {
        saturating_seconds(self.min_instance_purge_age_secs)
    }

    pub fn stop_users_after_idle(&self) -> chrono::Duration {
        saturating_seconds(self.stop_users_after_idle_ui_secs)
    }

    pub fn active_instance_window(&self) -> chrono::Duration {
        saturating_seconds(self.active_instance_window_secs)
    }
}

/// Seconds as a chrono duration, clamped to the largest representable one.
fn saturating_seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            purge_frequency_secs: default_purge_frequency(),
            min_instance_purge_age_secs: default_min_purge_age(),
            stop_users_after_idle_ui_secs: default_idle_threshold(),
            active_instance_window_secs: default_active_window(),
        }
    }
}

fn default_interval() -> u64 {
    10
}

fn default_purge_frequency() -> u64 {
    30 * 60
}

fn default_min_purge_age() -> u64 {
    60 * 60
}

fn default_idle_threshold() -> u64 {
    10 * 60
}

fn default_active_window() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_heartbeat_config() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert_eq!(config.purge_frequency_secs, 1800);
        assert!(config.min_instance_purge_age_secs > config.interval_secs);
        assert!(config.active_instance_window_secs > config.interval_secs);
    }

    #[test]
    fn test_parse_heartbeat_config() {
        let toml = r#"
            interval_secs = 5
            min_instance_purge_age_secs = 120
        "#;

        let config: HeartbeatConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.min_instance_purge_age(), chrono::Duration::seconds(120));
        assert_eq!(config.stop_users_after_idle_ui_secs, 600);
    }

    #[test]
    fn test_huge_window_saturates() {
        let config = HeartbeatConfig {
            min_instance_purge_age_secs: u64::MAX / 2,
            active_instance_window_secs: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.min_instance_purge_age(), chrono::Duration::MAX);
        assert_eq!(config.active_instance_window(), chrono::Duration::MAX);
    }
}
