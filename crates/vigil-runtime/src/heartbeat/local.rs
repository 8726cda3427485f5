use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use vigil_core::instance::{AppInstance, InstanceId};

/// Shared handle to this process's own instance record.
///
/// The heartbeat owns the liveness fields; request handlers only record API
/// activity.
#[derive(Debug, Clone)]
pub struct LocalInstance {
    id: InstanceId,
    inner: Arc<RwLock<AppInstance>>,
}

impl LocalInstance {
    pub fn new(instance: AppInstance) -> Self {
        Self {
            id: instance.uuid,
            inner: Arc::new(RwLock::new(instance)),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Copy of the current record.
    pub async fn snapshot(&self) -> AppInstance {
        self.inner.read().await.clone()
    }

    /// Note user activity at `now`.
    pub async fn record_api_activity(&self, now: DateTime<Utc>) {
        let mut instance = self.inner.write().await;
        if now > instance.last_api_activity {
            instance.last_api_activity = now;
        }
    }

    /// Publish the fields written by a committed heartbeat.
    ///
    /// Activity recorded while the heartbeat was running is kept.
    pub(crate) async fn apply_heartbeat(&self, committed: &AppInstance) {
        let mut instance = self.inner.write().await;
        if instance.first_heartbeat.is_none() {
            instance.first_heartbeat = committed.first_heartbeat;
        }
        instance.last_heartbeat = committed.last_heartbeat;
        instance.cpu_utilization = committed.cpu_utilization;
        instance.region = committed.region.clone();
        instance.node_id = committed.node_id;
        if committed.last_api_activity > instance.last_api_activity {
            instance.last_api_activity = committed.last_api_activity;
        }
    }
}
