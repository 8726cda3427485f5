use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use super::app_instance::{AppInstance, DbRegionInfo};
use crate::error::Result;

/// Access mode of a named transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    ReadOnly,
    ReadWrite,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "READ_ONLY",
            Self::ReadWrite => "READ_WRITE",
        }
    }
}

/// Timestamp used to decide whether an instance counts as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// `last_heartbeat`: the process is running.
    Heartbeat,
    /// `last_api_activity`: a user is interacting with the process.
    ApiActivity,
}

impl Liveness {
    /// Column holding the timestamp.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Heartbeat => "last_heartbeat",
            Self::ApiActivity => "last_api_activity",
        }
    }

    /// Timestamp of this kind on an instance.
    pub fn timestamp_of(&self, instance: &AppInstance) -> DateTime<Utc> {
        match self {
            Self::Heartbeat => instance.last_heartbeat,
            Self::ApiActivity => instance.last_api_activity,
        }
    }
}

/// Durable store of app instance records.
///
/// Writes happen inside named transactions so they can be attributed in
/// database telemetry.
pub trait InstanceStore: Send + Sync {
    /// Open a named transaction.
    fn begin<'a>(
        &'a self,
        kind: TransactionKind,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn StoreTransaction>>> + Send + 'a>>;

    /// Instances whose last heartbeat is at or after `since`.
    fn list_active(
        &self,
        since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<AppInstance>>> + Send + '_>>;
}

/// An open transaction against the instance store.
///
/// Dropping a transaction without calling [`StoreTransaction::commit`]
/// rolls it back.
pub trait StoreTransaction: Send {
    /// Insert the instance, or update it in place if the uuid exists.
    /// A stored `first_heartbeat` is never overwritten.
    fn upsert<'a>(
        &'a mut self,
        instance: &'a AppInstance,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Delete every instance with `last_heartbeat < cutoff`.
    fn delete_dead_app_instances(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>>;

    /// Count instances whose `liveness` timestamp is at or after `since`.
    fn count_active(
        &mut self,
        liveness: Liveness,
        since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>>;

    /// Region and node id of the database node serving this transaction.
    fn current_db_node_region(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<DbRegionInfo>> + Send + '_>>;

    /// Commit the transaction.
    fn commit(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}
