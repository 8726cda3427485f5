//! In-memory collaborators for exercising the heartbeat without a database,
//! control plane or peers.
//!
//! Every double is a cheap clonable handle, so a test can hand one clone to
//! the code under test and keep another to inspect what happened.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use reqwest::Url;

use vigil_core::error::{PeerError, Result, VigilError};
use vigil_core::fleet::{DbConnInfo, FleetDirectory, PeerClient, RegionStats, SimulatorGateway};
use vigil_core::instance::{
    AppInstance, DbRegionInfo, InstanceId, InstanceStore, Liveness, StoreTransaction,
    TransactionKind,
};
use vigil_core::probe::{Clock, PerformanceProbe};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct StoreState {
    instances: BTreeMap<InstanceId, AppInstance>,
    region: DbRegionInfo,
    failing_begins: u32,
    transactions: Vec<(TransactionKind, String)>,
    region_queries: u32,
}

/// Instance store kept in memory. Transactions stage changes on a copy and
/// publish them on commit.
#[derive(Debug, Clone)]
pub struct MemoryInstanceStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryInstanceStore {
    /// Create an empty store whose database node reports `region`.
    pub fn new(region: impl Into<String>, node_id: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                instances: BTreeMap::new(),
                region: DbRegionInfo {
                    region_name: region.into(),
                    node_id,
                },
                failing_begins: 0,
                transactions: Vec::new(),
                region_queries: 0,
            })),
        }
    }

    /// Insert or replace a record directly.
    pub fn insert(&self, instance: AppInstance) {
        locked(&self.state)
            .instances
            .insert(instance.uuid, instance);
    }

    /// Look up a record.
    pub fn get(&self, id: InstanceId) -> Option<AppInstance> {
        locked(&self.state).instances.get(&id).cloned()
    }

    /// Make the next `count` transactions fail to start.
    pub fn fail_next_transactions(&self, count: u32) {
        locked(&self.state).failing_begins = count;
    }

    /// Change the region reported for the database node.
    pub fn set_db_region(&self, region: impl Into<String>, node_id: i64) {
        locked(&self.state).region = DbRegionInfo {
            region_name: region.into(),
            node_id,
        };
    }

    /// Transactions started so far, by kind and name.
    pub fn transactions(&self) -> Vec<(TransactionKind, String)> {
        locked(&self.state).transactions.clone()
    }

    /// Number of times the database node region was queried.
    pub fn region_queries(&self) -> u32 {
        locked(&self.state).region_queries
    }
}

impl InstanceStore for MemoryInstanceStore {
    fn begin<'a>(
        &'a self,
        kind: TransactionKind,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn StoreTransaction>>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.transactions.push((kind, name.to_string()));
            if state.failing_begins > 0 {
                state.failing_begins -= 1;
                return Err(VigilError::Database("connection refused".into()));
            }

            Ok(Box::new(MemoryTransaction {
                store: self.clone(),
                staged: state.instances.clone(),
                region: state.region.clone(),
                kind,
            }) as Box<dyn StoreTransaction>)
        })
    }

    fn list_active(
        &self,
        since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<AppInstance>>> + Send + '_>> {
        Box::pin(async move {
            Ok(locked(&self.state)
                .instances
                .values()
                .filter(|i| i.is_alive_since(since))
                .cloned()
                .collect())
        })
    }
}

struct MemoryTransaction {
    store: MemoryInstanceStore,
    staged: BTreeMap<InstanceId, AppInstance>,
    region: DbRegionInfo,
    kind: TransactionKind,
}

impl MemoryTransaction {
    fn writable(&self) -> Result<()> {
        match self.kind {
            TransactionKind::ReadWrite => Ok(()),
            TransactionKind::ReadOnly => Err(VigilError::Database(
                "cannot write in a read-only transaction".into(),
            )),
        }
    }
}

impl StoreTransaction for MemoryTransaction {
    fn upsert<'a>(
        &'a mut self,
        instance: &'a AppInstance,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.writable()?;
            let mut record = instance.clone();
            if let Some(existing) = self.staged.get(&instance.uuid) {
                record.first_heartbeat = existing.first_heartbeat.or(record.first_heartbeat);
            }
            self.staged.insert(record.uuid, record);
            Ok(())
        })
    }

    fn delete_dead_app_instances(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(async move {
            self.writable()?;
            let before = self.staged.len();
            self.staged.retain(|_, i| i.last_heartbeat >= cutoff);
            Ok((before - self.staged.len()) as u64)
        })
    }

    fn count_active(
        &mut self,
        liveness: Liveness,
        since: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(async move {
            Ok(self
                .staged
                .values()
                .filter(|i| liveness.timestamp_of(i) >= since)
                .count() as u64)
        })
    }

    fn current_db_node_region(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<DbRegionInfo>> + Send + '_>> {
        Box::pin(async move {
            locked(&self.store.state).region_queries += 1;
            Ok(self.region.clone())
        })
    }

    fn commit(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        let this = *self;
        Box::pin(async move {
            locked(&this.store.state).instances = this.staged;
            Ok(())
        })
    }
}

/// Fleet directory returning a fixed set of regions.
#[derive(Debug, Clone, Default)]
pub struct StaticFleetDirectory {
    regions: Arc<Mutex<Vec<RegionStats>>>,
    calls: Arc<AtomicU32>,
}

impl StaticFleetDirectory {
    pub fn new(regions: Vec<RegionStats>) -> Self {
        Self {
            regions: Arc::new(Mutex::new(regions)),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FleetDirectory for StaticFleetDirectory {
    fn region_stats(&self) -> Pin<Box<dyn Future<Output = Result<Vec<RegionStats>>> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(locked(&self.regions).clone())
        })
    }
}

/// Simulator that counts stop requests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSimulator {
    workers: Arc<AtomicU32>,
    worker_queries: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
    unavailable: Arc<AtomicBool>,
}

impl RecordingSimulator {
    pub fn with_workers(workers: u32) -> Self {
        Self {
            workers: Arc::new(AtomicU32::new(workers)),
            ..Default::default()
        }
    }

    /// Make every call fail as if the admin API were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VigilError::Simulator("connection refused".into()));
        }
        Ok(())
    }

    pub fn worker_queries(&self) -> u32 {
        self.worker_queries.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SimulatorGateway for RecordingSimulator {
    fn active_worker_limit(&self) -> Pin<Box<dyn Future<Output = Result<u32>> + Send + '_>> {
        Box::pin(async move {
            self.worker_queries.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;
            Ok(self.workers.load(Ordering::SeqCst))
        })
    }

    fn stop_all(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.check_available()?;
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.workers.store(0, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Peer client that answers from a table keyed by host and records every call.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPeerClient {
    failures: Arc<Mutex<HashMap<String, PeerError>>>,
    calls: Arc<Mutex<Vec<Url>>>,
}

impl ScriptedPeerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request to `host` fail with `error`.
    pub fn fail_host(&self, host: impl Into<String>, error: PeerError) {
        locked(&self.failures).insert(host.into(), error);
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<Url> {
        locked(&self.calls).clone()
    }
}

impl PeerClient for ScriptedPeerClient {
    fn put_conn_info<'a>(
        &'a self,
        peer_url: &'a Url,
        _info: &'a DbConnInfo,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<(), PeerError>> + Send + 'a>> {
        Box::pin(async move {
            locked(&self.calls).push(peer_url.clone());
            let host = peer_url.host_str().unwrap_or_default();
            match locked(&self.failures).get(host) {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        })
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *locked(&self.now) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *locked(&self.now)
    }
}

/// Probe reporting a constant utilization.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub f32);

impl PerformanceProbe for FixedProbe {
    fn avg_cpu_utilization(&self) -> f32 {
        self.0
    }
}
