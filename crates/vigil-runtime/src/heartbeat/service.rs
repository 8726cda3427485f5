use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use vigil_core::config::HeartbeatConfig;
use vigil_core::error::Result;
use vigil_core::fleet::SimulatorGateway;
use vigil_core::instance::{AppInstance, InstanceStore, Liveness, StoreTransaction, TransactionKind};
use vigil_core::probe::{window_start, Clock, PerformanceProbe};

use super::local::LocalInstance;
use crate::wake::{DrainReport, WakeDrainer};

/// Name of the transaction each tick runs in.
pub const HEARTBEAT_TRANSACTION: &str = "sendHeartbeat";

/// Heartbeat state of this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    /// No tick has succeeded yet.
    Uninitialized,
    /// The last tick succeeded.
    Heartbeating,
    /// The last tick failed; further failures are not logged.
    FailingSilently,
}

/// What the idleness check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    /// This instance is in use (or never stops users); the wake list is drained.
    NotIdle,
    /// Idle, but no simulated workers are running.
    NoWorkers,
    /// Idle, but other instances still see user activity.
    FleetActive { active_instances: u64 },
    /// The whole fleet is idle and the simulator was stopped.
    StoppedWorkers { workers: u32 },
    /// Idle, but the simulator could not be reached. Retried next tick.
    SimulatorUnavailable,
}

/// Summary of a successful tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    /// Rows removed, when the purge ran.
    pub purged: Option<u64>,
    pub idle: IdleAction,
    /// Wake attempts, when the list was drained.
    pub drain: Option<DrainReport>,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Completed(TickReport),
    Failed {
        consecutive_failures: u32,
        /// Whether this failure was logged.
        logged: bool,
    },
}

/// Work done inside the heartbeat transaction.
struct HeartbeatBody {
    instance: AppInstance,
    purged: Option<u64>,
    /// Instances with recent API activity, counted only when this one is idle.
    idle_fleet_activity: Option<u64>,
}

/// Periodic heartbeat of the local instance.
///
/// Each tick records this process's liveness, purges dead peers every
/// `purge_frequency_secs`, stops simulated users when the whole fleet is idle
/// and otherwise wakes peers queued by the coverage planner.
pub struct HeartbeatService {
    store: Arc<dyn InstanceStore>,
    simulator: Arc<dyn SimulatorGateway>,
    probe: Arc<dyn PerformanceProbe>,
    clock: Arc<dyn Clock>,
    drainer: WakeDrainer,
    local: LocalInstance,
    config: HeartbeatConfig,
    seconds_until_next_purge: i64,
    consecutive_failure_count: u32,
    state: HeartbeatState,
}

impl HeartbeatService {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        simulator: Arc<dyn SimulatorGateway>,
        probe: Arc<dyn PerformanceProbe>,
        clock: Arc<dyn Clock>,
        drainer: WakeDrainer,
        local: LocalInstance,
        config: HeartbeatConfig,
    ) -> Self {
        Self {
            store,
            simulator,
            probe,
            clock,
            drainer,
            local,
            config,
            seconds_until_next_purge: 0,
            consecutive_failure_count: 0,
            state: HeartbeatState::Uninitialized,
        }
    }

    pub fn state(&self) -> HeartbeatState {
        self.state
    }

    pub fn consecutive_failure_count(&self) -> u32 {
        self.consecutive_failure_count
    }

    pub fn seconds_until_next_purge(&self) -> i64 {
        self.seconds_until_next_purge
    }

    pub fn local(&self) -> &LocalInstance {
        &self.local
    }

    /// Tick every `interval_secs` until `shutdown` turns true or its sender
    /// goes away. A slow tick delays the next one instead of overlapping it.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            instance = %self.local.id(),
            interval_secs = self.config.interval_secs,
            "Heartbeat loop starting"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Heartbeat loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one heartbeat. Never fails; failures are counted and the first of
    /// each run of failures is logged.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        self.seconds_until_next_purge = self
            .seconds_until_next_purge
            .saturating_sub(i64::try_from(self.config.interval_secs).unwrap_or(i64::MAX));

        let span = tracing::info_span!(
            "transaction",
            name = HEARTBEAT_TRANSACTION,
            kind = TransactionKind::ReadWrite.as_str()
        );
        let body = match self.run_transaction(now).instrument(span).await {
            Ok(body) => body,
            Err(e) => {
                self.consecutive_failure_count += 1;
                self.state = HeartbeatState::FailingSilently;
                let logged = self.consecutive_failure_count == 1;
                if logged {
                    tracing::error!(error = %e, "Unable to send heartbeat");
                }
                return TickOutcome::Failed {
                    consecutive_failures: self.consecutive_failure_count,
                    logged,
                };
            }
        };

        self.local.apply_heartbeat(&body.instance).await;
        if body.purged.is_some() {
            self.seconds_until_next_purge =
                i64::try_from(self.config.purge_frequency_secs).unwrap_or(i64::MAX);
        }

        // Simulator calls happen after commit so an unreachable simulator
        // never costs this instance its heartbeat.
        let idle = match body.idle_fleet_activity {
            Some(active_instances) => self.stop_idle_workload(active_instances).await,
            None => IdleAction::NotIdle,
        };

        let drain = match idle {
            IdleAction::NotIdle => Some(self.drainer.drain().await),
            _ => None,
        };

        if self.state == HeartbeatState::FailingSilently {
            tracing::info!(
                failures = self.consecutive_failure_count,
                "Heartbeat recovered"
            );
        }
        self.consecutive_failure_count = 0;
        self.state = HeartbeatState::Heartbeating;

        TickOutcome::Completed(TickReport {
            at: now,
            purged: body.purged,
            idle,
            drain,
        })
    }

    /// Open the heartbeat transaction, run the body and commit. Dropping the
    /// transaction on error rolls it back.
    async fn run_transaction(&self, now: DateTime<Utc>) -> Result<HeartbeatBody> {
        let mut tx = self
            .store
            .begin(TransactionKind::ReadWrite, HEARTBEAT_TRANSACTION)
            .await?;
        let body = self.send_heartbeat(tx.as_mut(), now).await?;
        tx.commit().await?;
        Ok(body)
    }

    async fn send_heartbeat(
        &self,
        tx: &mut dyn StoreTransaction,
        now: DateTime<Utc>,
    ) -> Result<HeartbeatBody> {
        let mut instance = self.local.snapshot().await;

        if instance.first_heartbeat.is_none() {
            instance.first_heartbeat = Some(now);
            instance.last_api_activity = now;
        }

        instance.cpu_utilization = self.probe.avg_cpu_utilization();
        instance.last_heartbeat = now;
        if !instance.region_override {
            let region = tx.current_db_node_region().await?;
            instance.region = region.region_name;
            instance.node_id = region.node_id;
        }
        tx.upsert(&instance).await?;

        let purged = if self.seconds_until_next_purge <= 0 {
            let cutoff = window_start(now, self.config.min_instance_purge_age())?;
            let deleted = tx.delete_dead_app_instances(cutoff).await?;
            if deleted > 0 {
                tracing::info!(deleted, "Purged app instances without recent heartbeats");
            }
            Some(deleted)
        } else {
            None
        };

        let idle_threshold = window_start(now, self.config.stop_users_after_idle())?;
        let idle_fleet_activity =
            if instance.stop_users_when_idle && instance.is_idle(idle_threshold) {
                Some(tx.count_active(Liveness::ApiActivity, idle_threshold).await?)
            } else {
                None
            };

        Ok(HeartbeatBody {
            instance,
            purged,
            idle_fleet_activity,
        })
    }

    /// Stop simulated users when nobody in the fleet is active. Simulator
    /// failures are logged and leave the workers running.
    async fn stop_idle_workload(&self, active_instances: u64) -> IdleAction {
        let workers = match self.simulator.active_worker_limit().await {
            Ok(workers) => workers,
            Err(e) => {
                tracing::warn!(error = %e, "Unable to query simulated workers");
                return IdleAction::SimulatorUnavailable;
            }
        };
        if workers == 0 {
            return IdleAction::NoWorkers;
        }
        if active_instances > 0 {
            return IdleAction::FleetActive { active_instances };
        }

        tracing::info!(
            workers,
            "Stopping all {} simulated users due to idle app instances",
            workers
        );
        if let Err(e) = self.simulator.stop_all().await {
            tracing::warn!(error = %e, "Unable to stop simulated users");
            return IdleAction::SimulatorUnavailable;
        }
        IdleAction::StoppedWorkers { workers }
    }
}
