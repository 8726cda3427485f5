use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;

use vigil_core::error::Result;
use vigil_core::fleet::{FleetDirectory, RegionStats};
use vigil_core::instance::InstanceStore;
use vigil_core::probe::{window_start, Clock};

use super::list::{WakeList, WakeTargets};

/// Result of a planning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The fleet spans a single region, which this process already covers.
    SingleRegion,
    /// The wake list now holds exactly these regions (sorted).
    Planned { regions: Vec<String> },
}

/// Finds regions with database hosts but no live instance and queues their
/// hosts for waking.
pub struct CoveragePlanner {
    directory: Arc<dyn FleetDirectory>,
    store: Arc<dyn InstanceStore>,
    wake_list: Arc<WakeList>,
    clock: Arc<dyn Clock>,
    active_window: chrono::Duration,
}

impl CoveragePlanner {
    pub fn new(
        directory: Arc<dyn FleetDirectory>,
        store: Arc<dyn InstanceStore>,
        wake_list: Arc<WakeList>,
        clock: Arc<dyn Clock>,
        active_window: chrono::Duration,
    ) -> Self {
        Self {
            directory,
            store,
            wake_list,
            clock,
            active_window,
        }
    }

    /// Recompute the wake list from the current fleet state.
    ///
    /// The previous contents are replaced, never merged.
    pub async fn plan_wakeups(&self) -> Result<PlanOutcome> {
        let regions = self.directory.region_stats().await?;
        if regions.len() <= 1 {
            return Ok(PlanOutcome::SingleRegion);
        }

        let mut missing: HashMap<String, RegionStats> = regions
            .into_iter()
            .filter(RegionStats::is_used)
            .map(|stats| (stats.region.clone(), stats))
            .collect();

        let since = window_start(self.clock.now(), self.active_window)?;
        for instance in self.store.list_active(since).await? {
            missing.remove(&instance.region);
        }

        let targets: WakeTargets = missing
            .into_values()
            .map(|stats| (stats.region, stats.used_host_urls.into_iter().collect()))
            .collect();

        let mut planned: Vec<String> = targets.keys().cloned().collect();
        planned.sort();

        self.wake_list.replace(targets).await;

        if !planned.is_empty() {
            tracing::debug!(regions = ?planned, "Queued uncovered regions for wake");
        }
        Ok(PlanOutcome::Planned { regions: planned })
    }

    /// Run a planning pass in the background.
    pub fn spawn_plan_wakeups(self: &Arc<Self>) -> JoinHandle<()> {
        let planner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = planner.plan_wakeups().await {
                tracing::warn!(error = %e, "Failed to plan peer wakeups");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_core::config::InstanceConfig;
    use vigil_core::fleet::PeerUri;
    use vigil_core::instance::AppInstance;

    use crate::testing::{ManualClock, MemoryInstanceStore, StaticFleetDirectory};

    fn region(name: &str, urls: &[&str]) -> RegionStats {
        RegionStats {
            region: name.to_string(),
            used_host_count: urls.len() as u32,
            used_host_urls: urls.iter().map(|u| PeerUri::from(*u)).collect(),
        }
    }

    fn live_instance(region: &str, now: chrono::DateTime<Utc>) -> AppInstance {
        let mut instance = AppInstance::from_config(&InstanceConfig::default(), now);
        instance.region = region.to_string();
        instance.first_heartbeat = Some(now);
        instance
    }

    struct Fixture {
        planner: Arc<CoveragePlanner>,
        directory: StaticFleetDirectory,
        store: MemoryInstanceStore,
        wake_list: Arc<WakeList>,
        now: chrono::DateTime<Utc>,
    }

    fn fixture(regions: Vec<RegionStats>) -> Fixture {
        let now = Utc::now();
        let directory = StaticFleetDirectory::new(regions);
        let store = MemoryInstanceStore::new("US", 1);
        let wake_list = Arc::new(WakeList::new());
        let planner = Arc::new(CoveragePlanner::new(
            Arc::new(directory.clone()),
            Arc::new(store.clone()),
            wake_list.clone(),
            Arc::new(ManualClock::new(now)),
            chrono::Duration::seconds(30),
        ));
        Fixture {
            planner,
            directory,
            store,
            wake_list,
            now,
        }
    }

    #[tokio::test]
    async fn test_single_region_leaves_list_untouched() {
        let f = fixture(vec![region("US", &["http://us-1"])]);
        f.wake_list
            .replace(WakeTargets::from([(
                "EU".to_string(),
                [PeerUri::from("http://eu-1")].into_iter().collect(),
            )]))
            .await;

        let outcome = f.planner.plan_wakeups().await.unwrap();

        assert_eq!(outcome, PlanOutcome::SingleRegion);
        assert_eq!(f.wake_list.len().await, 1);
    }

    #[tokio::test]
    async fn test_uncovered_regions_are_queued() {
        let f = fixture(vec![
            region("US", &["http://us-1", "http://us-2"]),
            region("EU", &["http://eu-2", "http://eu-1"]),
            region("AP", &["http://ap-1", "http://ap-2"]),
        ]);
        f.store.insert(live_instance("US", f.now));

        let outcome = f.planner.plan_wakeups().await.unwrap();

        assert_eq!(
            outcome,
            PlanOutcome::Planned {
                regions: vec!["AP".to_string(), "EU".to_string()]
            }
        );
        let snapshot = f.wake_list.snapshot().await;
        let eu: Vec<&str> = snapshot["EU"].iter().map(|u| u.as_str()).collect();
        assert_eq!(eu, vec!["http://eu-1", "http://eu-2"]);
        assert!(!snapshot.contains_key("US"));
    }

    #[tokio::test]
    async fn test_regions_without_hosts_are_skipped() {
        let f = fixture(vec![
            region("US", &["http://us-1"]),
            region("EU", &[]),
        ]);
        f.store.insert(live_instance("US", f.now));

        f.planner.plan_wakeups().await.unwrap();
        assert!(f.wake_list.is_empty().await);
    }

    #[tokio::test]
    async fn test_stale_instances_do_not_cover_a_region() {
        let f = fixture(vec![
            region("US", &["http://us-1"]),
            region("EU", &["http://eu-1"]),
        ]);
        let mut stale = live_instance("EU", f.now);
        stale.last_heartbeat = f.now - chrono::Duration::seconds(120);
        f.store.insert(stale);

        f.planner.plan_wakeups().await.unwrap();

        let snapshot = f.wake_list.snapshot().await;
        assert!(snapshot.contains_key("EU"));
        assert!(snapshot.contains_key("US"));
    }

    #[tokio::test]
    async fn test_repeated_passes_are_identical() {
        let f = fixture(vec![
            region("US", &["http://us-1"]),
            region("EU", &["http://eu-2", "http://eu-1"]),
        ]);
        f.store.insert(live_instance("US", f.now));

        f.planner.plan_wakeups().await.unwrap();
        let first = f.wake_list.snapshot().await;
        f.planner.plan_wakeups().await.unwrap();
        let second = f.wake_list.snapshot().await;

        assert_eq!(first, second);
        assert_eq!(f.directory.calls(), 2);
    }

    #[tokio::test]
    async fn test_newer_snapshot_replaces_older() {
        let f = fixture(vec![
            region("US", &["http://us-1"]),
            region("EU", &["http://eu-1"]),
        ]);
        f.store.insert(live_instance("US", f.now));
        f.planner.plan_wakeups().await.unwrap();
        assert!(f.wake_list.snapshot().await.contains_key("EU"));

        f.store.insert(live_instance("EU", f.now));
        f.planner.plan_wakeups().await.unwrap();
        assert!(f.wake_list.is_empty().await);
    }

    #[tokio::test]
    async fn test_spawned_pass_fills_list() {
        let f = fixture(vec![
            region("US", &["http://us-1"]),
            region("EU", &["http://eu-1"]),
        ]);
        f.store.insert(live_instance("US", f.now));

        f.planner.spawn_plan_wakeups().await.unwrap();
        assert_eq!(f.wake_list.len().await, 1);
    }
}
