use std::collections::{BTreeSet, HashMap};

use tokio::sync::Mutex;

use vigil_core::fleet::PeerUri;

/// Region name to candidate peers, walked in URI order.
pub type WakeTargets = HashMap<String, BTreeSet<PeerUri>>;

/// Regions that need a peer woken, shared by the planner and the heartbeat.
///
/// The lock is only held while the map is swapped or copied; callers never
/// see the map itself.
#[derive(Debug, Default)]
pub struct WakeList {
    targets: Mutex<WakeTargets>,
}

impl WakeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a newer snapshot.
    pub async fn replace(&self, targets: WakeTargets) {
        *self.targets.lock().await = targets;
    }

    /// Take every target, leaving the list empty.
    pub async fn take_all(&self) -> WakeTargets {
        std::mem::take(&mut *self.targets.lock().await)
    }

    /// Copy of the current targets.
    pub async fn snapshot(&self) -> WakeTargets {
        self.targets.lock().await.clone()
    }

    /// Number of regions waiting for a wake.
    pub async fn len(&self) -> usize {
        self.targets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.targets.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(entries: &[(&str, &[&str])]) -> WakeTargets {
        entries
            .iter()
            .map(|(region, uris)| {
                (
                    region.to_string(),
                    uris.iter().map(|u| PeerUri::from(*u)).collect(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_take_all_empties_list() {
        let list = WakeList::new();
        list.replace(targets(&[("EU", &["http://eu-1"])])).await;

        let taken = list.take_all().await;
        assert_eq!(taken.len(), 1);
        assert!(list.is_empty().await);
        assert!(list.take_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_replace_discards_previous_targets() {
        let list = WakeList::new();
        list.replace(targets(&[("EU", &["http://eu-1"]), ("AP", &["http://ap-1"])]))
            .await;
        list.replace(targets(&[("AP", &["http://ap-2"])])).await;

        let snapshot = list.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("AP"));
        assert!(!snapshot.contains_key("EU"));
        assert_eq!(list.len().await, 1);
    }

    #[tokio::test]
    async fn test_uris_are_ordered() {
        let list = WakeList::new();
        list.replace(targets(&[("EU", &["http://eu-b", "http://eu-a"])]))
            .await;

        let snapshot = list.snapshot().await;
        let uris: Vec<&str> = snapshot["EU"].iter().map(|u| u.as_str()).collect();
        assert_eq!(uris, vec!["http://eu-a", "http://eu-b"]);
    }
}
