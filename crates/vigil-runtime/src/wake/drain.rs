use std::sync::Arc;

use vigil_core::config::PeerConfig;
use vigil_core::error::PeerError;
use vigil_core::fleet::{DbConnInfoProvider, PeerClient, PeerUri};

use super::list::WakeList;
use crate::peer::build_peer_url;

/// Outcome of waking one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionWake {
    pub region: String,
    /// Peer that accepted the wake, if any.
    pub reached: Option<PeerUri>,
    /// Peers tried before (or instead of) the one reached.
    pub failures: Vec<(PeerUri, PeerError)>,
}

/// Outcome of one drain of the wake list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub regions: Vec<RegionWake>,
}

impl DrainReport {
    /// Total PUT attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.regions
            .iter()
            .map(|r| r.failures.len() + usize::from(r.reached.is_some()))
            .sum()
    }

    /// Regions where a peer accepted the wake.
    pub fn regions_reached(&self) -> usize {
        self.regions.iter().filter(|r| r.reached.is_some()).count()
    }

    pub fn region(&self, name: &str) -> Option<&RegionWake> {
        self.regions.iter().find(|r| r.region == name)
    }
}

/// Sends wake requests to the peers queued in the wake list.
pub struct WakeDrainer {
    wake_list: Arc<WakeList>,
    peer_client: Arc<dyn PeerClient>,
    conn_info: Arc<dyn DbConnInfoProvider>,
    config: PeerConfig,
}

impl WakeDrainer {
    pub fn new(
        wake_list: Arc<WakeList>,
        peer_client: Arc<dyn PeerClient>,
        conn_info: Arc<dyn DbConnInfoProvider>,
        config: PeerConfig,
    ) -> Self {
        Self {
            wake_list,
            peer_client,
            conn_info,
            config,
        }
    }

    /// Empty the wake list and try to wake one peer in each queued region.
    ///
    /// Never fails: a region where no peer answers is left for the next
    /// planning pass.
    pub async fn drain(&self) -> DrainReport {
        let targets = self.wake_list.take_all().await;
        if targets.is_empty() {
            return DrainReport::default();
        }

        let info = self.conn_info.db_conn_info();
        let mut regions: Vec<_> = targets.into_iter().collect();
        regions.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = DrainReport::default();
        for (region, uris) in regions {
            let mut wake = RegionWake {
                region: region.clone(),
                reached: None,
                failures: Vec::new(),
            };

            for uri in uris {
                let result = match build_peer_url(&uri, &self.config) {
                    Ok(url) => self.peer_client.put_conn_info(&url, &info).await,
                    Err(e) => Err(e),
                };

                match result {
                    Ok(()) => {
                        tracing::info!(peer = %uri, region = %region, "Contacted peer instance");
                        wake.reached = Some(uri);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            peer = %uri,
                            region = %region,
                            error = %e,
                            "Unable to contact peer instance"
                        );
                        wake.failures.push((uri, e));
                    }
                }
            }

            report.regions.push(wake);
        }

        report
    }
}
