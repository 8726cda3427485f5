use std::future::Future;
use std::pin::Pin;

use reqwest::Url;

use super::conn_info::DbConnInfo;
use super::region::RegionStats;
use crate::error::{PeerError, Result};

/// Per-region host statistics from the database control plane.
pub trait FleetDirectory: Send + Sync {
    fn region_stats(&self) -> Pin<Box<dyn Future<Output = Result<Vec<RegionStats>>> + Send + '_>>;
}

/// The workload simulator running beside the storefront.
pub trait SimulatorGateway: Send + Sync {
    /// Number of simulated workers currently allowed to run.
    fn active_worker_limit(&self) -> Pin<Box<dyn Future<Output = Result<u32>> + Send + '_>>;

    /// Stop every simulated worker.
    fn stop_all(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Client for the sync endpoint of a peer process.
pub trait PeerClient: Send + Sync {
    /// PUT `info` as JSON to `peer_url`. Anything but a 2xx reply is an error.
    fn put_conn_info<'a>(
        &'a self,
        peer_url: &'a Url,
        info: &'a DbConnInfo,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<(), PeerError>> + Send + 'a>>;
}
