pub mod config;
pub mod error;
pub mod fleet;
pub mod instance;
pub mod probe;

pub use config::VigilConfig;
pub use error::{PeerError, Result, VigilError};
pub use fleet::{
    DbConnInfo, DbConnInfoProvider, FleetDirectory, PeerClient, PeerUri, RegionStats,
    SimulatorGateway,
};
pub use instance::{
    AppInstance, DbRegionInfo, InstanceId, InstanceStore, Liveness, StoreTransaction,
    TransactionKind,
};
pub use probe::{window_start, Clock, PerformanceProbe, SystemClock};
