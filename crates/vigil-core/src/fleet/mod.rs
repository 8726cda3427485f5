mod conn_info;
mod region;
mod traits;

pub use conn_info::{DbConnInfo, DbConnInfoProvider};
pub use region::{PeerUri, RegionStats};
pub use traits::{FleetDirectory, PeerClient, SimulatorGateway};
