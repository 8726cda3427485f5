pub mod db;
pub mod directory;
pub mod heartbeat;
pub mod peer;
pub mod probe;
pub mod simulator;
pub mod store;
pub mod wake;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use db::Database;
pub use directory::HttpFleetDirectory;
pub use heartbeat::{HeartbeatService, HeartbeatState, LocalInstance, TickOutcome, TickReport};
pub use peer::{build_peer_url, ReqwestPeerClient};
pub use probe::SysinfoProbe;
pub use simulator::{DisabledSimulator, HttpSimulatorGateway};
pub use store::{PgInstanceStore, PgStoreTransaction};
pub use wake::{CoveragePlanner, DrainReport, PlanOutcome, WakeDrainer, WakeList};
