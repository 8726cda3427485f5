mod local;
mod service;

pub use local::LocalInstance;
pub use service::{
    HeartbeatService, HeartbeatState, IdleAction, TickOutcome, TickReport, HEARTBEAT_TRANSACTION,
};
