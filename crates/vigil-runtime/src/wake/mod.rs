mod drain;
mod list;
mod planner;

pub use drain::{DrainReport, RegionWake, WakeDrainer};
pub use list::{WakeList, WakeTargets};
pub use planner::{CoveragePlanner, PlanOutcome};
