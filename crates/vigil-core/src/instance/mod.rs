mod app_instance;
mod store;

pub use app_instance::{AppInstance, DbRegionInfo, InstanceId};
pub use store::{InstanceStore, Liveness, StoreTransaction, TransactionKind};
