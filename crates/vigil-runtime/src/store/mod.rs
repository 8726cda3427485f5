mod postgres;

pub use postgres::{PgInstanceStore, PgStoreTransaction};
