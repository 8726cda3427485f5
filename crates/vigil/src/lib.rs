//! Vigil: keeps every database region of a multi-region storefront covered by
//! a live app instance.

mod runtime;
pub mod server;

pub use runtime::{Components, Vigil, VigilBuilder};
