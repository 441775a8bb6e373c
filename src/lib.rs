//! Telemetry subscription and notification engine.
//!
//! Clients subscribe to a slice of a live data tree, either on a fixed
//! cadence (periodic) or whenever the slice mutates (on-change, dampened).
//! The crate owns subscription state, runs one scheduler or watcher per
//! subscription, applies subtree filters and hands composed notifications
//! to a [`Transport`].
//!
//! The data store, transport and filter evaluator are collaborators behind
//! the [`DataStore`], [`Transport`] and [`SubtreeFilter`] traits.

mod config;
mod errors;
mod filter;
mod model;
mod notification;
mod registry;
mod service;
mod store;
mod transport;
mod trigger;
mod utils;

pub mod constants;
pub mod metrics;

pub use config::*;
pub use errors::*;
pub use filter::*;
pub use model::*;
pub use notification::*;
pub use registry::*;
pub use service::*;
pub use store::*;
pub use transport::*;
pub use trigger::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
