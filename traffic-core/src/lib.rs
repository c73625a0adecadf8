//! traffic-core: Proximity tracking of traffic targets around ownship.
//!
//! No async and no network, only the tracker, its geodesy, and config file
//! helpers. This crate is the shared core used by `traffic-server` (CLI +
//! web API) and by anything else that wants to feed target updates in.

pub mod buoy;
pub mod config;
pub mod geodesy;
pub mod store;
pub mod sweep;
pub mod tracker;
pub mod types;

// Re-export commonly used types at crate root
pub use buoy::{BuoyRequest, BuoySpeed, Placement};
pub use config::{Config, TrackerConfig};
pub use geodesy::{GeodeticSolver, Wgs84};
pub use store::TrafficSet;
pub use sweep::SweepReport;
pub use tracker::{Outcome, SharedTracker, TrackerStats, TrafficTracker};
pub use types::*;
