//! Background synchronization with external collaborators.

pub mod stats;

pub use stats::{FetchRouteStats, FetchRouteStatsReqwest, StatsSync};
