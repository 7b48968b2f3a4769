use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Acknowledgement of a statistics push.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatsApplied {
    /// Distinct routes the statistics cover
    pub applied: usize,
    /// Snapshot version after reweighing
    pub version: u64,
}
