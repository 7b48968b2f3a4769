//! API request models for price quotes.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Query parameters for price quotes
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct PricingQuery {
    /// Price for this group instead of the cheapest eligible one. Records the group may not use
    /// are omitted.
    pub group: Option<String>,
}
