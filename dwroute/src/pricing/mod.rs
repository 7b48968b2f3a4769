//! Model pricing records, group price multipliers, and the price resolver.
//!
//! A [`ModelPricing`] row describes how one provider bills one model. Combined with the
//! [`GroupRatios`] table it resolves into a [`PriceQuote`]: the billing mode, the groups
//! allowed to use the model, the cheapest of those groups, and the effective prices under it.

mod endpoints;
mod resolver;

pub use endpoints::{DEFAULT_ENDPOINT_TYPE, ResolvedEndpoint, resolve_endpoints};
pub use resolver::{BillingMode, PriceQuote, resolve_price, resolve_price_for_group};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{DEFAULT_GROUP, ProviderId, deserialize_list};

/// `quota_type` value marking a fixed-price (per-call) model.
pub const QUOTA_TYPE_FIXED_PRICE: i32 = 1;

/// Pricing of one model as served by one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ModelPricing {
    #[schema(value_type = String, format = "uuid")]
    pub provider_id: ProviderId,
    pub model_name: String,
    /// Prompt-token multiplier; a ratio of 1 is 2 currency units per million tokens
    #[serde(default)]
    pub model_ratio: f64,
    /// Completion-to-prompt price ratio, treated as 1 when not positive
    #[serde(default)]
    pub completion_ratio: f64,
    /// Flat price per call; 0 means the model is not fixed-price
    #[serde(default)]
    pub model_price: f64,
    /// 0 = metered, 1 = fixed-price
    #[serde(default)]
    pub quota_type: i32,
    /// Groups allowed to use this model. Empty behaves as `["default"]`.
    #[serde(default, deserialize_with = "deserialize_list")]
    pub enable_groups: Vec<String>,
    /// Endpoint type tags, in display order. Empty behaves as the default chat endpoint.
    #[serde(default, deserialize_with = "deserialize_list")]
    pub supported_endpoint_types: Vec<String>,
}

impl ModelPricing {
    /// A record is fixed-price when flagged as such or when it carries a per-call price.
    pub fn is_fixed_price(&self) -> bool {
        self.quota_type == QUOTA_TYPE_FIXED_PRICE || self.model_price > 0.0
    }

    /// Groups allowed to use this model, with the empty set normalized to `default`.
    pub fn eligible_groups(&self) -> Vec<&str> {
        if self.enable_groups.is_empty() {
            vec![DEFAULT_GROUP]
        } else {
            self.enable_groups.iter().map(String::as_str).collect()
        }
    }

    pub fn is_group_eligible(&self, group: &str) -> bool {
        self.eligible_groups().contains(&group)
    }

    /// Completion ratio actually applied to metered prices.
    pub fn effective_completion_ratio(&self) -> f64 {
        if self.completion_ratio > 0.0 { self.completion_ratio } else { 1.0 }
    }

    /// Checks the numeric invariants. Used at ingestion, before a record reaches a snapshot.
    pub fn validate(&self) -> Result<(), String> {
        if self.model_name.trim().is_empty() {
            return Err("model_name must not be empty".to_string());
        }
        for (field, value) in [
            ("model_ratio", self.model_ratio),
            ("completion_ratio", self.completion_ratio),
            ("model_price", self.model_price),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{field} for model '{}' must be a non-negative number, got {value}", self.model_name));
            }
        }
        Ok(())
    }
}

/// Per-group price multipliers.
///
/// Lookups never fail: a group that is missing, or configured with a non-positive or
/// non-finite ratio, prices at 1.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct GroupRatios(BTreeMap<String, f64>);

impl GroupRatios {
    /// Effective multiplier for `group`.
    pub fn ratio(&self, group: &str) -> f64 {
        match self.0.get(group) {
            Some(&ratio) if ratio.is_finite() && ratio > 0.0 => ratio,
            _ => 1.0,
        }
    }

    /// Reject negative or non-finite ratios. Zero is accepted and prices at 1.
    pub fn validate(&self) -> Result<(), String> {
        for (group, ratio) in &self.0 {
            if !ratio.is_finite() || *ratio < 0.0 {
                return Err(format!("group ratio for '{group}' must be a non-negative number, got {ratio}"));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for GroupRatios {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
