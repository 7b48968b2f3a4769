//! Effective price computation for a pricing record under the group ratio table.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{GroupRatios, ModelPricing, ResolvedEndpoint, resolve_endpoints};
use crate::types::ProviderId;

/// Prompt price per million tokens for a model ratio of 1.
const PRICE_PER_MILLION_PER_RATIO: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    /// Charged by token volume
    Metered,
    /// Charged a flat amount per call
    FixedPrice,
}

/// Resolved price of a model for display and billing.
///
/// Exactly one side is populated: `per_call_price` for fixed-price models, the two token
/// prices for metered ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceQuote {
    pub model_name: String,
    #[schema(value_type = String, format = "uuid")]
    pub provider_id: ProviderId,
    pub billing_mode: BillingMode,
    pub eligible_groups: Vec<String>,
    /// Group the quote is priced under
    pub group: String,
    pub group_ratio: f64,
    pub per_call_price: Option<f64>,
    pub prompt_price_per_million: Option<f64>,
    pub completion_price_per_million: Option<f64>,
    pub endpoints: Vec<ResolvedEndpoint>,
}

impl PriceQuote {
    /// Amount charged for a single request with the given token volume.
    pub fn charge(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        match self.billing_mode {
            BillingMode::FixedPrice => self.per_call_price.unwrap_or(0.0),
            BillingMode::Metered => {
                let prompt = self.prompt_price_per_million.unwrap_or(0.0) * prompt_tokens as f64;
                let completion = self.completion_price_per_million.unwrap_or(0.0) * completion_tokens as f64;
                (prompt + completion) / 1_000_000.0
            }
        }
    }
}

/// Resolve the cheapest quote available for `pricing`.
///
/// The quote is priced under the eligible group with the smallest ratio; ties go to the group
/// listed first. Total over any input: degenerate ratios and empty group sets are normalized.
pub fn resolve_price(pricing: &ModelPricing, group_ratios: &GroupRatios) -> PriceQuote {
    let eligible = pricing.eligible_groups();

    let mut best_group = eligible[0];
    let mut best_ratio = group_ratios.ratio(best_group);
    for &group in &eligible[1..] {
        let ratio = group_ratios.ratio(group);
        if ratio < best_ratio {
            best_group = group;
            best_ratio = ratio;
        }
    }

    quote_for(pricing, &eligible, best_group, best_ratio)
}

/// Resolve the quote a caller in `group` pays, or `None` when the group may not use the model.
pub fn resolve_price_for_group(pricing: &ModelPricing, group_ratios: &GroupRatios, group: &str) -> Option<PriceQuote> {
    let eligible = pricing.eligible_groups();
    if !eligible.contains(&group) {
        return None;
    }
    Some(quote_for(pricing, &eligible, group, group_ratios.ratio(group)))
}

fn quote_for(pricing: &ModelPricing, eligible: &[&str], group: &str, ratio: f64) -> PriceQuote {
    let (billing_mode, per_call_price, prompt_price_per_million, completion_price_per_million) = if pricing.is_fixed_price() {
        (BillingMode::FixedPrice, Some(pricing.model_price * ratio), None, None)
    } else {
        let prompt = pricing.model_ratio * PRICE_PER_MILLION_PER_RATIO * ratio;
        let completion = prompt * pricing.effective_completion_ratio();
        (BillingMode::Metered, None, Some(prompt), Some(completion))
    };

    PriceQuote {
        model_name: pricing.model_name.clone(),
        provider_id: pricing.provider_id,
        billing_mode,
        eligible_groups: eligible.iter().map(|g| g.to_string()).collect(),
        group: group.to_string(),
        group_ratio: ratio,
        per_call_price,
        prompt_price_per_million,
        completion_price_per_million,
        endpoints: resolve_endpoints(&pricing.supported_endpoint_types, &pricing.model_name),
    }
}
