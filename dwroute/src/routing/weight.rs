//! Final selection weight of a route.

use super::policy::RoutingPolicy;
use super::score::RouteScore;

/// Offset applied to the configured static weight before clamping at zero, so that the
/// conventional `[-10, ..]` weight range maps onto non-negative selection mass.
pub const STATIC_WEIGHT_OFFSET: i64 = 10;

/// `max(weight + 10, 0) * (base_weight_factor + value_score_factor * value_score) * health_multiplier`
///
/// Always finite and non-negative. A result of 0 keeps the route visible but never chosen
/// while a positively weighted peer exists in its tier.
pub fn final_weight(static_weight: i64, score: RouteScore, policy: &RoutingPolicy) -> f64 {
    let base = static_weight.saturating_add(STATIC_WEIGHT_OFFSET).max(0) as f64;
    let factor = policy.base_weight_factor + policy.value_score_factor * score.value_score;
    let weight = base * factor * score.health_multiplier;

    if weight.is_finite() && weight > 0.0 { weight } else { 0.0 }
}
