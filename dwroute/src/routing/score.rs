//! Usage and health aggregation.
//!
//! Turns windowed request statistics into two per-route figures consumed by the weight
//! calculator:
//!
//! - a **value score** in `[0, 1]`: the route's cost efficiency relative to the best route
//!   competing for the same model, and
//! - a **health multiplier**: a bounded penalty/reward derived from recent failures.
//!
//! Missing statistics are never an error; they read as zero counts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::policy::RoutingPolicy;
use crate::types::{ProviderTokenId, RouteKey};

/// Windowed statistics for one route, supplied by the telemetry collaborator.
///
/// Usage fields cover `usage_window_hours`; outcome counts cover `health_window_hours`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RouteStats {
    pub model_name: String,
    #[schema(value_type = String, format = "uuid")]
    pub provider_token_id: ProviderTokenId,
    pub request_count: u64,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub success_count: u64,
    pub failure_count: u64,
}

impl RouteStats {
    pub fn key(&self) -> RouteKey {
        RouteKey::new(self.model_name.clone(), self.provider_token_id)
    }

    /// Requests served per unit of cost.
    ///
    /// Cost is offset by one so free routes keep a finite figure; a route with no requests
    /// scores zero.
    pub fn cost_efficiency(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        let cost = if self.total_cost.is_finite() { self.total_cost.max(0.0) } else { 0.0 };
        self.request_count as f64 / (1.0 + cost)
    }
}

/// Statistics indexed by route, as published in a snapshot.
#[derive(Debug, Clone, Default)]
pub struct StatsIndex {
    by_route: HashMap<RouteKey, RouteStats>,
}

impl StatsIndex {
    /// Index `stats`; later entries for the same route replace earlier ones.
    pub fn new(stats: impl IntoIterator<Item = RouteStats>) -> Self {
        Self {
            by_route: stats.into_iter().map(|s| (s.key(), s)).collect(),
        }
    }

    pub fn get(&self, key: &RouteKey) -> Option<&RouteStats> {
        self.by_route.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_route.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_route.is_empty()
    }
}

/// Maps a raw cost-efficiency figure onto `[0, 1]` relative to the best competing figure.
pub trait ValueNormalizer: Send + Sync {
    /// `max_raw` is the largest raw figure among competing routes. Implementations must return
    /// 0 when `max_raw` is not positive.
    fn normalize(&self, raw: f64, max_raw: f64) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinearNormalizer;

impl ValueNormalizer for LinearNormalizer {
    fn normalize(&self, raw: f64, max_raw: f64) -> f64 {
        if max_raw <= 0.0 || raw <= 0.0 {
            return 0.0;
        }
        (raw / max_raw).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNormalizer;

impl ValueNormalizer for LogNormalizer {
    fn normalize(&self, raw: f64, max_raw: f64) -> f64 {
        if max_raw <= 0.0 || raw <= 0.0 {
            return 0.0;
        }
        (raw.ln_1p() / max_raw.ln_1p()).clamp(0.0, 1.0)
    }
}

/// Output of the aggregator for one route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouteScore {
    pub value_score: f64,
    pub health_multiplier: f64,
}

impl Default for RouteScore {
    fn default() -> Self {
        Self {
            value_score: 0.0,
            health_multiplier: 1.0,
        }
    }
}

/// Score one route against the statistics of every route competing for the same model.
///
/// `competing` may or may not include `stats` itself; the maximum is taken over both.
pub fn score(stats: Option<&RouteStats>, competing: &[&RouteStats], policy: &RoutingPolicy) -> RouteScore {
    let raw = stats.map_or(0.0, RouteStats::cost_efficiency);
    let max_raw = competing.iter().map(|s| s.cost_efficiency()).fold(raw, f64::max);

    RouteScore {
        value_score: policy.value_normalization.normalizer().normalize(raw, max_raw),
        health_multiplier: health_multiplier(stats, policy),
    }
}

/// Health multiplier for a route.
///
/// Exactly 1.0 when health adjustment is disabled or the route has fewer than
/// `health_min_samples` outcomes; otherwise
/// `1 - alpha * failure_rate + beta * (1 - failure_rate)` clamped to the policy bounds.
pub fn health_multiplier(stats: Option<&RouteStats>, policy: &RoutingPolicy) -> f64 {
    if !policy.health_adjustment_enabled {
        return 1.0;
    }
    let (successes, failures) = stats.map_or((0, 0), |s| (s.success_count, s.failure_count));
    let samples = successes.saturating_add(failures);
    if samples < u64::from(policy.health_min_samples) {
        return 1.0;
    }

    let failure_rate = failures as f64 / samples as f64;
    let raw = 1.0 - policy.failure_penalty_alpha * failure_rate + policy.health_reward_beta * (1.0 - failure_rate);
    // max/min rather than clamp: clamp panics if the bounds ever arrive inverted
    raw.max(policy.health_min_multiplier).min(policy.health_max_multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::policy::ValueNormalization;
    use uuid::Uuid;

    fn stats(requests: u64, cost: f64, successes: u64, failures: u64) -> RouteStats {
        RouteStats {
            model_name: "gpt".to_string(),
            provider_token_id: Uuid::new_v4(),
            request_count: requests,
            total_cost: cost,
            total_tokens: requests * 1000,
            success_count: successes,
            failure_count: failures,
        }
    }

    #[test]
    fn test_value_score_is_relative_to_best_route() {
        let policy = RoutingPolicy::default();
        let cheap = stats(100, 9.0, 0, 0); // 10 per unit
        let pricey = stats(100, 49.0, 0, 0); // 2 per unit
        let competing = [&cheap, &pricey];

        assert_eq!(score(Some(&cheap), &competing, &policy).value_score, 1.0);
        assert!((score(Some(&pricey), &competing, &policy).value_score - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_zero_requests_score_zero() {
        let policy = RoutingPolicy::default();
        let idle = stats(0, 0.0, 0, 0);
        let busy = stats(10, 1.0, 0, 0);

        assert_eq!(score(Some(&idle), &[&idle, &busy], &policy).value_score, 0.0);
        assert_eq!(score(None, &[&busy], &policy).value_score, 0.0);
    }

    #[test]
    fn test_all_idle_routes_score_zero_without_dividing_by_zero() {
        for normalization in [ValueNormalization::Linear, ValueNormalization::Logarithmic] {
            let policy = RoutingPolicy {
                value_normalization: normalization,
                ..Default::default()
            };
            let a = stats(0, 0.0, 0, 0);
            let b = stats(0, 5.0, 0, 0);
            let s = score(Some(&a), &[&a, &b], &policy);
            assert_eq!(s.value_score, 0.0);
            assert!(s.value_score.is_finite());
        }
    }

    #[test]
    fn test_log_normalization_stays_in_unit_interval() {
        let policy = RoutingPolicy {
            value_normalization: ValueNormalization::Logarithmic,
            ..Default::default()
        };
        let best = stats(10_000, 0.0, 0, 0);
        let worst = stats(1, 100.0, 0, 0);
        let competing = [&best, &worst];

        let best_score = score(Some(&best), &competing, &policy).value_score;
        let worst_score = score(Some(&worst), &competing, &policy).value_score;
        assert_eq!(best_score, 1.0);
        assert!(worst_score > 0.0 && worst_score < 1.0);
    }

    #[test]
    fn test_health_disabled_is_exactly_one() {
        let policy = RoutingPolicy {
            health_adjustment_enabled: false,
            ..Default::default()
        };
        assert_eq!(health_multiplier(Some(&stats(100, 1.0, 0, 100)), &policy), 1.0);
        assert_eq!(health_multiplier(None, &policy), 1.0);
    }

    #[test]
    fn test_health_under_sampled_is_exactly_one() {
        let policy = RoutingPolicy {
            health_min_samples: 20,
            ..Default::default()
        };
        assert_eq!(health_multiplier(Some(&stats(19, 1.0, 0, 19)), &policy), 1.0);
        assert_eq!(health_multiplier(None, &policy), 1.0);
        assert_ne!(health_multiplier(Some(&stats(20, 1.0, 0, 20)), &policy), 1.0);
    }

    #[test]
    fn test_health_formula_and_clamps() {
        let policy = RoutingPolicy {
            failure_penalty_alpha: 2.0,
            health_reward_beta: 0.5,
            health_min_multiplier: 0.2,
            health_max_multiplier: 1.3,
            health_min_samples: 10,
            ..Default::default()
        };

        // failure_rate 0.25: 1 - 0.5 + 0.375
        let m = health_multiplier(Some(&stats(0, 0.0, 15, 5)), &policy);
        assert!((m - 0.875).abs() < 1e-12);

        // failure_rate 0: 1.5 clamps to 1.3
        assert_eq!(health_multiplier(Some(&stats(0, 0.0, 50, 0)), &policy), 1.3);

        // failure_rate 1: -1 clamps to 0.2
        assert_eq!(health_multiplier(Some(&stats(0, 0.0, 0, 50)), &policy), 0.2);
    }

    #[test]
    fn test_health_always_within_bounds_once_sampled() {
        let policy = RoutingPolicy {
            failure_penalty_alpha: 7.5,
            health_reward_beta: 1.5,
            health_min_multiplier: 0.3,
            health_max_multiplier: 2.0,
            health_min_samples: 5,
            ..Default::default()
        };
        for failures in 0..=40u64 {
            let m = health_multiplier(Some(&stats(0, 0.0, 40 - failures, failures)), &policy);
            assert!((0.3..=2.0).contains(&m), "multiplier {m} out of bounds for {failures} failures");
        }
    }

    #[test]
    fn test_stats_index_last_entry_wins() {
        let mut first = stats(1, 0.0, 0, 0);
        let mut second = first.clone();
        second.request_count = 7;
        first.model_name = "gpt".to_string();

        let index = StatsIndex::new(vec![first.clone(), second]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&first.key()).unwrap().request_count, 7);
    }
}
