//! Tunable numeric policy driving route weighting.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::score::{LinearNormalizer, LogNormalizer, ValueNormalizer};
use crate::errors::{Error, Result};

/// Strategy used to map raw cost-efficiency figures onto `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueNormalization {
    /// `raw / max_raw`
    #[default]
    Linear,
    /// `ln(1 + raw) / ln(1 + max_raw)`, compressing large gaps between routes
    Logarithmic,
}

impl ValueNormalization {
    pub fn normalizer(&self) -> &'static dyn ValueNormalizer {
        match self {
            Self::Linear => &LinearNormalizer,
            Self::Logarithmic => &LogNormalizer,
        }
    }
}

/// Global routing policy. Read by the engine as one immutable snapshot.
///
/// Bounds are enforced by [`RoutingPolicy::validate`] at the API and config boundary; the
/// scoring code assumes a validated policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingPolicy {
    /// Window over which usage and cost are aggregated (1-720)
    pub usage_window_hours: u32,
    /// Weight contribution independent of value score (0-10)
    pub base_weight_factor: f64,
    /// Weight contribution per unit of value score (0-10)
    pub value_score_factor: f64,
    pub value_normalization: ValueNormalization,
    /// Whether failure history adjusts route weights
    pub health_adjustment_enabled: bool,
    /// Window over which successes and failures are counted (1-720)
    pub health_window_hours: u32,
    /// Penalty per unit of failure rate (0-20)
    pub failure_penalty_alpha: f64,
    /// Reward per unit of success rate (0-2)
    pub health_reward_beta: f64,
    /// Lower clamp of the health multiplier (0-10)
    pub health_min_multiplier: f64,
    /// Upper clamp of the health multiplier (0-10, at least the lower clamp)
    pub health_max_multiplier: f64,
    /// Samples required before the health multiplier departs from 1 (1-1000)
    pub health_min_samples: u32,
    /// Assigned by the engine on every accepted update; submitted values are ignored
    pub version: u64,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            usage_window_hours: 24,
            base_weight_factor: 1.0,
            value_score_factor: 1.0,
            value_normalization: ValueNormalization::default(),
            health_adjustment_enabled: true,
            health_window_hours: 1,
            failure_penalty_alpha: 4.0,
            health_reward_beta: 0.2,
            health_min_multiplier: 0.1,
            health_max_multiplier: 1.2,
            health_min_samples: 10,
            version: 0,
        }
    }
}

fn check_range<T: PartialOrd + std::fmt::Display + Copy>(field: &str, value: T, min: T, max: T) -> Result<()> {
    // Written as a negated containment check so NaN is rejected
    if !(value >= min && value <= max) {
        return Err(Error::BadRequest {
            message: format!("{field} must be between {min} and {max}, got {value}"),
        });
    }
    Ok(())
}

impl RoutingPolicy {
    /// Validate every field against its bounds.
    pub fn validate(&self) -> Result<()> {
        check_range("usage_window_hours", self.usage_window_hours, 1, 720)?;
        check_range("base_weight_factor", self.base_weight_factor, 0.0, 10.0)?;
        check_range("value_score_factor", self.value_score_factor, 0.0, 10.0)?;
        check_range("health_window_hours", self.health_window_hours, 1, 720)?;
        check_range("failure_penalty_alpha", self.failure_penalty_alpha, 0.0, 20.0)?;
        check_range("health_reward_beta", self.health_reward_beta, 0.0, 2.0)?;
        check_range("health_min_multiplier", self.health_min_multiplier, 0.0, 10.0)?;
        check_range("health_max_multiplier", self.health_max_multiplier, 0.0, 10.0)?;
        check_range("health_min_samples", self.health_min_samples, 1, 1000)?;

        if self.health_min_multiplier > self.health_max_multiplier {
            return Err(Error::BadRequest {
                message: format!(
                    "health_min_multiplier ({}) cannot be greater than health_max_multiplier ({})",
                    self.health_min_multiplier, self.health_max_multiplier
                ),
            });
        }
        Ok(())
    }
}
