//! Priority-tiered weighted random route selection.
//!
//! Candidates are filtered to enabled routes whose token may serve the model, grouped by
//! ascending priority, and a route is drawn from the first non-empty tier in proportion to its
//! final weight. A tier whose weights are all zero falls back to a uniform draw, so a model is
//! only unroutable when it has no eligible candidates at all.

use rand::Rng;
use rand::prelude::RngExt;
use thiserror::Error;

use super::table::WeightedRoute;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no upstream available for model {model}")]
pub struct NoRouteAvailable {
    pub model: String,
}

/// Routes of one priority level, with prefix sums of their final weights.
#[derive(Debug, Clone, PartialEq)]
struct Tier {
    priority: i64,
    /// Indices into the route slice the selection was built from
    members: Vec<usize>,
    cumulative: Vec<f64>,
}

impl Tier {
    fn total(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let total = self.total();
        let position = if total > 0.0 && total.is_finite() {
            let x = rng.random_range(0.0..total);
            // First prefix sum strictly above x; zero-weight members are never landed on
            self.cumulative.partition_point(|&c| c <= x).min(self.members.len() - 1)
        } else {
            rng.random_range(0..self.members.len())
        };
        self.members[position]
    }
}

/// Precomputed selection structure for the routes of one model.
///
/// Built once per snapshot publish; drawing is a binary search over the top tier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TieredSelection {
    tiers: Vec<Tier>,
}

impl TieredSelection {
    /// Index the routes in `routes` that are eligible to serve `model`.
    pub fn build(model: &str, routes: &[WeightedRoute]) -> Self {
        let mut eligible: Vec<usize> = (0..routes.len()).filter(|&i| routes[i].is_selectable_for(model)).collect();
        // Stable sort keeps catalog order within a tier
        eligible.sort_by_key(|&i| routes[i].route.priority);

        let tiers = eligible
            .chunk_by(|&a, &b| routes[a].route.priority == routes[b].route.priority)
            .map(|members| {
                let mut running = 0.0;
                let cumulative = members
                    .iter()
                    .map(|&i| {
                        running += routes[i].final_weight;
                        running
                    })
                    .collect();
                Tier {
                    priority: routes[members[0]].route.priority,
                    members: members.to_vec(),
                    cumulative,
                }
            })
            .collect();

        Self { tiers }
    }

    /// Priority of the tier every draw is taken from.
    pub fn active_priority(&self) -> Option<i64> {
        self.tiers.first().map(|t| t.priority)
    }

    /// Probability of each route index being drawn. Routes outside the active tier have none.
    pub fn shares(&self) -> Vec<(usize, f64)> {
        let Some(tier) = self.tiers.first() else {
            return Vec::new();
        };
        let total = tier.total();
        let uniform = 1.0 / tier.members.len() as f64;
        let mut previous = 0.0;
        tier.members
            .iter()
            .zip(&tier.cumulative)
            .map(|(&index, &c)| {
                let share = if total > 0.0 && total.is_finite() { (c - previous) / total } else { uniform };
                previous = c;
                (index, share)
            })
            .collect()
    }

    /// Draw a route index, or `None` when no route is eligible.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        self.tiers.first().map(|tier| tier.choose(rng))
    }
}

/// Select a route for `model` from `candidates` using a fresh thread-local draw.
pub fn select_route<'a>(model: &str, candidates: &'a [WeightedRoute]) -> Result<&'a WeightedRoute, NoRouteAvailable> {
    select_route_with_rng(model, candidates, &mut rand::rng())
}

/// Select a route for `model` from `candidates`, drawing from `rng`.
///
/// With a seeded generator the choice is reproducible for the same candidate set.
pub fn select_route_with_rng<'a, R: Rng + ?Sized>(
    model: &str,
    candidates: &'a [WeightedRoute],
    rng: &mut R,
) -> Result<&'a WeightedRoute, NoRouteAvailable> {
    TieredSelection::build(model, candidates)
        .choose(rng)
        .map(|index| &candidates[index])
        .ok_or_else(|| NoRouteAvailable { model: model.to_string() })
}
