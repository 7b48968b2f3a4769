//! Route derivation and the weighted route table.
//!
//! [`rebuild`] turns a [`Catalog`] into the flat list of routes it implies. [`RouteTable`]
//! attaches scores and final weights to those routes under a policy and a stats index, and
//! precomputes the per-model selection tiers. Both are pure; publishing is done by the engine.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use super::catalog::{Catalog, ProviderToken};
use super::policy::RoutingPolicy;
use super::score::{RouteStats, StatsIndex, score};
use super::selector::{NoRouteAvailable, TieredSelection};
use super::weight::final_weight;
use crate::types::{ProviderId, ProviderTokenId, RouteKey};

/// A rebuild input that cannot produce a consistent route table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RebuildError {
    #[error("provider token {token_id} references unknown provider {provider_id}")]
    UnknownProvider { token_id: ProviderTokenId, provider_id: ProviderId },

    #[error("pricing for model '{model_name}' references unknown provider {provider_id}")]
    UnknownPricingProvider { model_name: String, provider_id: ProviderId },

    #[error("duplicate provider id {0}")]
    DuplicateProvider(ProviderId),

    #[error("duplicate provider token id {0}")]
    DuplicateToken(ProviderTokenId),

    #[error("duplicate pricing for model '{model_name}' on provider {provider_id}")]
    DuplicatePricing { provider_id: ProviderId, model_name: String },

    #[error("invalid pricing: {0}")]
    InvalidPricing(String),
}

/// A (model, provider, token) binding able to serve requests for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub key: RouteKey,
    pub provider_id: ProviderId,
    pub group_name: String,
    /// Provider and token both enabled
    pub enabled: bool,
    pub priority: i64,
    pub weight: i64,
    pub token: Arc<ProviderToken>,
}

impl Route {
    pub fn model_name(&self) -> &str {
        &self.key.model_name
    }
}

/// Derive every route the catalog implies.
///
/// All-or-nothing: any inconsistency in the input fails the whole rebuild. Routes are emitted in
/// token order, then pricing order.
pub fn rebuild(catalog: &Catalog) -> Result<Vec<Route>, RebuildError> {
    let mut provider_ids = HashSet::new();
    for provider in &catalog.providers {
        if !provider_ids.insert(provider.id) {
            return Err(RebuildError::DuplicateProvider(provider.id));
        }
    }

    let mut token_ids = HashSet::new();
    for token in &catalog.tokens {
        if !token_ids.insert(token.id) {
            return Err(RebuildError::DuplicateToken(token.id));
        }
        if !provider_ids.contains(&token.provider_id) {
            return Err(RebuildError::UnknownProvider {
                token_id: token.id,
                provider_id: token.provider_id,
            });
        }
    }

    let mut pricing_keys = HashSet::new();
    for pricing in &catalog.pricings {
        pricing.validate().map_err(RebuildError::InvalidPricing)?;
        if !provider_ids.contains(&pricing.provider_id) {
            return Err(RebuildError::UnknownPricingProvider {
                model_name: pricing.model_name.clone(),
                provider_id: pricing.provider_id,
            });
        }
        if !pricing_keys.insert((pricing.provider_id, pricing.model_name.as_str())) {
            return Err(RebuildError::DuplicatePricing {
                provider_id: pricing.provider_id,
                model_name: pricing.model_name.clone(),
            });
        }
    }

    let mut routes = Vec::new();
    for token in &catalog.tokens {
        // Presence checked above
        let provider_enabled = catalog.provider(token.provider_id).is_some_and(|p| p.enabled);
        let shared = Arc::new(token.clone());
        let before = routes.len();

        for pricing in catalog.pricings.iter().filter(|p| p.provider_id == token.provider_id) {
            if !pricing.is_group_eligible(token.group()) || !token.admits(&pricing.model_name) {
                continue;
            }
            routes.push(Route {
                key: RouteKey::new(pricing.model_name.clone(), token.id),
                provider_id: token.provider_id,
                group_name: token.group().to_string(),
                enabled: provider_enabled && token.enabled,
                priority: token.priority,
                weight: token.weight,
                token: Arc::clone(&shared),
            });
        }

        if routes.len() == before {
            debug!(token = %token.name, group = %token.group(), "Provider token produced no routes");
        }
    }

    Ok(routes)
}

/// A route with its scores and final selection weight under the current policy.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRoute {
    pub route: Route,
    pub value_score: f64,
    pub health_multiplier: f64,
    pub final_weight: f64,
}

impl WeightedRoute {
    /// Selector pre-filter: the route is enabled, serves `model`, and its token may serve it.
    pub fn is_selectable_for(&self, model: &str) -> bool {
        self.route.enabled && self.route.model_name() == model && self.route.token.can_serve(model)
    }
}

/// Weighted routes of one model with their precomputed selection tiers.
#[derive(Debug, Clone, Default)]
pub struct ModelRoutes {
    routes: Vec<WeightedRoute>,
    selection: TieredSelection,
}

impl ModelRoutes {
    pub fn routes(&self) -> &[WeightedRoute] {
        &self.routes
    }

    /// Probability of each route being drawn, aligned with [`ModelRoutes::routes`].
    pub fn selection_shares(&self) -> Vec<f64> {
        let mut shares = vec![0.0; self.routes.len()];
        for (index, share) in self.selection.shares() {
            shares[index] = share;
        }
        shares
    }
}

/// Every route, grouped by model, weighted and ready for selection.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    models: BTreeMap<String, ModelRoutes>,
    len: usize,
}

impl RouteTable {
    /// Score and weigh `routes` under `policy` and `stats`, then index them for selection.
    pub fn build(routes: &[Route], stats: &StatsIndex, policy: &RoutingPolicy) -> Self {
        let mut by_model: BTreeMap<&str, Vec<&Route>> = BTreeMap::new();
        for route in routes {
            by_model.entry(route.model_name()).or_default().push(route);
        }

        let models = by_model
            .into_iter()
            .map(|(model, routes)| {
                // Disabled routes cannot be drawn, so they do not set the bar for live ones
                let competing: Vec<&RouteStats> = routes
                    .iter()
                    .filter(|r| r.enabled)
                    .filter_map(|r| stats.get(&r.key))
                    .collect();
                let weighted: Vec<WeightedRoute> = routes
                    .into_iter()
                    .map(|route| {
                        let route_score = score(stats.get(&route.key), &competing, policy);
                        WeightedRoute {
                            route: route.clone(),
                            value_score: route_score.value_score,
                            health_multiplier: route_score.health_multiplier,
                            final_weight: final_weight(route.weight, route_score, policy),
                        }
                    })
                    .collect();
                let selection = TieredSelection::build(model, &weighted);
                (
                    model.to_string(),
                    ModelRoutes {
                        routes: weighted,
                        selection,
                    },
                )
            })
            .collect();

        Self { models, len: routes.len() }
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedRoute> {
        self.models.values().flat_map(|m| m.routes.iter())
    }

    pub fn model(&self, model: &str) -> Option<&ModelRoutes> {
        self.models.get(model)
    }

    pub fn models(&self) -> impl Iterator<Item = (&str, &ModelRoutes)> {
        self.models.iter().map(|(name, routes)| (name.as_str(), routes))
    }

    pub fn get(&self, key: &RouteKey) -> Option<&WeightedRoute> {
        self.models
            .get(&key.model_name)?
            .routes
            .iter()
            .find(|w| w.route.key.provider_token_id == key.provider_token_id)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Draw a route for `model` from the precomputed tiers.
    pub fn select_with_rng<R: Rng + ?Sized>(&self, model: &str, rng: &mut R) -> Result<&WeightedRoute, NoRouteAvailable> {
        self.models
            .get(model)
            .and_then(|m| m.selection.choose(rng).map(|index| &m.routes[index]))
            .ok_or_else(|| NoRouteAvailable { model: model.to_string() })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use uuid::Uuid;

    pub fn token(provider_id: ProviderId, group: &str) -> ProviderToken {
        ProviderToken {
            id: Uuid::new_v4(),
            provider_id,
            name: format!("{group}-token"),
            group_name: group.to_string(),
            weight: 0,
            priority: 0,
            enabled: true,
            models: None,
        }
    }

    /// A standalone weighted route with the given priority and final weight.
    pub fn weighted(model: &str, priority: i64, final_weight: f64, enabled: bool) -> WeightedRoute {
        let provider_id = Uuid::new_v4();
        let token = token(provider_id, "default");
        WeightedRoute {
            route: Route {
                key: RouteKey::new(model, token.id),
                provider_id,
                group_name: token.group_name.clone(),
                enabled,
                priority,
                weight: 0,
                token: Arc::new(token),
            },
            value_score: 0.0,
            health_multiplier: 1.0,
            final_weight,
        }
    }
}
