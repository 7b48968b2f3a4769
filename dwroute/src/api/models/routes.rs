//! API request/response models for weighted routes.

use crate::routing::WeightedRoute;
use crate::types::{ProviderId, ProviderTokenId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing routes
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListRoutesQuery {
    /// Only routes serving this model
    pub model: Option<String>,
    /// Only enabled (`true`) or disabled (`false`) routes
    pub enabled: Option<bool>,
}

/// One route of the published table, with its computed weight.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteResponse {
    #[schema(example = "gpt-4o")]
    pub model_name: String,
    #[schema(value_type = String, format = "uuid")]
    pub provider_token_id: ProviderTokenId,
    #[schema(value_type = String, format = "uuid")]
    pub provider_id: ProviderId,
    pub token_name: String,
    pub group_name: String,
    /// Effective state: provider, token, and manual switch all enabled
    pub enabled: bool,
    /// Switched off through `PATCH /routes/{model}/{token_id}`
    pub manually_disabled: bool,
    pub priority: i64,
    /// Static weight of the token
    pub weight: i64,
    pub value_score: f64,
    pub health_multiplier: f64,
    pub final_weight: f64,
    /// Probability this route is picked for its model right now
    pub selection_share: f64,
}

impl RouteResponse {
    pub fn new(weighted: &WeightedRoute, manually_disabled: bool, selection_share: f64) -> Self {
        let route = &weighted.route;
        Self {
            model_name: route.key.model_name.clone(),
            provider_token_id: route.key.provider_token_id,
            provider_id: route.provider_id,
            token_name: route.token.name.clone(),
            group_name: route.group_name.clone(),
            enabled: route.enabled,
            manually_disabled,
            priority: route.priority,
            weight: route.weight,
            value_score: weighted.value_score,
            health_multiplier: weighted.health_multiplier,
            final_weight: weighted.final_weight,
            selection_share,
        }
    }
}

/// Request body for switching a route on or off.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteUpdate {
    pub enabled: bool,
}

/// Request body for selecting an upstream.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SelectRouteRequest {
    #[schema(example = "gpt-4o")]
    pub model: String,
}

/// The route chosen for a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SelectRouteResponse {
    pub model_name: String,
    #[schema(value_type = String, format = "uuid")]
    pub provider_token_id: ProviderTokenId,
    #[schema(value_type = String, format = "uuid")]
    pub provider_id: ProviderId,
    pub group_name: String,
    pub priority: i64,
    pub final_weight: f64,
}

impl From<WeightedRoute> for SelectRouteResponse {
    fn from(weighted: WeightedRoute) -> Self {
        let WeightedRoute { route, final_weight, .. } = weighted;
        Self {
            model_name: route.key.model_name,
            provider_token_id: route.key.provider_token_id,
            provider_id: route.provider_id,
            group_name: route.group_name,
            priority: route.priority,
            final_weight,
        }
    }
}
