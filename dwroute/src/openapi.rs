//! OpenAPI documentation for the management API at `/admin/api/v1/*`.
//!
//! Served as JSON at `/admin/openapi.json` and through Scalar at `/admin/docs`.

use utoipa::OpenApi;

use crate::{api, pricing, routing, store, types};

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/admin/api/v1", description = "Admin API server")
    ),
    paths(
        api::handlers::policy::get_routing_policy,
        api::handlers::policy::update_routing_policy,
        api::handlers::group_ratios::get_group_ratios,
        api::handlers::group_ratios::update_group_ratios,
        api::handlers::routes::rebuild_routes,
        api::handlers::routes::list_routes,
        api::handlers::routes::update_route,
        api::handlers::routes::select_route,
        api::handlers::stats::replace_route_stats,
        api::handlers::pricing::list_pricing,
        api::handlers::pricing::get_model_pricing,
    ),
    components(
        schemas(
            routing::RoutingPolicy,
            routing::ValueNormalization,
            routing::Catalog,
            routing::Provider,
            routing::ProviderToken,
            routing::RouteStats,
            pricing::GroupRatios,
            pricing::ModelPricing,
            pricing::PriceQuote,
            pricing::BillingMode,
            pricing::ResolvedEndpoint,
            store::RebuildSummary,
            types::RouteKey,
            api::models::routes::ListRoutesQuery,
            api::models::routes::RouteResponse,
            api::models::routes::RouteUpdate,
            api::models::routes::SelectRouteRequest,
            api::models::routes::SelectRouteResponse,
            api::models::pricing::PricingQuery,
            api::models::stats::StatsApplied,
        )
    ),
    tags(
        (name = "routing", description = "Policy controlling how route weights are computed.

A route's final weight is `(static weight + 10) * (base_weight_factor + value_score_factor * value score) * health multiplier`.
Policy updates reweigh every route immediately."),
        (name = "routes", description = "Derived (model, provider token) routes and upstream selection.

Routes are derived from providers, tokens, and pricing records on rebuild. Selection picks the
highest-precedence priority tier with a usable route, then draws by weight inside it."),
        (name = "pricing", description = "Resolved prices and the group multipliers they depend on."),
    ),
    info(
        title = "Route Engine Admin API",
        version = "1.0.0",
        description = "Route weighting and pricing resolution for a multi-provider LLM gateway.

## Errors

Errors are returned as plain text with a matching status code:

- `400` invalid policy or ratio table
- `404` unknown route or model
- `422` malformed body, or a catalog that cannot be turned into routes
- `503` no upstream available for the requested model",
    )
)]
pub struct AdminApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_doc_lists_every_path() {
        let doc = AdminApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/routing-policy",
            "/group-ratios",
            "/routes",
            "/routes/rebuild",
            "/routes/select",
            "/routes/{model}/{token_id}",
            "/route-stats",
            "/pricing",
            "/pricing/{model}",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
