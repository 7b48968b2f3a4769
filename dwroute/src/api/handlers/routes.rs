use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::routes::{ListRoutesQuery, RouteResponse, RouteUpdate, SelectRouteRequest, SelectRouteResponse},
    errors::{Error, Result},
    routing::Catalog,
    store::RebuildSummary,
    types::{ProviderTokenId, RouteKey},
};

#[utoipa::path(
    post,
    path = "/routes/rebuild",
    tag = "routes",
    summary = "Rebuild route table",
    description = "Derives the route table from the supplied providers, tokens, and pricing records, and \
        publishes it. Manual route toggles are kept for routes that still exist. When the input is \
        inconsistent nothing is published and the previous table keeps serving.",
    request_body = Catalog,
    responses(
        (status = 200, description = "New table published", body = RebuildSummary),
        (status = 422, description = "Inconsistent catalog; previous table kept"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn rebuild_routes(State(state): State<AppState>, Json(catalog): Json<Catalog>) -> Result<Json<RebuildSummary>> {
    let summary = state.engine.rebuild(catalog)?;
    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/routes",
    tag = "routes",
    summary = "List routes",
    description = "Lists the published routes, ordered by model, with their weights and current selection share.",
    params(ListRoutesQuery),
    responses(
        (status = 200, description = "Weighted routes", body = Vec<RouteResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_routes(State(state): State<AppState>, Query(query): Query<ListRoutesQuery>) -> Json<Vec<RouteResponse>> {
    let snapshot = state.engine.snapshot();

    let routes = snapshot
        .routes
        .models()
        .filter(|(model, _)| query.model.as_deref().is_none_or(|wanted| wanted == *model))
        .flat_map(|(_, model_routes)| model_routes.routes().iter().zip(model_routes.selection_shares()))
        .filter(|(weighted, _)| query.enabled.is_none_or(|enabled| weighted.route.enabled == enabled))
        .map(|(weighted, share)| RouteResponse::new(weighted, snapshot.is_manually_disabled(&weighted.route.key), share))
        .collect();

    Json(routes)
}

#[utoipa::path(
    patch,
    path = "/routes/{model}/{token_id}",
    tag = "routes",
    summary = "Toggle route",
    description = "Switches one route on or off without a rebuild. Enabling a route whose provider or token is \
        disabled only lifts the manual switch. Model names containing `/` must be percent-encoded.",
    request_body = RouteUpdate,
    params(
        ("model" = String, Path, description = "Model name"),
        ("token_id" = uuid::Uuid, Path, description = "Provider token ID"),
    ),
    responses(
        (status = 200, description = "Route after the toggle", body = RouteResponse),
        (status = 404, description = "No such route"),
    )
)]
#[tracing::instrument(skip_all, fields(model = %model, token_id = %token_id))]
pub async fn update_route(
    State(state): State<AppState>,
    Path((model, token_id)): Path<(String, ProviderTokenId)>,
    Json(update): Json<RouteUpdate>,
) -> Result<Json<RouteResponse>> {
    let key = RouteKey::new(model, token_id);
    let snapshot = state.engine.set_route_enabled(&key, update.enabled)?;

    let response = snapshot
        .routes
        .model(&key.model_name)
        .and_then(|model_routes| {
            model_routes
                .routes()
                .iter()
                .zip(model_routes.selection_shares())
                .find(|(weighted, _)| weighted.route.key == key)
                .map(|(weighted, share)| RouteResponse::new(weighted, snapshot.is_manually_disabled(&key), share))
        })
        .ok_or_else(|| Error::NotFound {
            resource: "Route".to_string(),
            id: key.to_string(),
        })?;

    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/routes/select",
    tag = "routes",
    summary = "Select route",
    description = "Picks an upstream for the model: the highest-precedence priority tier with a usable route, \
        then a weighted random draw inside it.",
    request_body = SelectRouteRequest,
    responses(
        (status = 200, description = "Chosen route", body = SelectRouteResponse),
        (status = 503, description = "No upstream available for the model"),
    )
)]
#[tracing::instrument(skip_all, fields(model = %request.model))]
pub async fn select_route(State(state): State<AppState>, Json(request): Json<SelectRouteRequest>) -> Result<Json<SelectRouteResponse>> {
    let route = state.engine.select_route(&request.model)?;
    Ok(Json(route.into()))
}
