use axum::{Json, extract::State};

use crate::{AppState, errors::Result, routing::RoutingPolicy};

#[utoipa::path(
    get,
    path = "/routing-policy",
    tag = "routing",
    summary = "Get routing policy",
    description = "Returns the policy the current route weights were computed under.",
    responses(
        (status = 200, description = "Current routing policy", body = RoutingPolicy),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_routing_policy(State(state): State<AppState>) -> Json<RoutingPolicy> {
    Json(state.engine.snapshot().policy.as_ref().clone())
}

#[utoipa::path(
    put,
    path = "/routing-policy",
    tag = "routing",
    summary = "Replace routing policy",
    description = "Validates the policy and reweighs every route under it. The submitted `version` is ignored; \
        the response carries the version assigned by the engine.",
    request_body = RoutingPolicy,
    responses(
        (status = 200, description = "Policy accepted", body = RoutingPolicy),
        (status = 400, description = "A field is outside its allowed range"),
        (status = 422, description = "Malformed policy body"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_routing_policy(State(state): State<AppState>, Json(policy): Json<RoutingPolicy>) -> Result<Json<RoutingPolicy>> {
    let policy = state.engine.update_policy(policy)?;
    Ok(Json(policy.as_ref().clone()))
}
