use axum::{Json, extract::State};

use crate::{AppState, api::models::stats::StatsApplied, routing::RouteStats};

#[utoipa::path(
    put,
    path = "/route-stats",
    tag = "routes",
    summary = "Replace route statistics",
    description = "Replaces the windowed usage and health statistics and reweighs every route. Routes without \
        an entry score as if they had no traffic. When several entries share a route, the last one wins.",
    request_body = Vec<RouteStats>,
    responses(
        (status = 200, description = "Statistics applied", body = StatsApplied),
    )
)]
#[tracing::instrument(skip_all, fields(count = stats.len()))]
pub async fn replace_route_stats(State(state): State<AppState>, Json(stats): Json<Vec<RouteStats>>) -> Json<StatsApplied> {
    let published = state.engine.apply_stats(stats);
    Json(StatsApplied {
        applied: published.stats.len(),
        version: published.version,
    })
}
