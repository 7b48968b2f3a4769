use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{AppState, api::models::pricing::PricingQuery, errors::Result, pricing::PriceQuote};

#[utoipa::path(
    get,
    path = "/pricing",
    tag = "pricing",
    summary = "List price quotes",
    description = "One quote per pricing record. Without `group`, each record is priced under its cheapest \
        eligible group.",
    params(PricingQuery),
    responses(
        (status = 200, description = "Price quotes", body = Vec<PriceQuote>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_pricing(State(state): State<AppState>, Query(query): Query<PricingQuery>) -> Json<Vec<PriceQuote>> {
    Json(state.engine.quotes(query.group.as_deref()))
}

#[utoipa::path(
    get,
    path = "/pricing/{model}",
    tag = "pricing",
    summary = "Get model price quotes",
    description = "Quotes for one model, one per provider pricing it.",
    params(
        ("model" = String, Path, description = "Model name"),
        PricingQuery,
    ),
    responses(
        (status = 200, description = "Price quotes", body = Vec<PriceQuote>),
        (status = 404, description = "No pricing record for the model"),
    )
)]
#[tracing::instrument(skip_all, fields(model = %model))]
pub async fn get_model_pricing(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(query): Query<PricingQuery>,
) -> Result<Json<Vec<PriceQuote>>> {
    let quotes = state.engine.quotes_for_model(&model, query.group.as_deref())?;
    Ok(Json(quotes))
}
