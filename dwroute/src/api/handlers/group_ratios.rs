use axum::{Json, extract::State};

use crate::{
    AppState,
    errors::{Error, Result},
    pricing::GroupRatios,
};

#[utoipa::path(
    get,
    path = "/group-ratios",
    tag = "pricing",
    summary = "Get group ratios",
    responses(
        (status = 200, description = "Price multiplier per group", body = GroupRatios),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_group_ratios(State(state): State<AppState>) -> Json<GroupRatios> {
    Json(state.engine.snapshot().group_ratios.as_ref().clone())
}

#[utoipa::path(
    put,
    path = "/group-ratios",
    tag = "pricing",
    summary = "Replace group ratios",
    description = "Replaces the whole table. Groups left out price at 1, as do groups with a ratio of 0.",
    request_body = GroupRatios,
    responses(
        (status = 200, description = "Table accepted", body = GroupRatios),
        (status = 400, description = "A ratio is negative or not a number"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_group_ratios(State(state): State<AppState>, Json(group_ratios): Json<GroupRatios>) -> Result<Json<GroupRatios>> {
    group_ratios.validate().map_err(|message| Error::BadRequest { message })?;
    let group_ratios = state.engine.update_group_ratios(group_ratios);
    Ok(Json(group_ratios.as_ref().clone()))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_test_app, create_test_app_with_catalog};
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    #[test_log::test(tokio::test)]
    async fn test_get_group_ratios_from_config() {
        let (app, _bg_services) = create_test_app().await;

        let ratios: Value = app.get("/admin/api/v1/group-ratios").await.json();
        assert_eq!(ratios, json!({ "default": 1.0, "vip": 0.5 }));
    }

    #[test_log::test(tokio::test)]
    async fn test_update_group_ratios_changes_cheapest_group() {
        let (app, _bg_services, _catalog) = create_test_app_with_catalog().await;

        let quote: Value = app.get("/admin/api/v1/pricing/gpt-4o").await.json::<Vec<Value>>()[0].clone();
        assert_eq!(quote["group"], "vip");

        let response = app
            .put("/admin/api/v1/group-ratios")
            .json(&json!({ "default": 0.8, "vip": 1.5 }))
            .await;
        response.assert_status_ok();

        let quote: Value = app.get("/admin/api/v1/pricing/gpt-4o").await.json::<Vec<Value>>()[0].clone();
        assert_eq!(quote["group"], "default");
        assert_eq!(quote["group_ratio"], 0.8);
    }

    #[test_log::test(tokio::test)]
    async fn test_update_group_ratios_rejects_negative() {
        let (app, _bg_services) = create_test_app().await;

        let response = app.put("/admin/api/v1/group-ratios").json(&json!({ "vip": -1.0 })).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().contains("'vip'"));

        let ratios: Value = app.get("/admin/api/v1/group-ratios").await.json();
        assert_eq!(ratios["vip"], 0.5);
    }
}
