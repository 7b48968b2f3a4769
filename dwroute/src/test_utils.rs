//! Test utilities shared by the handler and application tests.

use axum_test::TestServer;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::config::Config;

pub async fn create_test_app() -> (TestServer, crate::BackgroundServices) {
    create_test_app_with_config(create_test_config()).await
}

pub async fn create_test_app_with_config(config: Config) -> (TestServer, crate::BackgroundServices) {
    let app = crate::Application::new(config).await.expect("Failed to create application");
    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        group_ratios: [("default".to_string(), 1.0), ("vip".to_string(), 0.5)].into_iter().collect(),
        ..Default::default()
    }
}

/// A rebuild request body with one provider and three tokens.
///
/// Derived routes: `gpt-4o` through `primary` (weight 30), `backup` (weight 0) and `vip`;
/// `dall-e-3` through `vip` only. `beta` belongs to a group no pricing lists and yields none.
pub struct TestCatalog {
    pub body: Value,
    pub provider: Uuid,
    pub primary: Uuid,
    pub backup: Uuid,
    pub vip: Uuid,
    pub beta: Uuid,
}

pub fn test_catalog() -> TestCatalog {
    let provider = Uuid::new_v4();
    let primary = Uuid::new_v4();
    let backup = Uuid::new_v4();
    let vip = Uuid::new_v4();
    let beta = Uuid::new_v4();

    let body = json!({
        "providers": [{
            "id": provider,
            "name": "upstream",
            "base_url": "https://upstream.example.com/v1",
            "credential": "sk-upstream-secret",
            "enabled": true
        }],
        "tokens": [
            { "id": primary, "provider_id": provider, "name": "primary", "group_name": "default", "weight": 30 },
            { "id": backup, "provider_id": provider, "name": "backup", "group_name": "" },
            { "id": vip, "provider_id": provider, "name": "vip", "group_name": "vip" },
            { "id": beta, "provider_id": provider, "name": "beta", "group_name": "beta" }
        ],
        "pricings": [
            {
                "provider_id": provider,
                "model_name": "gpt-4o",
                "model_ratio": 1.25,
                "completion_ratio": 4.0,
                "enable_groups": "default,vip",
                "supported_endpoint_types": "[\"openai\",\"openai-response\"]"
            },
            {
                "provider_id": provider,
                "model_name": "dall-e-3",
                "model_price": 0.04,
                "quota_type": 1,
                "enable_groups": ["vip"],
                "supported_endpoint_types": ["image-generation"]
            }
        ]
    });

    TestCatalog {
        body,
        provider,
        primary,
        backup,
        vip,
        beta,
    }
}

/// Create an app and load [`test_catalog`] into it.
pub async fn create_test_app_with_catalog() -> (TestServer, crate::BackgroundServices, TestCatalog) {
    let (server, bg_services) = create_test_app().await;
    let catalog = test_catalog();
    server.post("/admin/api/v1/routes/rebuild").json(&catalog.body).await.assert_status_ok();
    (server, bg_services, catalog)
}
