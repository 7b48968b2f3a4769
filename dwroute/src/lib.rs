//! # dwroute: Route Weighting & Pricing Resolution Engine
//!
//! `dwroute` decides which upstream serves a request in a multi-provider LLM gateway, and what
//! that request costs. It is driven over an admin API by the control plane, which owns the
//! providers, their access tokens, and per-model pricing; `dwroute` owns the derived state.
//!
//! ## What It Does
//!
//! - **Route derivation**: every (model, provider token) pair the catalog allows becomes a
//!   route. A token serves a model when its provider prices the model, its group may use the
//!   model, and its allow-list admits it.
//! - **Weighting**: each route's static weight is scaled by a value score (requests per unit
//!   cost over the usage window, normalized across the model's routes) and a bounded health
//!   multiplier (recent failure rate). The [`RoutingPolicy`](routing::RoutingPolicy) holds the
//!   knobs.
//! - **Selection**: the highest-precedence priority tier with a usable route wins, then a
//!   weighted random draw picks inside it.
//! - **Pricing**: pricing records and the group ratio table resolve into quotes for the
//!   cheapest eligible group, or for a given group.
//!
//! ## Architecture
//!
//! All derived state lives in one immutable snapshot published by
//! [`RoutingEngine`](store::RoutingEngine). Selection and pricing read the snapshot without
//! locking; rebuilds, policy and ratio updates, statistics refreshes, and route toggles each
//! publish a replacement. Statistics arrive either pushed through the API or pulled periodically
//! from the telemetry service by [`sync::StatsSync`].
//!
//! ## Configuration
//!
//! See [`config`]: a YAML file with `DWROUTE_` environment overrides.

pub mod api;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod openapi;
pub mod pricing;
pub mod routing;
pub mod store;
pub mod sync;
pub mod telemetry;
#[cfg(test)]
mod test_utils;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post, put},
};
use bon::Builder;
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use crate::{
    openapi::AdminApiDoc,
    store::RoutingEngine,
    sync::{FetchRouteStatsReqwest, StatsSync},
};

/// Shared state handed to every handler.
#[derive(Clone, Builder)]
pub struct AppState {
    pub engine: Arc<RoutingEngine>,
    pub config: Config,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/routing-policy", get(api::handlers::policy::get_routing_policy))
        .route("/routing-policy", put(api::handlers::policy::update_routing_policy))
        .route("/group-ratios", get(api::handlers::group_ratios::get_group_ratios))
        .route("/group-ratios", put(api::handlers::group_ratios::update_group_ratios))
        // Routes
        .route("/routes", get(api::handlers::routes::list_routes))
        .route("/routes/rebuild", post(api::handlers::routes::rebuild_routes))
        .route("/routes/select", post(api::handlers::routes::select_route))
        .route("/routes/{model}/{token_id}", patch(api::handlers::routes::update_route))
        .route("/route-stats", put(api::handlers::stats::replace_route_stats))
        // Pricing
        .route("/pricing", get(api::handlers::pricing::list_pricing))
        .route("/pricing/{model}", get(api::handlers::pricing::get_model_pricing))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/admin/openapi.json", get(|| async { axum::Json(AdminApiDoc::openapi()) }))
        .nest("/admin/api/v1", api_routes)
        .merge(Scalar::with_url("/admin/docs", AdminApiDoc::openapi()));

    if state.config.enable_metrics {
        let handle = crate::metrics::get_or_install_prometheus_handle();
        router = router.route("/internal/metrics", get(move || async move { handle.render() }));
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Container for background services and their lifecycle management.
///
/// Dropping it without calling [`BackgroundServices::shutdown`] still cancels the tasks through
/// the drop guard.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Start the stats sync when configured.
fn setup_background_services(engine: Arc<RoutingEngine>, config: &Config) -> anyhow::Result<BackgroundServices> {
    let shutdown_token = CancellationToken::new();
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    match (config.stats_sync.enabled, &config.stats_sync.url) {
        (true, Some(url)) => {
            let fetcher = FetchRouteStatsReqwest::new(url.clone(), &config.stats_sync)?;
            let stats_sync = StatsSync::new(engine, fetcher, config.stats_sync.interval);
            background_tasks.push(tokio::spawn(stats_sync.start(shutdown_token.clone())));
            info!(url = %url, "Route stats sync enabled");
        }
        (true, None) => anyhow::bail!("stats_sync is enabled but no url is configured"),
        (false, _) => info!("Route stats sync disabled; statistics must be pushed through the API"),
    }

    Ok(BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    })
}

pub struct Application {
    router: Router,
    config: Config,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create the engine from the configured policy and ratios, and start background services.
    ///
    /// The route table starts empty until the first rebuild.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let engine = Arc::new(RoutingEngine::new(config.routing.clone(), config.group_ratios.clone()));
        let bg_services = setup_background_services(Arc::clone(&engine), &config)?;

        let app_state = AppState::builder().engine(engine).config(config.clone()).build();
        let router = build_router(app_state);

        Ok(Self {
            router,
            config,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Route engine listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
