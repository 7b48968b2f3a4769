//! Periodic pull of windowed route statistics from the telemetry service.

use crate::config::StatsSyncConfig;
use crate::routing::RouteStats;
use crate::store::RoutingEngine;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use url::Url;

/// Source of windowed route statistics.
/// In practice this is the telemetry service over http, see [`FetchRouteStatsReqwest`].
#[async_trait]
pub trait FetchRouteStats: Send + Sync {
    async fn fetch(&self, usage_window_hours: u32, health_window_hours: u32) -> anyhow::Result<Vec<RouteStats>>;
}

/// Fetches `GET {base_url}/route-stats?usage_window_hours=..&health_window_hours=..`.
pub struct FetchRouteStatsReqwest {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    auth_header_name: String,
    auth_header_prefix: String,
    request_timeout: Duration,
}

impl FetchRouteStatsReqwest {
    pub fn new(base_url: Url, config: &StatsSyncConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client for stats sync")?;
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            auth_header_name: config.auth_header_name.clone(),
            auth_header_prefix: config.auth_header_prefix.clone(),
            request_timeout: config.request_timeout,
        })
    }

    fn stats_url(&self, usage_window_hours: u32, health_window_hours: u32) -> anyhow::Result<Url> {
        let mut url = ensure_slash(&self.base_url)
            .join("route-stats")
            .map_err(|e| anyhow!("Failed to construct route stats URL: {}", e))?;
        url.query_pairs_mut()
            .append_pair("usage_window_hours", &usage_window_hours.to_string())
            .append_pair("health_window_hours", &health_window_hours.to_string());
        Ok(url)
    }
}

/// Makes sure a url has a trailing slash, so that `join` appends rather than replaces the last
/// path segment.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let path = format!("{}/", new_url.path());
        new_url.set_path(&path);
        new_url
    }
}

#[async_trait]
impl FetchRouteStats for FetchRouteStatsReqwest {
    async fn fetch(&self, usage_window_hours: u32, health_window_hours: u32) -> anyhow::Result<Vec<RouteStats>> {
        let url = self.stats_url(usage_window_hours, health_window_hours)?;
        debug!("Fetching route stats from URL: {}", url);

        let mut request = self.client.get(url.clone());
        if let Some(api_key) = &self.api_key {
            request = request.header(&self.auth_header_name, format!("{}{}", self.auth_header_prefix, api_key));
        }

        let response = request.timeout(self.request_timeout).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Route stats request to {} failed", url);
            return Err(anyhow!("Telemetry API error: {} - {}", status, body));
        }

        let body_text = response.text().await?;
        serde_json::from_str::<Vec<RouteStats>>(&body_text).map_err(|e| {
            debug!("Route stats response body was: {}", body_text);
            anyhow!("error decoding route stats response: {}", e)
        })
    }
}

/// Background task feeding fetched statistics into the engine.
///
/// A failed pull is logged and counted; the previously applied statistics stay in effect.
pub struct StatsSync<F> {
    engine: Arc<RoutingEngine>,
    fetcher: F,
    interval: Duration,
}

impl<F: FetchRouteStats> StatsSync<F> {
    pub fn new(engine: Arc<RoutingEngine>, fetcher: F, interval: Duration) -> Self {
        Self { engine, fetcher, interval }
    }

    /// Pull once using the windows of the current policy, and apply the result.
    pub async fn sync_once(&self) -> anyhow::Result<usize> {
        let policy = Arc::clone(&self.engine.snapshot().policy);
        let stats = self.fetcher.fetch(policy.usage_window_hours, policy.health_window_hours).await?;
        Ok(self.engine.apply_stats(stats).stats.len())
    }

    #[instrument(skip_all, fields(interval = ?self.interval))]
    pub async fn start(self, shutdown_token: CancellationToken) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Starting route stats sync");

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    break;
                }
                _ = timer.tick() => {
                    match self.sync_once().await {
                        Ok(applied) => {
                            metrics::counter!("dwroute_stats_sync_total", "outcome" => "success").increment(1);
                            debug!(applied, "Route stats synced");
                        }
                        Err(e) => {
                            metrics::counter!("dwroute_stats_sync_total", "outcome" => "error").increment(1);
                            error!("Route stats sync failed, keeping previous stats: {:#}", e);
                        }
                    }
                }
            }
        }

        info!("Route stats sync stopped gracefully");
    }
}
