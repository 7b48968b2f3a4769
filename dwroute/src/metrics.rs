//! Prometheus exposition for the `metrics` facade.
//!
//! Engine and sync code record through `metrics::counter!`/`metrics::gauge!`; those calls are
//! no-ops until a recorder is installed here. Series emitted:
//!
//! - `dwroute_route_selections_total{model, outcome}` - `outcome` is `selected` or `no_route`
//! - `dwroute_rebuilds_total{outcome}` - `published` or `rejected`
//! - `dwroute_snapshot_publish_total{reason}` - `rebuild`, `route_toggle`, `policy`,
//!   `group_ratios`, or `stats`
//! - `dwroute_stats_sync_total{outcome}` - `success` or `error`
//! - `dwroute_routes` - routes in the published table

use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder on first use and return a handle for rendering.
///
/// Safe to call repeatedly (and from tests running in parallel); every caller gets a handle to
/// the same recorder.
pub fn get_or_install_prometheus_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A global metrics recorder was already installed; /internal/metrics may be empty");
            }
            handle
        })
        .clone()
}
