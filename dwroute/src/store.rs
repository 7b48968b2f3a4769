//! Published engine state.
//!
//! [`RoutingEngine`] owns one immutable [`EngineSnapshot`] behind an [`ArcSwap`]. Readers
//! (route selection, pricing) load the current snapshot without locking and see either the old
//! or the new state in full. Writers (rebuild, policy and ratio updates, stats refresh, route
//! toggles) are serialized by a mutex, derive the next snapshot from the current one, and
//! publish it with a single swap.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::pricing::{GroupRatios, PriceQuote, resolve_price, resolve_price_for_group};
use crate::routing::{Catalog, NoRouteAvailable, RebuildError, Route, RouteStats, RouteTable, RoutingPolicy, StatsIndex, WeightedRoute, rebuild};
use crate::types::RouteKey;

/// One consistent view of everything the engine computes over.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    /// Incremented on every publish
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub policy: Arc<RoutingPolicy>,
    pub group_ratios: Arc<GroupRatios>,
    pub catalog: Arc<Catalog>,
    pub routes: Arc<RouteTable>,
    pub stats: Arc<StatsIndex>,
    /// Routes as derived from the catalog, before manual toggles
    derived: Arc<Vec<Route>>,
    /// Routes switched off through [`RoutingEngine::set_route_enabled`]
    disabled: Arc<BTreeSet<RouteKey>>,
}

impl EngineSnapshot {
    fn empty(policy: RoutingPolicy, group_ratios: GroupRatios) -> Self {
        Self {
            version: 0,
            built_at: Utc::now(),
            policy: Arc::new(policy),
            group_ratios: Arc::new(group_ratios),
            catalog: Arc::new(Catalog::default()),
            routes: Arc::new(RouteTable::default()),
            stats: Arc::new(StatsIndex::default()),
            derived: Arc::new(Vec::new()),
            disabled: Arc::new(BTreeSet::new()),
        }
    }

    /// Whether the route was switched off manually, independently of its provider and token.
    pub fn is_manually_disabled(&self, key: &RouteKey) -> bool {
        self.disabled.contains(key)
    }

    /// Next version of this snapshot, rescored from its parts.
    fn reweighed(&self) -> Self {
        let routes: Vec<Route> = self
            .derived
            .iter()
            .map(|route| {
                let mut route = route.clone();
                route.enabled &= !self.disabled.contains(&route.key);
                route
            })
            .collect();

        Self {
            version: self.version + 1,
            built_at: Utc::now(),
            routes: Arc::new(RouteTable::build(&routes, &self.stats, &self.policy)),
            ..self.clone()
        }
    }
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RebuildSummary {
    /// Snapshot version the new table was published under
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub routes: usize,
    pub enabled_routes: usize,
    pub models: usize,
}

pub struct RoutingEngine {
    snapshot: ArcSwap<EngineSnapshot>,
    writer: Mutex<()>,
}

impl RoutingEngine {
    /// Start with an empty catalog under the given policy and ratio table.
    pub fn new(policy: RoutingPolicy, group_ratios: GroupRatios) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(EngineSnapshot::empty(policy, group_ratios)),
            writer: Mutex::new(()),
        }
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.snapshot.load_full()
    }

    fn publish(&self, next: EngineSnapshot, reason: &'static str) -> Arc<EngineSnapshot> {
        let next = Arc::new(next);
        metrics::counter!("dwroute_snapshot_publish_total", "reason" => reason).increment(1);
        metrics::gauge!("dwroute_routes").set(next.routes.len() as f64);
        debug!(version = next.version, reason, routes = next.routes.len(), "Publishing engine snapshot");
        self.snapshot.store(Arc::clone(&next));
        next
    }

    /// Replace the catalog and derive a new route table from it.
    ///
    /// On error nothing is published and the previous table keeps serving.
    #[instrument(skip_all, fields(providers = catalog.providers.len(), tokens = catalog.tokens.len(), pricings = catalog.pricings.len()))]
    pub fn rebuild(&self, catalog: Catalog) -> std::result::Result<RebuildSummary, RebuildError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot.load_full();

        let derived = match rebuild(&catalog) {
            Ok(routes) => routes,
            Err(e) => {
                metrics::counter!("dwroute_rebuilds_total", "outcome" => "rejected").increment(1);
                warn!(error = %e, "Rejected route table rebuild, keeping version {}", current.version);
                return Err(e);
            }
        };

        // Manual toggles survive a rebuild for routes that still exist
        let keys: BTreeSet<&RouteKey> = derived.iter().map(|r| &r.key).collect();
        let disabled: BTreeSet<RouteKey> = current.disabled.iter().filter(|k| keys.contains(k)).cloned().collect();

        let next = EngineSnapshot {
            catalog: Arc::new(catalog),
            derived: Arc::new(derived),
            disabled: Arc::new(disabled),
            ..(*current).clone()
        }
        .reweighed();
        let next = self.publish(next, "rebuild");
        metrics::counter!("dwroute_rebuilds_total", "outcome" => "published").increment(1);

        let summary = RebuildSummary {
            version: next.version,
            built_at: next.built_at,
            routes: next.routes.len(),
            enabled_routes: next.routes.iter().filter(|w| w.route.enabled).count(),
            models: next.routes.models().count(),
        };
        info!(
            version = summary.version,
            routes = summary.routes,
            enabled = summary.enabled_routes,
            models = summary.models,
            "Route table rebuilt"
        );
        Ok(summary)
    }

    /// Switch one route on or off without a rebuild, returning the snapshot that carries the change.
    ///
    /// Enabling only lifts the manual switch; a route whose provider or token is disabled stays
    /// disabled.
    pub fn set_route_enabled(&self, key: &RouteKey, enabled: bool) -> Result<Arc<EngineSnapshot>> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot.load_full();

        if current.routes.get(key).is_none() {
            return Err(Error::NotFound {
                resource: "Route".to_string(),
                id: key.to_string(),
            });
        }

        let mut disabled = (*current.disabled).clone();
        if enabled {
            disabled.remove(key);
        } else {
            disabled.insert(key.clone());
        }

        let next = EngineSnapshot {
            disabled: Arc::new(disabled),
            ..(*current).clone()
        }
        .reweighed();
        let next = self.publish(next, "route_toggle");
        info!(route = %key, enabled, version = next.version, "Route toggled");
        Ok(next)
    }

    /// Validate and install a new policy, reweighing every route under it.
    ///
    /// The submitted `version` is ignored; the engine assigns the next one.
    pub fn update_policy(&self, mut policy: RoutingPolicy) -> Result<Arc<RoutingPolicy>> {
        policy.validate()?;

        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot.load_full();
        policy.version = current.policy.version + 1;

        let next = EngineSnapshot {
            policy: Arc::new(policy),
            ..(*current).clone()
        }
        .reweighed();
        let next = self.publish(next, "policy");
        info!(policy_version = next.policy.version, "Routing policy updated");
        Ok(Arc::clone(&next.policy))
    }

    /// Replace the group ratio table. Route weights do not depend on it, so routes are unchanged.
    pub fn update_group_ratios(&self, group_ratios: GroupRatios) -> Arc<GroupRatios> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot.load_full();

        let next = EngineSnapshot {
            version: current.version + 1,
            built_at: Utc::now(),
            group_ratios: Arc::new(group_ratios),
            ..(*current).clone()
        };
        let next = self.publish(next, "group_ratios");
        info!(groups = next.group_ratios.len(), "Group ratios updated");
        Arc::clone(&next.group_ratios)
    }

    /// Replace the windowed statistics and reweigh every route, returning the published snapshot.
    pub fn apply_stats(&self, stats: Vec<RouteStats>) -> Arc<EngineSnapshot> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot.load_full();

        let next = EngineSnapshot {
            stats: Arc::new(StatsIndex::new(stats)),
            ..(*current).clone()
        }
        .reweighed();
        let next = self.publish(next, "stats");
        debug!(applied = next.stats.len(), version = next.version, "Route stats applied");
        next
    }

    /// Select a route for `model` with a fresh random draw.
    pub fn select_route(&self, model: &str) -> std::result::Result<WeightedRoute, NoRouteAvailable> {
        self.select_route_with_rng(model, &mut rand::rng())
    }

    /// Select a route for `model`, drawing from `rng`.
    pub fn select_route_with_rng<R: Rng + ?Sized>(&self, model: &str, rng: &mut R) -> std::result::Result<WeightedRoute, NoRouteAvailable> {
        let snapshot = self.snapshot.load();
        let result = snapshot.routes.select_with_rng(model, rng).cloned();
        let outcome = if result.is_ok() { "selected" } else { "no_route" };
        metrics::counter!("dwroute_route_selections_total", "model" => model.to_string(), "outcome" => outcome).increment(1);
        result
    }

    /// Quotes for every pricing record: the cheapest eligible group, or the quote `group` pays.
    ///
    /// Records `group` may not use are left out.
    pub fn quotes(&self, group: Option<&str>) -> Vec<PriceQuote> {
        let snapshot = self.snapshot.load();
        quote_all(&snapshot, snapshot.catalog.pricings.iter(), group)
    }

    /// Quotes for one model across all providers pricing it.
    pub fn quotes_for_model(&self, model: &str, group: Option<&str>) -> Result<Vec<PriceQuote>> {
        let snapshot = self.snapshot.load();
        if snapshot.catalog.pricings_for(model).next().is_none() {
            return Err(Error::NotFound {
                resource: "Model pricing".to_string(),
                id: model.to_string(),
            });
        }
        Ok(quote_all(&snapshot, snapshot.catalog.pricings_for(model), group))
    }
}

fn quote_all<'a>(
    snapshot: &EngineSnapshot,
    pricings: impl Iterator<Item = &'a crate::pricing::ModelPricing>,
    group: Option<&str>,
) -> Vec<PriceQuote> {
    match group {
        None => pricings.map(|p| resolve_price(p, &snapshot.group_ratios)).collect(),
        Some(group) => pricings
            .filter_map(|p| resolve_price_for_group(p, &snapshot.group_ratios, group))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{BillingMode, ModelPricing};
    use crate::routing::{Provider, ProviderToken};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use uuid::Uuid;

    struct Fixture {
        catalog: Catalog,
        default_token: ProviderToken,
        vip_token: ProviderToken,
    }

    fn fixture() -> Fixture {
        let provider = Provider {
            id: Uuid::new_v4(),
            name: "upstream".to_string(),
            base_url: "https://upstream.example.com/v1".parse().unwrap(),
            credential: Some("sk-test".to_string()),
            weight: 0,
            priority: 0,
            enabled: true,
        };
        let token = |group: &str, priority: i64| ProviderToken {
            id: Uuid::new_v4(),
            provider_id: provider.id,
            name: format!("{group}-token"),
            group_name: group.to_string(),
            weight: 0,
            priority,
            enabled: true,
            models: None,
        };
        let default_token = token("default", 0);
        let vip_token = token("vip", 1);
        let pricing = |model: &str, groups: &[&str]| ModelPricing {
            provider_id: provider.id,
            model_name: model.to_string(),
            model_ratio: 2.0,
            completion_ratio: 3.0,
            model_price: 0.0,
            quota_type: 0,
            enable_groups: groups.iter().map(|g| g.to_string()).collect(),
            supported_endpoint_types: vec![],
        };

        Fixture {
            catalog: Catalog {
                tokens: vec![default_token.clone(), vip_token.clone()],
                pricings: vec![pricing("gpt", &["default", "vip"]), pricing("claude", &["vip"])],
                providers: vec![provider],
            },
            default_token,
            vip_token,
        }
    }

    fn engine() -> RoutingEngine {
        RoutingEngine::new(RoutingPolicy::default(), [("default".to_string(), 1.0), ("vip".to_string(), 0.5)].into_iter().collect())
    }

    #[test]
    fn test_rebuild_publishes_new_table() {
        let engine = engine();
        let f = fixture();

        let summary = engine.rebuild(f.catalog).unwrap();
        assert_eq!(summary.routes, 3);
        assert_eq!(summary.enabled_routes, 3);
        assert_eq!(summary.models, 2);
        assert_eq!(summary.version, 1);
        assert_eq!(engine.snapshot().version, 1);
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_table() {
        let engine = engine();
        let f = fixture();
        engine.rebuild(f.catalog.clone()).unwrap();
        let before = engine.snapshot();

        let mut broken = f.catalog;
        broken.tokens.push(broken.tokens[0].clone());
        assert!(matches!(engine.rebuild(broken), Err(RebuildError::DuplicateToken(_))));

        let after = engine.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(engine.select_route("gpt").is_ok());
    }

    #[test]
    fn test_unlisted_group_token_gets_no_routes() {
        let engine = engine();
        let mut f = fixture();
        let mut beta = f.default_token.clone();
        beta.id = Uuid::new_v4();
        beta.group_name = "beta".to_string();
        f.catalog.tokens.push(beta.clone());

        engine.rebuild(f.catalog).unwrap();
        let snapshot = engine.snapshot();
        assert!(snapshot.routes.iter().all(|w| w.route.key.provider_token_id != beta.id));
    }

    #[test]
    fn test_toggle_disables_and_survives_rebuild() {
        let engine = engine();
        let f = fixture();
        engine.rebuild(f.catalog.clone()).unwrap();

        let key = RouteKey::new("gpt", f.default_token.id);
        let toggled = engine.set_route_enabled(&key, false).unwrap();
        assert!(!toggled.routes.get(&key).unwrap().route.enabled);
        assert!(engine.snapshot().is_manually_disabled(&key));

        // Only the vip route remains selectable for gpt
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let chosen = engine.select_route_with_rng("gpt", &mut rng).unwrap();
            assert_eq!(chosen.route.key.provider_token_id, f.vip_token.id);
        }

        engine.rebuild(f.catalog).unwrap();
        assert!(!engine.snapshot().routes.get(&key).unwrap().route.enabled);

        let toggled = engine.set_route_enabled(&key, true).unwrap();
        assert!(toggled.routes.get(&key).unwrap().route.enabled);
    }

    #[test]
    fn test_writers_return_the_snapshot_they_published() {
        let engine = engine();
        let f = fixture();
        engine.rebuild(f.catalog).unwrap();

        let key = RouteKey::new("gpt", f.default_token.id);
        let toggled = engine.set_route_enabled(&key, false).unwrap();
        let stats = engine.apply_stats(vec![RouteStats {
            model_name: "gpt".to_string(),
            provider_token_id: f.vip_token.id,
            request_count: 10,
            ..Default::default()
        }]);

        // A later rebuild drops every route; earlier results still describe their own publish
        engine.rebuild(Catalog::default()).unwrap();
        assert!(engine.snapshot().routes.get(&key).is_none());

        assert!(toggled.is_manually_disabled(&key));
        assert!(!toggled.routes.get(&key).unwrap().route.enabled);
        assert_eq!(stats.version, toggled.version + 1);
        assert_eq!(stats.stats.len(), 1);
        assert!(engine.snapshot().version > stats.version);
    }

    #[test]
    fn test_toggle_unknown_route_is_not_found() {
        let engine = engine();
        let err = engine.set_route_enabled(&RouteKey::new("gpt", Uuid::new_v4()), false).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(engine.snapshot().version, 0);
    }

    #[test]
    fn test_all_disabled_model_is_unroutable() {
        let engine = engine();
        let mut f = fixture();
        for provider in &mut f.catalog.providers {
            provider.enabled = false;
        }
        engine.rebuild(f.catalog).unwrap();

        let err = engine.select_route("gpt").unwrap_err();
        assert_eq!(err.to_string(), "no upstream available for model gpt");
        // Disabled routes stay visible
        assert_eq!(engine.snapshot().routes.len(), 3);
    }

    #[test]
    fn test_policy_update_assigns_version_and_reweighs() {
        let engine = engine();
        engine.rebuild(fixture().catalog).unwrap();
        let before = engine.snapshot().routes.iter().map(|w| w.final_weight).collect::<Vec<_>>();

        let policy = RoutingPolicy {
            base_weight_factor: 3.0,
            version: 999,
            ..Default::default()
        };
        let installed = engine.update_policy(policy).unwrap();
        assert_eq!(installed.version, 1);

        let after = engine.snapshot().routes.iter().map(|w| w.final_weight).collect::<Vec<_>>();
        assert_eq!(after, before.iter().map(|w| w * 3.0).collect::<Vec<_>>());

        let second = engine.update_policy(RoutingPolicy::default()).unwrap();
        assert_eq!(second.version, 2);
    }

    #[test]
    fn test_invalid_policy_is_rejected_without_publishing() {
        let engine = engine();
        let version = engine.snapshot().version;
        let policy = RoutingPolicy {
            health_min_multiplier: 5.0,
            health_max_multiplier: 1.0,
            ..Default::default()
        };
        assert!(matches!(engine.update_policy(policy), Err(Error::BadRequest { .. })));
        assert_eq!(engine.snapshot().version, version);
        assert_eq!(engine.snapshot().policy.version, 0);
    }

    #[test]
    fn test_stats_reweigh_routes() {
        let engine = engine();
        let f = fixture();
        let mut catalog = f.catalog;
        // Put both tokens in one group and tier so they compete for gpt
        catalog.tokens[1].group_name = "default".to_string();
        catalog.tokens[1].priority = 0;
        engine.rebuild(catalog).unwrap();

        let published = engine.apply_stats(vec![
            RouteStats {
                model_name: "gpt".to_string(),
                provider_token_id: f.default_token.id,
                request_count: 100,
                total_cost: 0.0,
                success_count: 100,
                ..Default::default()
            },
            RouteStats {
                model_name: "gpt".to_string(),
                provider_token_id: f.vip_token.id,
                request_count: 100,
                total_cost: 99.0,
                failure_count: 100,
                ..Default::default()
            },
        ]);
        assert_eq!(published.stats.len(), 2);
        assert_eq!(published.version, engine.snapshot().version);

        let snapshot = engine.snapshot();
        let good = snapshot.routes.get(&RouteKey::new("gpt", f.default_token.id)).unwrap();
        let bad = snapshot.routes.get(&RouteKey::new("gpt", f.vip_token.id)).unwrap();
        assert_eq!(good.value_score, 1.0);
        assert_eq!(good.health_multiplier, 1.2);
        assert_eq!(bad.health_multiplier, 0.1);
        assert!(good.final_weight > bad.final_weight);
    }

    #[test]
    fn test_quotes_use_current_ratios() {
        let engine = engine();
        engine.rebuild(fixture().catalog).unwrap();

        let quotes = engine.quotes_for_model("gpt", None).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].group, "vip");
        assert_eq!(quotes[0].billing_mode, BillingMode::Metered);
        assert_eq!(quotes[0].prompt_price_per_million, Some(2.0));

        engine.update_group_ratios([("vip".to_string(), 2.0)].into_iter().collect());
        let quotes = engine.quotes_for_model("gpt", None).unwrap();
        assert_eq!(quotes[0].group, "default");
        assert_eq!(quotes[0].prompt_price_per_million, Some(4.0));

        // claude is vip-only
        assert_eq!(engine.quotes(Some("default")).len(), 1);
        assert_eq!(engine.quotes(None).len(), 2);
        assert!(matches!(engine.quotes_for_model("gemini", None), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_updates() {
        let engine = Arc::new(engine());
        engine.rebuild(fixture().catalog).unwrap();
        let start = engine.snapshot().version;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        if i % 2 == 0 {
                            engine.apply_stats(vec![]);
                        } else {
                            engine.update_policy(RoutingPolicy::default()).unwrap();
                        }
                        assert!(engine.select_route("gpt").is_ok());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.version, start + 80);
        assert_eq!(snapshot.policy.version, 40);
    }
}
