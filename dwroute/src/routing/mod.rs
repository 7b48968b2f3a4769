//! Route derivation, weighting, and selection.
//!
//! The pipeline, leaf first:
//!
//! - [`table::rebuild`] derives routes from the catalog of providers, tokens, and pricing
//! - [`score`] turns windowed statistics into a value score and a health multiplier per route
//! - [`weight::final_weight`] combines static configuration with those scores
//! - [`selector`] draws a route from the highest-precedence tier in proportion to its weight
//!
//! Every stage is a pure function over immutable inputs; [`crate::store::RoutingEngine`]
//! publishes the results.

pub mod catalog;
pub mod policy;
pub mod score;
pub mod selector;
pub mod table;
pub mod weight;

pub use catalog::{Catalog, Provider, ProviderToken};
pub use policy::{RoutingPolicy, ValueNormalization};
pub use score::{RouteScore, RouteStats, StatsIndex};
pub use selector::{NoRouteAvailable, select_route, select_route_with_rng};
pub use table::{RebuildError, Route, RouteTable, WeightedRoute, rebuild};
pub use weight::final_weight;
