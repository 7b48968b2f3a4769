//! API request and response data models.
//!
//! Engine types that are already a good wire shape ([`RoutingPolicy`](crate::routing::RoutingPolicy),
//! [`Catalog`](crate::routing::Catalog), [`PriceQuote`](crate::pricing::PriceQuote), ...) are
//! used directly. The models here cover views that flatten or filter engine state.
//!
//! - [`routes`]: Weighted route listings, toggles, and selection
//! - [`pricing`]: Quote query parameters
//! - [`stats`]: Acknowledgement of pushed statistics

pub mod pricing;
pub mod routes;
pub mod stats;
