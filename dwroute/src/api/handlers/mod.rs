//! HTTP request handlers for all API endpoints.
//!
//! Handlers are thin: they deserialize the request, call into the
//! [`RoutingEngine`](crate::store::RoutingEngine) held in [`AppState`](crate::AppState), and
//! serialize the result. Engine state is only ever read from one snapshot per request.
//!
//! # Handler Modules
//!
//! - [`group_ratios`]: Group price multiplier retrieval and replacement
//! - [`policy`]: Routing policy retrieval and replacement
//! - [`pricing`]: Price quotes per pricing record or model
//! - [`routes`]: Route table rebuild, listing, toggling, and selection
//! - [`stats`]: Pushing windowed route statistics
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts to the matching HTTP status code
//! with a plain text message.

pub mod group_ratios;
pub mod policy;
pub mod pricing;
pub mod routes;
pub mod stats;
