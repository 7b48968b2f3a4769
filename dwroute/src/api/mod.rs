//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything is mounted under `/admin/api/v1`:
//!
//! - **Routing policy** (`/routing-policy`): Weighting and health parameters
//! - **Group ratios** (`/group-ratios`): Per-group price multipliers
//! - **Routes** (`/routes/*`): Rebuild, inspection, manual toggles, and selection
//! - **Route stats** (`/route-stats`): Windowed usage and health statistics
//! - **Pricing** (`/pricing/*`): Resolved price quotes
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. API documentation is available at
//! `/admin/docs` when the server is running.

pub mod handlers;
pub mod models;
