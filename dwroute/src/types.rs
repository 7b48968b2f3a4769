//! Common type definitions shared by the pricing and routing modules.
//!
//! This module defines:
//! - Type aliases for entity IDs (ProviderId, ProviderTokenId)
//! - [`RouteKey`], the identity of a derived route
//! - Ingestion helpers for the list-valued fields the admin console sends in several shapes
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`ProviderId`]: Upstream provider identifier
//! - [`ProviderTokenId`]: Per-provider access token identifier
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type ProviderId = Uuid;
pub type ProviderTokenId = Uuid;

/// Group every token and pricing record falls back to when none is configured.
pub const DEFAULT_GROUP: &str = "default";

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Identity of a route: one provider token serving one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct RouteKey {
    pub model_name: String,
    #[schema(value_type = String, format = "uuid")]
    pub provider_token_id: ProviderTokenId,
}

impl RouteKey {
    pub fn new(model_name: impl Into<String>, provider_token_id: ProviderTokenId) -> Self {
        Self {
            model_name: model_name.into(),
            provider_token_id,
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.model_name, abbrev_uuid(&self.provider_token_id))
    }
}

/// The admin console stores list fields as JSON arrays, as JSON-encoded strings
/// (`"[\"vip\",\"default\"]"`), or as comma separated strings. All three shapes are
/// accepted here so the rest of the engine only ever sees a typed list.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListShape {
    List(Vec<String>),
    Text(String),
}

/// Parse a list field in any of the accepted shapes.
///
/// Entries are trimmed, blanks dropped, and duplicates removed keeping the first
/// occurrence, so the result is an ordered set.
pub fn parse_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[')
        && let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed)
    {
        return normalize_list(items);
    }
    normalize_list(trimmed.split(',').map(str::to_string))
}

pub(crate) fn normalize_list(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim();
        if item.is_empty() || out.iter().any(|existing| existing == item) {
            continue;
        }
        out.push(item.to_string());
    }
    out
}

/// serde `deserialize_with` helper for ordered-set list fields. `null` becomes empty.
pub fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let shape = Option::<ListShape>::deserialize(deserializer)?;
    Ok(match shape {
        None => Vec::new(),
        Some(ListShape::List(items)) => normalize_list(items),
        Some(ListShape::Text(text)) => parse_list(&text),
    })
}

/// Like [`deserialize_list`], but an absent or empty list means "no list at all".
pub fn deserialize_optional_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = deserialize_list(deserializer)?;
    Ok(if items.is_empty() { None } else { Some(items) })
}
