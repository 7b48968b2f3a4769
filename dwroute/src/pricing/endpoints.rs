//! Advertised API endpoints for a model.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tag used when a pricing record lists no endpoint types.
pub const DEFAULT_ENDPOINT_TYPE: &str = "openai";

const MODEL_PLACEHOLDER: &str = "{model}";

/// (tag, method, path template)
const KNOWN_ENDPOINTS: &[(&str, &str, &str)] = &[
    ("openai", "POST", "/v1/chat/completions"),
    ("openai-response", "POST", "/v1/responses"),
    ("anthropic", "POST", "/v1/messages"),
    ("gemini", "POST", "/v1beta/models/{model}:generateContent"),
    ("embeddings", "POST", "/v1/embeddings"),
    ("image-generation", "POST", "/v1/images/generations"),
    ("jina-rerank", "POST", "/v1/rerank"),
];

/// One endpoint a caller can use for a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResolvedEndpoint {
    pub endpoint_type: String,
    pub method: String,
    /// Request path with the model substituted. Empty for unknown endpoint types.
    pub path: String,
}

/// Resolve endpoint tags into concrete paths for `model_name`.
///
/// Unknown tags still produce an entry, with an empty path and method `POST`.
pub fn resolve_endpoints(endpoint_types: &[String], model_name: &str) -> Vec<ResolvedEndpoint> {
    if endpoint_types.is_empty() {
        return vec![resolve_one(DEFAULT_ENDPOINT_TYPE, model_name)];
    }
    endpoint_types.iter().map(|tag| resolve_one(tag, model_name)).collect()
}

fn resolve_one(tag: &str, model_name: &str) -> ResolvedEndpoint {
    match KNOWN_ENDPOINTS.iter().find(|(known, _, _)| *known == tag) {
        Some((_, method, template)) => ResolvedEndpoint {
            endpoint_type: tag.to_string(),
            method: method.to_string(),
            path: template.replace(MODEL_PLACEHOLDER, model_name),
        },
        None => ResolvedEndpoint {
            endpoint_type: tag.to_string(),
            method: "POST".to_string(),
            path: String::new(),
        },
    }
}
