//! Upstream providers and their access tokens, as supplied by the administration API.

use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

use crate::pricing::ModelPricing;
use crate::types::{DEFAULT_GROUP, ProviderId, ProviderTokenId, deserialize_optional_list};

/// An upstream LLM provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Provider {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProviderId,
    pub name: String,
    #[schema(value_type = String, format = "uri")]
    pub base_url: Url,
    /// Secret used against the upstream. Accepted on input, never echoed back.
    #[serde(default, skip_serializing)]
    pub credential: Option<String>,
    #[serde(default)]
    pub weight: i64,
    /// Lower value = higher precedence
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A credential on a provider, belonging to one user group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProviderToken {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProviderTokenId,
    #[schema(value_type = String, format = "uuid")]
    pub provider_id: ProviderId,
    pub name: String,
    /// Membership group; blank or absent means `default`
    #[serde(default = "default_group", deserialize_with = "deserialize_group")]
    pub group_name: String,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Models this token may serve. Absent or empty admits every model.
    #[serde(default, deserialize_with = "deserialize_optional_list")]
    pub models: Option<Vec<String>>,
}

impl ProviderToken {
    /// Membership group, with blank names mapped to `default`.
    pub fn group(&self) -> &str {
        match self.group_name.trim() {
            "" => DEFAULT_GROUP,
            group => group,
        }
    }

    /// Whether the allow-list admits `model`. An empty list admits everything.
    pub fn admits(&self, model: &str) -> bool {
        self.models
            .as_ref()
            .is_none_or(|models| models.is_empty() || models.iter().any(|m| m == model))
    }

    /// Selector pre-filter: the token itself is enabled and may serve `model`.
    pub fn can_serve(&self, model: &str) -> bool {
        self.enabled && self.admits(model)
    }
}

/// Everything a rebuild derives routes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Catalog {
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub tokens: Vec<ProviderToken>,
    #[serde(default)]
    pub pricings: Vec<ModelPricing>,
}

impl Catalog {
    pub fn provider(&self, id: ProviderId) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Pricing records for `model`, in catalog order.
    pub fn pricings_for<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a ModelPricing> + 'a {
        self.pricings.iter().filter(move |p| p.model_name == model)
    }
}

fn default_true() -> bool {
    true
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn deserialize_group<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw.as_deref().map(str::trim) {
        Some(group) if !group.is_empty() => group.to_string(),
        _ => default_group(),
    })
}
