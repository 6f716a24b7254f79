//! Tenant directory types.

use std::sync::Arc;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ClientError;

/// An organization the current user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Backend identifier. Numeric ids are normalized to strings.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Display name. `null` reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    #[serde(default, alias = "logo_url", skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub social: SocialLinks,

    /// ISO-8601 string or epoch number, kept verbatim.
    #[serde(
        default,
        alias = "created_at",
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<String>,

    #[serde(
        default,
        alias = "updated_at",
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<String>,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logo_url: None,
            bio: None,
            description: None,
            social: SocialLinks::default(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// Optional social profile links of a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("invalid tenant id: {}", other))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!("invalid timestamp: {}", other))),
    }
}

/// Advisory UI signal emitted when the selection changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub from: Option<Tenant>,
    pub to: Tenant,
    pub duration: Duration,
}

/// Complete, immutable view of the directory published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryState {
    pub tenants: Arc<Vec<Tenant>>,
    pub selected: Option<Tenant>,
    pub loading: bool,
    /// Non-fatal error of the last refresh.
    pub error: Option<ClientError>,
    pub transition: Option<TransitionEvent>,
    /// When the held tenant list was fetched (epoch millis).
    pub fetched_at_ms: Option<u64>,
}

impl DirectoryState {
    /// True while a transition event is visible.
    pub fn transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tenants.iter().any(|t| t.id == id)
    }

    pub fn tenant(&self, id: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|t| t.id == id)
    }
}
