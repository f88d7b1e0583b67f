//! Management API access
//!
//! The appliance exposes a small JSON API. Every call is signed
//! (see [`signature`]) and issued through [`ApiClient`]. The reconciler
//! only talks to the [`RouteApi`] trait so it can be exercised without a
//! live server.

pub mod client;
pub mod signature;

pub use client::{ApiClient, ApiError};
pub use signature::AuthHeaders;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A route as returned by `GET /server/{id}/route`
///
/// Only `network` and `id` are interpreted. Everything else the server
/// returns is kept in `extra` so snapshots preserve the full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Server-assigned identifier, required for deletion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub network: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Route {
    pub fn new(network: impl Into<String>, id: Option<String>) -> Self {
        Self {
            id,
            network: network.into(),
            extra: Map::new(),
        }
    }
}

/// A VPN server as listed by `GET /server`
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub id: String,
    pub name: String,
}

impl Server {
    /// Extract identity from a raw server document
    ///
    /// The id may appear as `_id`, `id` or `uuid` depending on the API
    /// version; the first one present wins.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = ["_id", "id", "uuid"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .filter(|id| !id.is_empty())?
            .to_string();

        let name = value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unknown-{}", id));

        Some(Self { id, name })
    }
}

/// Route and lifecycle operations the reconciler depends on
#[async_trait]
pub trait RouteApi: Send + Sync {
    async fn list_routes(&self, server_id: &str) -> Result<Vec<Route>, ApiError>;
    async fn add_route(&self, server_id: &str, network: &str) -> Result<(), ApiError>;
    async fn delete_route(&self, server_id: &str, route_id: &str) -> Result<(), ApiError>;
    async fn stop_server(&self, server_id: &str) -> Result<Option<Value>, ApiError>;
    async fn start_server(&self, server_id: &str) -> Result<Option<Value>, ApiError>;
}
