//! Server discovery
//!
//! Lists every server the API knows about and appends the ones missing
//! from the config's `[[routes]]` groupings, with their configured
//! networks (or their live route networks when none are configured).
//! `backup` uses [`record_route_group`] to write live networks back.

use crate::api::{ApiClient, ApiError, RouteApi, Server};
use crate::config::{Config, RouteGroup};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredServer {
    pub server: Server,
    pub networks: Vec<String>,
}

/// Fetch all servers with their networks
pub async fn discover_servers(client: &ApiClient) -> Result<Vec<DiscoveredServer>, ApiError> {
    let servers = client.list_servers().await?;
    info!("Found {} servers", servers.len());

    let mut discovered = Vec::with_capacity(servers.len());
    for server in servers {
        let mut networks = match client.get_server(&server.id).await {
            Ok(details) => networks_from_details(&details),
            Err(e) => {
                warn!("Failed to get details for {}: {}", server.id, e);
                Vec::new()
            }
        };

        if networks.is_empty() {
            networks = match client.list_routes(&server.id).await {
                Ok(routes) => routes.into_iter().map(|r| r.network).collect(),
                Err(e) => {
                    warn!("Failed to get routes for {}: {}", server.id, e);
                    Vec::new()
                }
            };
        }

        discovered.push(DiscoveredServer { server, networks });
    }
    Ok(discovered)
}

/// `networks` from a server document, ignoring non-string entries
pub fn networks_from_details(details: &Value) -> Vec<String> {
    details
        .get("networks")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Append servers not yet grouped in `config.routes`; returns how many
pub fn merge_discovered(config: &mut Config, discovered: Vec<DiscoveredServer>) -> usize {
    let mut added = 0;
    for item in discovered {
        if config.routes.iter().any(|g| g.server_id == item.server.id) {
            continue;
        }
        info!(
            "Adding server {} ({}) with {} networks",
            item.server.name,
            item.server.id,
            item.networks.len()
        );
        config.routes.push(RouteGroup {
            server_id: item.server.id,
            server_name: Some(item.server.name),
            network: item.networks,
        });
        added += 1;
    }
    added
}

/// Set the `[[routes]]` networks of `server_id` to `networks`
///
/// Replaces the networks of an existing group or appends a new one.
/// Returns `true` when a group was appended.
pub fn record_route_group(config: &mut Config, server_id: &str, networks: Vec<String>) -> bool {
    if let Some(group) = config.routes.iter_mut().find(|g| g.server_id == server_id) {
        group.network = networks;
        return false;
    }

    config.routes.push(RouteGroup {
        server_id: server_id.to_string(),
        server_name: None,
        network: networks,
    });
    true
}
