//! Read-only route backup: fetch the live table and overwrite the snapshot

use super::SyncError;
use crate::api::RouteApi;
use crate::state::SnapshotStore;
use tracing::info;

/// Fetch `server_id`'s routes into its snapshot, returning the live networks
pub async fn backup_routes<A: RouteApi + ?Sized>(
    api: &A,
    snapshots: &SnapshotStore,
    server_id: &str,
) -> Result<Vec<String>, SyncError> {
    info!("Fetching routes for server: {}", server_id);
    let routes = api
        .list_routes(server_id)
        .await
        .map_err(|source| SyncError::FetchRoutes {
            server_id: server_id.to_string(),
            source,
        })?;

    snapshots
        .save(server_id, &routes)
        .map_err(|source| SyncError::SaveSnapshot {
            server_id: server_id.to_string(),
            source,
        })?;
    Ok(routes.into_iter().map(|route| route.network).collect())
}
