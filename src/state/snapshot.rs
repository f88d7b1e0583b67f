//! Per-server route snapshots
//!
//! One JSON file per server, `server_<id>_routes.json`, overwritten
//! wholesale every time routes are fetched fresh. Deletions resolve route
//! ids from here and never from guesswork.

use super::{write_atomic, StateError};
use crate::api::Route;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct SnapshotRef<'a> {
    server_id: &'a str,
    routes: &'a [Route],
}

// Routes are read back loosely so one odd entry cannot void the file
#[derive(Debug, Deserialize)]
struct SnapshotFile {
    server_id: String,
    #[serde(default)]
    routes: Vec<Value>,
}

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, server_id: &str) -> PathBuf {
        self.dir.join(format!("server_{}_routes.json", server_id))
    }

    /// Replace the server's snapshot with `routes`
    pub fn save(&self, server_id: &str, routes: &[Route]) -> Result<PathBuf, StateError> {
        let path = self.path_for(server_id);
        let content = serde_json::to_vec_pretty(&SnapshotRef { server_id, routes })?;
        write_atomic(&path, &content)?;
        info!("Saved {} routes to {}", routes.len(), path.display());
        Ok(path)
    }

    /// Network → route id for the server's last snapshot
    ///
    /// A missing or unreadable snapshot yields an empty map.
    pub fn load(&self, server_id: &str) -> BTreeMap<String, String> {
        match self.try_load(server_id) {
            Ok(Some(map)) => map,
            Ok(None) => {
                info!("No backup routes found for {}", server_id);
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Ignoring snapshot for {}: {}", server_id, e);
                BTreeMap::new()
            }
        }
    }

    /// Strict variant of [`load`](Self::load); `Ok(None)` when absent
    pub fn try_load(&self, server_id: &str) -> Result<Option<BTreeMap<String, String>>, StateError> {
        let path = self.path_for(server_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file: SnapshotFile =
            serde_json::from_str(&content).map_err(|e| StateError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if file.server_id != server_id {
            return Err(StateError::Corrupt {
                path,
                reason: format!("snapshot belongs to server {}", file.server_id),
            });
        }

        let mut map = BTreeMap::new();
        for route in &file.routes {
            let network = route.get("network").and_then(Value::as_str);
            let id = route.get("id").and_then(Value::as_str);
            match (network, id) {
                (Some(network), Some(id)) => {
                    map.insert(network.to_string(), id.to_string());
                }
                _ => debug!("Skipping snapshot entry without network/id: {}", route),
            }
        }
        Ok(Some(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn route(network: &str, id: &str) -> Route {
        Route::new(network, Some(id.to_string()))
    }

    #[test]
    fn test_path_layout() {
        let store = SnapshotStore::new("routes_backup");
        assert_eq!(
            store.path_for("abc"),
            PathBuf::from("routes_backup/server_abc_routes.json")
        );
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("backup"));
        assert!(store.load("s1").is_empty());
        assert!(store.try_load("s1").unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_maps_network_to_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("backup"));

        store
            .save("s1", &[route("10.2.0.0/16", "r1"), route("10.3.0.0/16", "r2")])
            .unwrap();

        let map = store.load("s1");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("10.2.0.0/16").map(String::as_str), Some("r1"));
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());

        store.save("s1", &[route("10.2.0.0/16", "r1")]).unwrap();
        store.save("s1", &[route("10.4.0.0/16", "r4")]).unwrap();

        let map = store.load("s1");
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("10.4.0.0/16"));
    }

    #[test]
    fn test_entries_without_id_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());

        store
            .save("s1", &[Route::new("10.5.0.0/16", None), route("10.6.0.0/16", "r6")])
            .unwrap();

        let map = store.load("s1");
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("10.6.0.0/16"));
    }

    #[test]
    fn test_corrupt_snapshot_treated_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());
        fs::write(store.path_for("s1"), "{ not json").unwrap();

        assert!(matches!(store.try_load("s1"), Err(StateError::Corrupt { .. })));
        assert!(store.load("s1").is_empty());
    }

    #[test]
    fn test_snapshot_for_other_server_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());
        store.save("s2", &[route("10.2.0.0/16", "r1")]).unwrap();
        fs::rename(store.path_for("s2"), store.path_for("s1")).unwrap();

        assert!(store.try_load("s1").is_err());
        assert!(store.load("s1").is_empty());
    }
}
