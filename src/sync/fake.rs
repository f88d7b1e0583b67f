//! In-memory `RouteApi` for reconciler tests

use crate::api::{ApiError, Route, RouteApi};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Default)]
struct FakeState {
    /// server id → network → route id
    routes: BTreeMap<String, BTreeMap<String, String>>,
    next_id: u32,
    calls: Vec<String>,
    fail_add: BTreeSet<String>,
    fail_delete: BTreeSet<String>,
    fail_list: bool,
    fail_stop: bool,
    fail_start: bool,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

fn status_error(status: u16, body: &str) -> ApiError {
    ApiError::Status {
        status,
        body: body.to_string(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(server_id: &str, routes: &[(&str, &str)]) -> Self {
        let api = Self::new();
        {
            let mut state = api.state.lock().unwrap();
            let table = state.routes.entry(server_id.to_string()).or_default();
            for (network, id) in routes {
                table.insert(network.to_string(), id.to_string());
            }
        }
        api
    }

    pub fn fail_add(&self, network: &str) {
        self.state.lock().unwrap().fail_add.insert(network.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_add.clear();
        state.fail_delete.clear();
        state.fail_list = false;
        state.fail_stop = false;
        state.fail_start = false;
    }

    pub fn fail_delete(&self, route_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_delete
            .insert(route_id.to_string());
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_stop(&self) {
        self.state.lock().unwrap().fail_stop = true;
    }

    pub fn fail_start(&self) {
        self.state.lock().unwrap().fail_start = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        let prefix = format!("{} ", verb);
        self.calls().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    pub fn networks(&self, server_id: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .routes
            .get(server_id)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RouteApi for FakeApi {
    async fn list_routes(&self, server_id: &str) -> Result<Vec<Route>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list {}", server_id));
        if state.fail_list {
            return Err(status_error(503, "unavailable"));
        }
        Ok(state
            .routes
            .get(server_id)
            .map(|table| {
                table
                    .iter()
                    .map(|(network, id)| Route::new(network.clone(), Some(id.clone())))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_route(&self, server_id: &str, network: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("add {} {}", server_id, network));
        if state.fail_add.contains(network) {
            return Err(status_error(400, "invalid network"));
        }
        state.next_id += 1;
        let id = format!("new{}", state.next_id);
        state
            .routes
            .entry(server_id.to_string())
            .or_default()
            .insert(network.to_string(), id);
        Ok(())
    }

    async fn delete_route(&self, server_id: &str, route_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {} {}", server_id, route_id));
        if state.fail_delete.contains(route_id) {
            return Err(status_error(500, "delete failed"));
        }
        let Some(table) = state.routes.get_mut(server_id) else {
            return Err(status_error(404, "route not found"));
        };
        let before = table.len();
        table.retain(|_, id| id != route_id);
        if table.len() == before {
            return Err(status_error(404, "route not found"));
        }
        Ok(())
    }

    async fn stop_server(&self, server_id: &str) -> Result<Option<Value>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("stop {}", server_id));
        if state.fail_stop {
            return Err(status_error(409, "already stopped"));
        }
        Ok(Some(json!({ "id": server_id, "status": "offline" })))
    }

    async fn start_server(&self, server_id: &str) -> Result<Option<Value>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("start {}", server_id));
        if state.fail_start {
            return Err(status_error(500, "start failed"));
        }
        Ok(Some(json!({ "id": server_id, "status": "online" })))
    }
}
