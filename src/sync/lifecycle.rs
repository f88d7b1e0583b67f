//! Server stop/start around route mutations
//!
//! Both operations are best-effort: failures are logged and reported to the
//! caller, never retried.

use crate::api::{ApiError, RouteApi};
use tracing::{info, warn};

pub struct ServerLifecycle<'a, A: RouteApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: RouteApi + ?Sized> ServerLifecycle<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub async fn stop(&self, server_id: &str) -> Result<(), ApiError> {
        match self.api.stop_server(server_id).await {
            Ok(response) => {
                info!("Server {} stop response: {}", server_id, describe(response));
                Ok(())
            }
            Err(e) => {
                warn!("Failed to stop server {}: {} (continuing)", server_id, e);
                Err(e)
            }
        }
    }

    pub async fn start(&self, server_id: &str) -> Result<(), ApiError> {
        match self.api.start_server(server_id).await {
            Ok(response) => {
                info!("Server {} start response: {}", server_id, describe(response));
                Ok(())
            }
            Err(e) => {
                warn!("Failed to start server {}: {}", server_id, e);
                Err(e)
            }
        }
    }
}

fn describe(response: Option<serde_json::Value>) -> String {
    match response {
        None => "no content".to_string(),
        Some(value) => match value.get("status").and_then(|s| s.as_str()) {
            Some(status) => status.to_string(),
            None => value.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fake::FakeApi;
    use serde_json::json;

    #[test]
    fn test_describe_response() {
        assert_eq!(describe(None), "no content");
        assert_eq!(describe(Some(json!({"status": "online"}))), "online");
        assert_eq!(describe(Some(json!({"id": "s1"}))), r#"{"id":"s1"}"#);
    }

    #[tokio::test]
    async fn test_stop_and_start_issue_operations() {
        let api = FakeApi::new();
        let lifecycle = ServerLifecycle::new(&api);

        lifecycle.stop("s1").await.unwrap();
        lifecycle.start("s1").await.unwrap();

        assert_eq!(api.calls(), vec!["stop s1", "start s1"]);
    }

    #[tokio::test]
    async fn test_stop_failure_is_reported() {
        let api = FakeApi::new();
        api.fail_stop();
        let lifecycle = ServerLifecycle::new(&api);

        let err = lifecycle.stop("s1").await.unwrap_err();
        assert_eq!(err.status(), Some(409));
    }
}
