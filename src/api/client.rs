//! Signed HTTP client for the management API
//!
//! Stateless apart from the connection pool, so one client can be shared by
//! every server in a run. No retries happen here; callers decide what a
//! failure means.

use super::signature::AuthHeaders;
use super::{Route, RouteApi, Server};
use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::{Client, Identity, Method};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection refused, timeout, TLS failure and similar
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to load client certificate: {0}")]
    ClientCertificate(String),
}

impl ApiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
    secret: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let (Some(cert), Some(key)) = (&config.client_cert, &config.client_key) {
            let mut pem = std::fs::read(cert).map_err(|e| {
                ApiError::ClientCertificate(format!("{}: {}", cert.display(), e))
            })?;
            let key_pem = std::fs::read(key)
                .map_err(|e| ApiError::ClientCertificate(format!("{}: {}", key.display(), e)))?;
            pem.push(b'\n');
            pem.extend_from_slice(&key_pem);
            let identity = Identity::from_pem(&pem)
                .map_err(|e| ApiError::ClientCertificate(e.to_string()))?;
            builder = builder.identity(identity);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            secret: config.api_secret.clone(),
        })
    }

    /// Issue one signed request
    ///
    /// Returns `Ok(None)` for a successful response with an empty body.
    /// `path` is signed exactly as it is appended to the base URL.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let headers = AuthHeaders::new(&self.token, &self.secret, method.as_str(), path);
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        if !matches!(status, 200 | 201 | 204) {
            return Err(ApiError::Status { status, body: text });
        }

        if text.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&text)?))
    }

    /// `GET /server`
    pub async fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
        let items: Vec<Value> = match self.execute(Method::GET, "/server", None).await? {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        Ok(items.iter().filter_map(Server::from_value).collect())
    }

    /// `GET /server/{id}`, returned as the raw document
    pub async fn get_server(&self, server_id: &str) -> Result<Value, ApiError> {
        let path = format!("/server/{}", server_id);
        Ok(self
            .execute(Method::GET, &path, None)
            .await?
            .unwrap_or(Value::Null))
    }

    async fn operation(&self, server_id: &str, op: &str) -> Result<Option<Value>, ApiError> {
        let path = format!("/server/{}/operation/{}", server_id, op);
        self.execute(Method::PUT, &path, None).await
    }
}

fn routes_path(server_id: &str) -> String {
    format!("/server/{}/route", server_id)
}

#[async_trait]
impl RouteApi for ApiClient {
    async fn list_routes(&self, server_id: &str) -> Result<Vec<Route>, ApiError> {
        match self.execute(Method::GET, &routes_path(server_id), None).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    async fn add_route(&self, server_id: &str, network: &str) -> Result<(), ApiError> {
        let body = json!({ "network": network });
        self.execute(Method::POST, &routes_path(server_id), Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_route(&self, server_id: &str, route_id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", routes_path(server_id), route_id);
        self.execute(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn stop_server(&self, server_id: &str) -> Result<Option<Value>, ApiError> {
        self.operation(server_id, "stop").await
    }

    async fn start_server(&self, server_id: &str) -> Result<Option<Value>, ApiError> {
        self.operation(server_id, "start").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn test_config(base_url: String) -> ApiConfig {
        ApiConfig {
            base_url,
            api_token: "tok".to_string(),
            api_secret: "secret".to_string(),
            timeout_secs: 5,
            client_cert: None,
            client_key: None,
        }
    }

    /// Answer a single HTTP request with a canned response and hand back
    /// the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + len {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Status {
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "API error 401: unauthorized");
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_missing_client_certificate() {
        let mut config = test_config("https://vpn.example.com".to_string());
        config.client_cert = Some("/nonexistent/client.crt".into());
        config.client_key = Some("/nonexistent/client.key".into());

        let result = ApiClient::new(&config);
        assert!(matches!(result, Err(ApiError::ClientCertificate(_))));
    }

    #[tokio::test]
    async fn test_list_routes_sends_signed_request() {
        let (base_url, server) =
            serve_once("200 OK", r#"[{"id":"r1","network":"10.0.0.0/16"}]"#).await;
        let client = ApiClient::new(&test_config(base_url)).unwrap();

        let routes = client.list_routes("s1").await.unwrap();
        assert_eq!(routes, vec![Route::new("10.0.0.0/16", Some("r1".to_string()))]);

        let request = server.await.unwrap();
        let lower = request.to_lowercase();
        assert!(request.starts_with("GET /server/s1/route HTTP/1.1"));
        assert!(lower.contains("auth-token: tok"));
        assert!(lower.contains("auth-timestamp: "));
        assert!(lower.contains("auth-nonce: "));
        assert!(lower.contains("auth-signature: "));
    }

    #[tokio::test]
    async fn test_add_route_posts_json_body() {
        let (base_url, server) = serve_once("201 Created", r#"{"id":"r9"}"#).await;
        let client = ApiClient::new(&test_config(base_url)).unwrap();

        client.add_route("s1", "10.1.0.0/16").await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /server/s1/route HTTP/1.1"));
        assert!(request.contains(r#"{"network":"10.1.0.0/16"}"#));
    }

    #[tokio::test]
    async fn test_empty_body_is_no_content_success() {
        let (base_url, server) = serve_once("200 OK", "").await;
        let client = ApiClient::new(&test_config(base_url)).unwrap();

        let response = client.stop_server("s1").await.unwrap();
        assert!(response.is_none());

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /server/s1/operation/stop HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        let (base_url, server) = serve_once("500 Internal Server Error", "boom").await;
        let client = ApiClient::new(&test_config(base_url)).unwrap();

        let err = client.delete_route("s1", "r1").await.unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }

        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /server/s1/route/r1 HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_list_servers_decodes_ids() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"[{"id":"s1","name":"one"},{"_id":"s2"},{"name":"broken"}]"#,
        )
        .await;
        let client = ApiClient::new(&test_config(base_url)).unwrap();

        let servers = client.list_servers().await.unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].name, "one");
        assert_eq!(servers[1].id, "s2");
        assert_eq!(servers[1].name, "Unknown-s2");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(&test_config(format!("http://{}", addr))).unwrap();
        let err = client.list_routes("s1").await.unwrap_err();
        assert!(err.is_transport());
    }
}
