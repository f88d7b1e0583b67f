//! Configuration handling for vpn-route-sync
//!
//! The config file is TOML. It is loaded and validated once at startup so
//! that missing credentials surface as a [`ConfigError`] before any request
//! is built.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Default config file name, looked up in the current directory first
pub const CONFIG_FILE_NAME: &str = "vpn-route-sync.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Missing required setting: {0}")]
    MissingField(&'static str),
    #[error("Invalid setting {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub service_tags: ServiceTagsConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// PEM certificate presented to the appliance (mutual TLS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_cert: Option<PathBuf>,
    /// PEM private key matching `client_cert`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one route snapshot per server
    pub backup_dir: PathBuf,
    pub pending_delete_file: PathBuf,
    pub static_routes_file: PathBuf,
    pub service_tags_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("routes_backup"),
            pending_delete_file: PathBuf::from("routes_to_delete.txt"),
            static_routes_file: PathBuf::from("routes_to_add.txt"),
            service_tags_file: PathBuf::from("ServiceTags_Public.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTagsConfig {
    /// Matched against an entry's `name`, `id` or `systemService`
    pub selectors: Vec<String>,
}

impl Default for ServiceTagsConfig {
    fn default() -> Self {
        Self {
            selectors: vec![
                "AzureDevOps".to_string(),
                "AzureCloud.westeurope".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: String,
    #[serde(default = "default_server_name")]
    pub name: String,
}

/// Per-server network grouping, as written by `discover`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGroup {
    pub server_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default)]
    pub network: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_server_name() -> String {
    "Unknown Server".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "https://vpn.example.com".to_string(),
                api_token: "CHANGE_ME".to_string(),
                api_secret: "CHANGE_ME".to_string(),
                timeout_secs: default_timeout_secs(),
                client_cert: None,
                client_key: None,
            },
            paths: PathsConfig::default(),
            service_tags: ServiceTagsConfig::default(),
            servers: vec![ServerEntry {
                id: "000000000000000000000000".to_string(),
                name: default_server_name(),
            }],
            routes: Vec::new(),
        }
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Find the config file: explicit path, then `./vpn-route-sync.toml`,
    /// then `~/.vpn-route-sync/config.toml`.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        let home = dirs::home_dir()?.join(".vpn-route-sync").join("config.toml");
        if home.exists() {
            info!("Using config from {}", home.display());
            return Some(home);
        }

        None
    }

    /// Check required settings and normalize `base_url`
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let api = &mut self.api;
        if api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("api.base_url"));
        }
        if api.api_token.trim().is_empty() {
            return Err(ConfigError::MissingField("api.api_token"));
        }
        if api.api_secret.is_empty() {
            return Err(ConfigError::MissingField("api.api_secret"));
        }

        let base_url = api.base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(ConfigError::InvalidField {
                field: "api.base_url",
                reason: format!("expected an http(s) URL, got {:?}", base_url),
            });
        }
        api.base_url = base_url;

        if api.timeout_secs == 0 {
            return Err(ConfigError::InvalidField {
                field: "api.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        match (&api.client_cert, &api.client_key) {
            (Some(_), None) => return Err(ConfigError::MissingField("api.client_key")),
            (None, Some(_)) => return Err(ConfigError::MissingField("api.client_cert")),
            _ => {}
        }

        if let Some(entry) = self.servers.iter().find(|s| s.id.trim().is_empty()) {
            return Err(ConfigError::InvalidField {
                field: "servers.id",
                reason: format!("server {:?} has an empty id", entry.name),
            });
        }

        Ok(())
    }

    /// Servers to reconcile: `servers` in listed order, then any `routes`
    /// grouping whose server is not already listed.
    pub fn targets(&self) -> Vec<ServerEntry> {
        let mut targets = self.servers.clone();
        for group in &self.routes {
            if !targets.iter().any(|t| t.id == group.server_id) {
                targets.push(ServerEntry {
                    id: group.server_id.clone(),
                    name: group
                        .server_name
                        .clone()
                        .unwrap_or_else(default_server_name),
                });
            }
        }
        targets
    }
}
