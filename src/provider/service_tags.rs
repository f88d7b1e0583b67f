//! Cloud service-tag document provider
//!
//! Reads a published IP-range document of the form
//!
//! ```json
//! { "values": [ { "name": "AzureDevOps", "id": "AzureDevOps",
//!                 "properties": { "systemService": "AzureDevOps",
//!                                 "addressPrefixes": ["13.107.6.0/24"] } } ] }
//! ```
//!
//! and unions the `addressPrefixes` of every entry whose `name`, `id` or
//! `systemService` matches one of the configured selectors.

use super::DesiredSetProvider;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

// Entries are decoded one by one so a malformed entry is skipped on its own
#[derive(Debug, Deserialize)]
struct ServiceTagsDocument {
    #[serde(default)]
    values: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceTagEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    system_service: Option<String>,
    #[serde(default)]
    properties: Option<ServiceTagProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceTagProperties {
    #[serde(default)]
    system_service: Option<String>,
    #[serde(default)]
    address_prefixes: Option<Vec<Value>>,
}

impl ServiceTagProperties {
    fn prefixes(self) -> impl Iterator<Item = String> {
        self.address_prefixes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|prefix| prefix.as_str().map(str::to_string))
    }
}

impl ServiceTagEntry {
    fn matches(&self, selectors: &BTreeSet<String>) -> bool {
        let nested = self
            .properties
            .as_ref()
            .and_then(|p| p.system_service.as_ref());
        [
            self.name.as_ref(),
            self.id.as_ref(),
            self.system_service.as_ref(),
            nested,
        ]
        .into_iter()
        .flatten()
        .any(|key| selectors.contains(key))
    }
}

pub struct ServiceTagsProvider {
    path: PathBuf,
    selectors: BTreeSet<String>,
}

impl ServiceTagsProvider {
    pub fn new<I, S>(path: impl Into<PathBuf>, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }

    /// Extract matching prefixes from document text
    pub fn resolve_str(&self, content: &str) -> BTreeSet<String> {
        let document: ServiceTagsDocument = match serde_json::from_str(content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("JSON parsing error in {}: {}", self.path.display(), e);
                return BTreeSet::new();
            }
        };

        document
            .values
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<ServiceTagEntry>(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping malformed service tag entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.matches(&self.selectors))
            .filter_map(|entry| entry.properties)
            .flat_map(ServiceTagProperties::prefixes)
            .collect()
    }
}

impl DesiredSetProvider for ServiceTagsProvider {
    fn name(&self) -> &str {
        "service-tags"
    }

    fn resolve(&self) -> BTreeSet<String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Service tags file {} unreadable: {}", self.path.display(), e);
                return BTreeSet::new();
            }
        };

        let networks = self.resolve_str(&content);
        info!(
            "Found {} prefixes for {:?} in {}",
            networks.len(),
            self.selectors,
            self.path.display()
        );
        networks
    }
}
