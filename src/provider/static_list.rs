//! Operator-maintained list of networks, one per line

use super::DesiredSetProvider;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct StaticListProvider {
    path: PathBuf,
}

impl StaticListProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(content: &str) -> BTreeSet<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl DesiredSetProvider for StaticListProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn resolve(&self) -> BTreeSet<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let networks = Self::parse(&content);
                info!("Read {} networks from {}", networks.len(), self.path.display());
                networks
            }
            Err(e) => {
                warn!("No route list at {}: {}", self.path.display(), e);
                BTreeSet::new()
            }
        }
    }
}
