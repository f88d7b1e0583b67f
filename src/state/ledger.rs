//! Pending-delete ledger
//!
//! Plain text, one `<server_id> <network>` pair per line, kept sorted.
//! Entries are written when routes are added with tracking enabled and
//! removed once the matching route has been deleted from that server.

use super::{write_atomic, StateError};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// In-memory view of the ledger, keyed by server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingDeletes {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl PendingDeletes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, server_id: &str, network: &str) -> bool {
        self.entries
            .entry(server_id.to_string())
            .or_default()
            .insert(network.to_string())
    }

    pub fn remove(&mut self, server_id: &str, network: &str) -> bool {
        let Some(networks) = self.entries.get_mut(server_id) else {
            return false;
        };
        let removed = networks.remove(network);
        if networks.is_empty() {
            self.entries.remove(server_id);
        }
        removed
    }

    pub fn contains(&self, server_id: &str, network: &str) -> bool {
        self.entries
            .get(server_id)
            .is_some_and(|networks| networks.contains(network))
    }

    /// Networks pending deletion on one server
    pub fn for_server(&self, server_id: &str) -> BTreeSet<String> {
        self.entries.get(server_id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(server_id, networks)| {
            networks
                .iter()
                .map(move |network| (server_id.as_str(), network.as_str()))
        })
    }

    fn parse(content: &str, path: &Path) -> Self {
        let mut pending = Self::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(server_id), Some(network), None) => {
                    pending.insert(server_id, network);
                }
                _ => warn!(
                    "{}:{}: expected '<server_id> <network>', skipping {:?}",
                    path.display(),
                    lineno + 1,
                    line
                ),
            }
        }
        pending
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (server_id, network) in self.iter() {
            out.push_str(server_id);
            out.push(' ');
            out.push_str(network);
            out.push('\n');
        }
        out
    }
}

pub struct PendingDeleteLedger {
    path: PathBuf,
}

impl PendingDeleteLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger; absent or unreadable files yield an empty ledger
    pub fn load(&self) -> PendingDeletes {
        match fs::read_to_string(&self.path) {
            Ok(content) => PendingDeletes::parse(&content, &self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => PendingDeletes::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                PendingDeletes::new()
            }
        }
    }

    /// Overwrite the ledger with `pending`
    ///
    /// An empty set is never written, so an unrelated run cannot clobber
    /// the list. Returns whether the file was written.
    pub fn save(&self, pending: &PendingDeletes) -> Result<bool, StateError> {
        if pending.is_empty() {
            info!("No routes to save in {}", self.path.display());
            return Ok(false);
        }

        write_atomic(&self.path, pending.render().as_bytes())?;
        info!("Saved {} routes to {}", pending.len(), self.path.display());
        Ok(true)
    }

    /// Merge `networks` for `server_id` into the stored ledger
    ///
    /// Returns how many entries were new.
    pub fn record<'a, I>(&self, server_id: &str, networks: I) -> Result<usize, StateError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut pending = self.load();
        let added = networks
            .into_iter()
            .filter(|network| pending.insert(server_id, network))
            .count();
        if added > 0 {
            self.save(&pending)?;
        }
        Ok(added)
    }

    /// Drop entries for networks that were deleted from `server_id`
    ///
    /// Removes the file once the last entry is gone. Returns how many
    /// entries were removed.
    pub fn forget<'a, I>(&self, server_id: &str, networks: I) -> Result<usize, StateError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut pending = self.load();
        let removed = networks
            .into_iter()
            .filter(|network| pending.remove(server_id, network))
            .count();
        if removed == 0 {
            return Ok(0);
        }

        if pending.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => info!("Ledger {} is now empty, removed", self.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            self.save(&pending)?;
        }
        Ok(removed)
    }
}
