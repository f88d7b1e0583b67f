//! Route reconciliation
//!
//! Per server, strictly in order:
//!
//! ```text
//! Idle → Stopping → FetchingCurrent → Diffing → Adding → [Deleting] → Starting → Done
//! ```
//!
//! Any step may end in `Failed`; `Starting` still runs so the server is not
//! left down. Per-route failures are counted and skipped, they never abort
//! the batch.

pub mod backup;
#[cfg(test)]
pub(crate) mod fake;
pub mod lifecycle;
pub mod plan;
pub mod reconciler;

pub use backup::backup_routes;
pub use lifecycle::ServerLifecycle;
pub use plan::Plan;
pub use reconciler::{ReconcileOptions, Reconciler};

use crate::api::ApiError;
use crate::state::StateError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to fetch routes for server {server_id}: {source}")]
    FetchRoutes {
        server_id: String,
        #[source]
        source: ApiError,
    },
    #[error("Failed to save snapshot for server {server_id}: {source}")]
    SaveSnapshot {
        server_id: String,
        #[source]
        source: StateError,
    },
}

impl SyncError {
    /// Phase the run was in when it failed
    pub fn phase(&self) -> Phase {
        match self {
            SyncError::FetchRoutes { .. } | SyncError::SaveSnapshot { .. } => {
                Phase::FetchingCurrent
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Stopping,
    FetchingCurrent,
    Diffing,
    Adding,
    Deleting,
    Starting,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Stopping => "stopping",
            Phase::FetchingCurrent => "fetching current routes",
            Phase::Diffing => "diffing",
            Phase::Adding => "adding",
            Phase::Deleting => "deleting",
            Phase::Starting => "starting",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Failed { phase: Phase, reason: String },
}

/// Result of reconciling one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub server_id: String,
    pub server_name: String,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    /// Networks whose add or delete call failed
    pub failed: Vec<String>,
    pub skipped_existing: usize,
    pub skipped_pending: usize,
    /// Pending deletions with no snapshot entry to resolve an id from
    pub skipped_unknown_id: usize,
    pub stopped: bool,
    pub started: bool,
    pub outcome: Outcome,
}

impl Summary {
    pub fn new(server_id: &str, server_name: &str) -> Self {
        Self {
            server_id: server_id.to_string(),
            server_name: server_name.to_string(),
            added: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
            skipped_existing: 0,
            skipped_pending: 0,
            skipped_unknown_id: 0,
            stopped: false,
            started: false,
            outcome: Outcome::Done,
        }
    }

    pub fn errors(&self) -> usize {
        self.failed.len()
    }

    /// Completed, every route call succeeded and the server came back up
    pub fn is_clean(&self) -> bool {
        self.outcome == Outcome::Done && self.failed.is_empty() && self.started
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): added {}, already present {}, pending delete {}, deleted {}, no id {}, errors {}",
            self.server_name,
            self.server_id,
            self.added.len(),
            self.skipped_existing,
            self.skipped_pending,
            self.deleted.len(),
            self.skipped_unknown_id,
            self.errors()
        )?;
        if !self.started {
            write!(f, " [start failed]")?;
        }
        if let Outcome::Failed { phase, reason } = &self.outcome {
            write!(f, " [FAILED while {}: {}]", phase, reason)?;
        }
        Ok(())
    }
}

/// Totals across every server in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub servers: usize,
    pub failed_servers: usize,
    pub added: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl Tally {
    pub fn record(&mut self, summary: &Summary) {
        self.servers += 1;
        if !summary.is_clean() {
            self.failed_servers += 1;
        }
        self.added += summary.added.len();
        self.deleted += summary.deleted.len();
        self.skipped +=
            summary.skipped_existing + summary.skipped_pending + summary.skipped_unknown_id;
        self.errors += summary.errors();
    }

    pub fn is_success(&self) -> bool {
        self.failed_servers == 0 && self.errors == 0
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} servers ({} with problems): added {}, deleted {}, skipped {}, errors {}",
            self.servers, self.failed_servers, self.added, self.deleted, self.skipped, self.errors
        )
    }
}
