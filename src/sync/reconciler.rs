//! The reconciliation driver
//!
//! One `Reconciler` handles every flow: adding from a provider with or
//! without ledger tracking, and deleting ledger entries. The options decide
//! which phases run; the orchestration is shared.

use super::lifecycle::ServerLifecycle;
use super::plan::Plan;
use super::{Outcome, Phase, Summary, SyncError};
use crate::api::RouteApi;
use crate::config::ServerEntry;
use crate::provider::DesiredSetProvider;
use crate::state::{PendingDeleteLedger, SnapshotStore};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Record successfully added networks in the pending-delete ledger
    pub track_added: bool,
    /// Run the deleting phase for snapshot ∩ ledger
    pub delete: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            track_added: true,
            delete: false,
        }
    }
}

impl ReconcileOptions {
    pub fn add(track_added: bool) -> Self {
        Self {
            track_added,
            delete: false,
        }
    }

    pub fn delete() -> Self {
        Self {
            track_added: false,
            delete: true,
        }
    }
}

pub struct Reconciler<'a, A: RouteApi + ?Sized> {
    api: &'a A,
    snapshots: &'a SnapshotStore,
    ledger: &'a PendingDeleteLedger,
    options: ReconcileOptions,
}

impl<'a, A: RouteApi + ?Sized> Reconciler<'a, A> {
    pub fn new(
        api: &'a A,
        snapshots: &'a SnapshotStore,
        ledger: &'a PendingDeleteLedger,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            api,
            snapshots,
            ledger,
            options,
        }
    }

    /// Reconcile every server in order against the provider's set
    ///
    /// The desired set is resolved once for the whole run. An empty set
    /// outside the delete workflow means there is nothing to do, and no
    /// server is stopped.
    pub async fn run(
        &self,
        servers: &[ServerEntry],
        provider: &dyn DesiredSetProvider,
    ) -> Vec<Summary> {
        let desired = provider.resolve();
        if desired.is_empty() && !self.options.delete {
            warn!(
                "Provider {} produced no networks, nothing to sync",
                provider.name()
            );
            return Vec::new();
        }

        let mut summaries = Vec::with_capacity(servers.len());
        for server in servers {
            summaries.push(self.reconcile(server, &desired).await);
        }
        summaries
    }

    /// Reconcile one server; start is always attempted exactly once
    pub async fn reconcile(&self, server: &ServerEntry, desired: &BTreeSet<String>) -> Summary {
        let server_id = server.id.as_str();
        info!("Managing server: {} ({})", server.name, server_id);

        let mut summary = Summary::new(server_id, &server.name);
        let lifecycle = ServerLifecycle::new(self.api);
        enter(server_id, Phase::Idle);

        enter(server_id, Phase::Stopping);
        summary.stopped = lifecycle.stop(server_id).await.is_ok();

        let result = self.apply(server_id, desired, &mut summary).await;

        enter(server_id, Phase::Starting);
        summary.started = lifecycle.start(server_id).await.is_ok();

        match result {
            Ok(()) => enter(server_id, Phase::Done),
            Err(e) => {
                error!("{}", e);
                enter(server_id, Phase::Failed);
                summary.outcome = Outcome::Failed {
                    phase: e.phase(),
                    reason: e.to_string(),
                };
            }
        }

        info!("{}", summary);
        summary
    }

    async fn apply(
        &self,
        server_id: &str,
        desired: &BTreeSet<String>,
        summary: &mut Summary,
    ) -> Result<(), SyncError> {
        enter(server_id, Phase::FetchingCurrent);
        let routes =
            self.api
                .list_routes(server_id)
                .await
                .map_err(|source| SyncError::FetchRoutes {
                    server_id: server_id.to_string(),
                    source,
                })?;
        let existing: BTreeSet<String> = routes.iter().map(|r| r.network.clone()).collect();
        debug!("Server {} has {} routes", server_id, existing.len());

        if let Err(e) = self.snapshots.save(server_id, &routes) {
            warn!("Failed to save snapshot for {}: {}", server_id, e);
        }

        enter(server_id, Phase::Diffing);
        let pending = self.ledger.load().for_server(server_id);
        let snapshot = if self.options.delete {
            self.snapshots.load(server_id)
        } else {
            BTreeMap::new()
        };
        let plan = Plan::build(desired, &existing, &pending, &snapshot, self.options.delete);

        for network in &plan.already_present {
            info!("Route {} already present on {}, skipping", network, server_id);
        }
        for network in &plan.suppressed {
            info!("Route {} is pending deletion on {}, skipping", network, server_id);
        }
        summary.skipped_existing = plan.already_present.len();
        summary.skipped_pending = plan.suppressed.len();
        if plan.is_empty() {
            info!("No route changes needed on {}", server_id);
        }

        enter(server_id, Phase::Adding);
        for network in &plan.to_add {
            match self.api.add_route(server_id, network).await {
                Ok(()) => {
                    info!("Added route {} to server {}", network, server_id);
                    summary.added.push(network.clone());
                }
                Err(e) => {
                    warn!("Failed to add route {} to server {}: {}", network, server_id, e);
                    summary.failed.push(network.clone());
                }
            }
        }

        if self.options.track_added && !summary.added.is_empty() {
            match self
                .ledger
                .record(server_id, summary.added.iter().map(String::as_str))
            {
                Ok(n) => debug!("Recorded {} new pending-delete entries", n),
                Err(e) => error!(
                    "Failed to record added routes in {}: {}",
                    self.ledger.path().display(),
                    e
                ),
            }
        }

        if self.options.delete {
            enter(server_id, Phase::Deleting);
            self.delete(server_id, &plan, summary).await;
        }

        if !summary.added.is_empty() || !summary.deleted.is_empty() {
            self.refresh_snapshot(server_id).await;
        }

        Ok(())
    }

    async fn delete(&self, server_id: &str, plan: &Plan, summary: &mut Summary) {
        for network in &plan.unknown_id {
            info!(
                "No snapshot entry for {} on {}, skipping deletion",
                network, server_id
            );
        }
        summary.skipped_unknown_id = plan.unknown_id.len();

        if plan.to_delete.is_empty() {
            info!("No matching routes found for deletion on {}", server_id);
            return;
        }

        for (network, route_id) in &plan.to_delete {
            match self.api.delete_route(server_id, route_id).await {
                Ok(()) => {
                    info!("Deleted route {} (ID: {}) from {}", network, route_id, server_id);
                    summary.deleted.push(network.clone());
                }
                Err(e) => {
                    warn!(
                        "Failed to delete route {} (ID: {}) from {}: {}",
                        network, route_id, server_id, e
                    );
                    summary.failed.push(network.clone());
                }
            }
        }

        if !summary.deleted.is_empty() {
            if let Err(e) = self
                .ledger
                .forget(server_id, summary.deleted.iter().map(String::as_str))
            {
                error!(
                    "Failed to clear deleted routes from {}: {}",
                    self.ledger.path().display(),
                    e
                );
            }
        }
    }

    /// Re-read the live table after mutations and overwrite the snapshot
    async fn refresh_snapshot(&self, server_id: &str) {
        match self.api.list_routes(server_id).await {
            Ok(routes) => {
                if let Err(e) = self.snapshots.save(server_id, &routes) {
                    warn!("Failed to save snapshot for {}: {}", server_id, e);
                }
            }
            Err(e) => warn!(
                "Could not refresh routes for {}, snapshot left as is: {}",
                server_id, e
            ),
        }
    }
}

fn enter(server_id: &str, phase: Phase) {
    debug!("server {}: {}", server_id, phase);
}
