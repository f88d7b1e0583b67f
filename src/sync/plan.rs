//! Desired-vs-actual route diff
//!
//! Pure set arithmetic, exact string comparison on networks:
//!
//! - `to_add    = desired - existing - pending`
//! - `to_delete = snapshot ∩ pending` (only when deleting)
//!
//! A network pending deletion is never re-added in the same pass, so the
//! two sets are always disjoint.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub to_add: BTreeSet<String>,
    /// network → route id, resolved through the snapshot
    pub to_delete: BTreeMap<String, String>,
    /// Desired and already on the server
    pub already_present: BTreeSet<String>,
    /// Desired, absent, but held back because it is pending deletion
    pub suppressed: BTreeSet<String>,
    /// Pending deletion but no snapshot entry to take the id from
    pub unknown_id: BTreeSet<String>,
}

impl Plan {
    pub fn build(
        desired: &BTreeSet<String>,
        existing: &BTreeSet<String>,
        pending: &BTreeSet<String>,
        snapshot: &BTreeMap<String, String>,
        delete: bool,
    ) -> Self {
        let mut plan = Plan::default();

        for network in desired {
            if existing.contains(network) {
                plan.already_present.insert(network.clone());
            } else if pending.contains(network) {
                plan.suppressed.insert(network.clone());
            } else {
                plan.to_add.insert(network.clone());
            }
        }

        if delete {
            for network in pending {
                match snapshot.get(network) {
                    Some(id) => {
                        plan.to_delete.insert(network.clone(), id.clone());
                    }
                    None => {
                        plan.unknown_id.insert(network.clone());
                    }
                }
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }
}
