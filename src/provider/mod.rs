//! Desired-set providers
//!
//! A provider turns some input document into the set of networks that
//! should exist on a server. Providers never touch the network and never
//! fail hard: an absent or unreadable source is an empty set.

pub mod service_tags;
pub mod static_list;

pub use service_tags::ServiceTagsProvider;
pub use static_list::StaticListProvider;

use std::collections::BTreeSet;

/// Source of the target route set for a run
pub trait DesiredSetProvider {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn resolve(&self) -> BTreeSet<String>;
}

/// A provider with a fixed set, used by the delete workflow
#[derive(Debug, Clone, Default)]
pub struct FixedSet(pub BTreeSet<String>);

impl DesiredSetProvider for FixedSet {
    fn name(&self) -> &str {
        "fixed"
    }

    fn resolve(&self) -> BTreeSet<String> {
        self.0.clone()
    }
}
