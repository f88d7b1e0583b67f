//! vpn-route-sync - Route reconciliation for VPN servers
//!
//! Keeps a VPN appliance's server routes in line with a desired set of
//! networks, taken from a cloud provider's published IP ranges or from an
//! operator-maintained list. All changes go through the appliance's signed
//! HTTP management API, bracketed by a server stop/start.
//!
//! # Architecture
//!
//! - `config`: Configuration file handling (TOML)
//! - `api`: Signed request client and API types
//! - `state`: Route snapshots and the pending-delete ledger
//! - `provider`: Desired-set providers (service tags, static list)
//! - `sync`: Diff, lifecycle control and the reconciler
//! - `discover`: Server discovery into the config file
//!
//! # Usage
//!
//! ```bash
//! vpn-route-sync sync --source service-tags
//! vpn-route-sync delete
//! ```

pub mod api;
pub mod config;
pub mod discover;
pub mod provider;
pub mod state;
pub mod sync;

pub use api::{ApiClient, ApiError, RouteApi};
pub use config::Config;
pub use sync::{ReconcileOptions, Reconciler, Summary, Tally};
