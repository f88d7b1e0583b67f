//! Durable local state
//!
//! - `snapshot`: last observed route list per server, used to resolve
//!   route ids for deletion
//! - `ledger`: networks marked for removal on a later run
//!
//! Both assume a single writer. Running several syncs against the same
//! state directory needs an external lock.

pub mod ledger;
pub mod snapshot;

pub use ledger::{PendingDeleteLedger, PendingDeletes};
pub use snapshot::SnapshotStore;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("State serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Corrupt state file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Write `content` next to `path`, flush it to disk and rename it into place
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = File::create(&temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}
