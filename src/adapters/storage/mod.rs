//! File-Backed Stores
//!
//! Persistent implementations of the storage ports under the data directory:
//!
//! ```text
//! <data_dir>/
//!   trades.json            every trade, open and closed
//!   analyses.jsonl         one composite analysis per line
//!   optimizations.jsonl    one optimizer run per line
//!   config/current.json    active agent configuration document
//!   config/backups/        config_YYYYmmdd_HHMMSS.json, never overwritten
//! ```
//!
//! Whole-file writes go through a temporary file and a rename so a crash
//! never leaves a half-written document behind.

mod config_store;
mod journal;
mod trades;

use std::path::{Path, PathBuf};

pub use config_store::FsConfigStore;
pub use journal::{JsonlAnalysisStore, JsonlOptimizationLog};
pub use trades::JsonTradeStore;

use crate::ports::PortError;

pub const TRADES_FILE: &str = "trades.json";
pub const ANALYSES_FILE: &str = "analyses.jsonl";
pub const OPTIMIZATIONS_FILE: &str = "optimizations.jsonl";
pub const CONFIG_DIR: &str = "config";

/// All stores rooted at one data directory
#[derive(Debug, Clone)]
pub struct FileStores {
    pub trades: JsonTradeStore,
    pub analyses: JsonlAnalysisStore,
    pub optimizations: JsonlOptimizationLog,
    pub config: FsConfigStore,
}

impl FileStores {
    pub fn open(data_dir: &Path) -> Self {
        Self {
            trades: JsonTradeStore::new(data_dir.join(TRADES_FILE)),
            analyses: JsonlAnalysisStore::new(data_dir.join(ANALYSES_FILE)),
            optimizations: JsonlOptimizationLog::new(data_dir.join(OPTIMIZATIONS_FILE)),
            config: FsConfigStore::new(data_dir.join(CONFIG_DIR)),
        }
    }
}

/// Write `contents` to `path` via a sibling temp file and rename
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PortError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Publish `contents` at `path` only if nothing is there yet.
///
/// The bytes are written to a temp file first and hard-linked into place, so
/// `path` either does not exist or holds the complete document. Returns
/// `false` when `path` was already taken.
pub(crate) async fn write_new(path: &Path, contents: &[u8]) -> Result<bool, PortError> {
    let tmp = tmp_path(path);
    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    let linked = tokio::fs::hard_link(&tmp, path).await;
    let _ = tokio::fs::remove_file(&tmp).await;
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a file, treating a missing or blank file as `None`
pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>, PortError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(None),
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
