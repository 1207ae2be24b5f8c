//! Configuration documents on disk: `current.json` plus timestamped backups
//! that are created exclusively and never rewritten.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{read_optional, write_atomic, write_new};
use crate::domain::ConfigDocument;
use crate::ports::{backup_key, ConfigStore, PortError};

pub const CURRENT_FILE: &str = "current.json";
pub const BACKUP_DIR: &str = "backups";

#[derive(Debug, Clone)]
pub struct FsConfigStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FsConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    fn backup_path(&self, key: &str) -> PathBuf {
        self.backup_dir().join(format!("{}.json", key))
    }

    fn parse(path: &Path, content: &str) -> Result<ConfigDocument, PortError> {
        serde_json::from_str(content)
            .map_err(|e| PortError::Serialization(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl ConfigStore for FsConfigStore {
    async fn load_current(&self) -> Result<Option<ConfigDocument>, PortError> {
        let path = self.current_path();
        match read_optional(&path).await? {
            Some(content) => Self::parse(&path, &content).map(Some),
            None => Ok(None),
        }
    }

    async fn save_current(&self, document: &ConfigDocument) -> Result<(), PortError> {
        let content = serde_json::to_vec_pretty(document)?;
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.current_path(), &content).await?;
        tracing::info!("Configuration saved to {}", self.current_path().display());
        Ok(())
    }

    async fn save_backup(&self, document: &ConfigDocument, at: DateTime<Utc>) -> Result<String, PortError> {
        let content = serde_json::to_vec_pretty(document)?;
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(self.backup_dir()).await?;

        let mut existing = self.list_backups().await?;
        loop {
            let key = backup_key(at, &existing);
            if write_new(&self.backup_path(&key), &content).await? {
                tracing::info!("Configuration backup written: {}", key);
                return Ok(key);
            }
            // Another process took this key between listing and creating
            existing.push(key);
        }
    }

    async fn list_backups(&self) -> Result<Vec<String>, PortError> {
        let mut entries = match tokio::fs::read_dir(self.backup_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn load_backup(&self, key: &str) -> Result<ConfigDocument, PortError> {
        let path = self.backup_path(key);
        match read_optional(&path).await? {
            Some(content) => Self::parse(&path, &content),
            None => Err(PortError::NotFound(format!("backup {}", key))),
        }
    }
}
