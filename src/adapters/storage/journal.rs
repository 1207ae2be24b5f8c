//! Append-only JSON-lines journals for analyses and optimizer runs.
//!
//! Lines that fail to parse are skipped with a warning rather than failing
//! the whole read.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::read_optional;
use crate::domain::{CompositeAnalysis, OptimizationRun};
use crate::ports::{AnalysisStore, OptimizationLog, PortError};

#[derive(Debug)]
struct JsonlFile<T> {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonlFile<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            write_lock: Arc::clone(&self.write_lock),
            _record: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> JsonlFile<T> {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Arc::new(Mutex::new(())),
            _record: PhantomData,
        }
    }

    async fn append(&self, record: &T) -> Result<(), PortError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<T>, PortError> {
        let Some(content) = read_optional(&self.path).await? else {
            return Ok(Vec::new());
        };
        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    "Skipping unreadable line {} in {}: {}",
                    line_no + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(records)
    }
}

#[derive(Debug, Clone)]
pub struct JsonlAnalysisStore {
    file: JsonlFile<CompositeAnalysis>,
}

impl JsonlAnalysisStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { file: JsonlFile::new(path.into()) }
    }
}

#[async_trait]
impl AnalysisStore for JsonlAnalysisStore {
    async fn record(&self, analysis: &CompositeAnalysis) -> Result<(), PortError> {
        self.file.append(analysis).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CompositeAnalysis>, PortError> {
        let mut all = self.file.read_all().await?;
        let skip = all.len().saturating_sub(limit);
        Ok(all.split_off(skip))
    }
}

#[derive(Debug, Clone)]
pub struct JsonlOptimizationLog {
    file: JsonlFile<OptimizationRun>,
}

impl JsonlOptimizationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { file: JsonlFile::new(path.into()) }
    }
}

#[async_trait]
impl OptimizationLog for JsonlOptimizationLog {
    async fn append(&self, run: &OptimizationRun) -> Result<(), PortError> {
        self.file.append(run).await
    }

    async fn runs(&self) -> Result<Vec<OptimizationRun>, PortError> {
        self.file.read_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunStatus;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_optimization_log_appends() {
        let dir = TempDir::new().unwrap();
        let log = JsonlOptimizationLog::new(dir.path().join("optimizations.jsonl"));
        let t0 = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();

        log.append(&OptimizationRun::new(t0, RunStatus::InsufficientData, 3)).await.unwrap();
        log.append(&OptimizationRun::new(t0 + Duration::hours(1), RunStatus::Promoted, 40))
            .await
            .unwrap();

        let runs = log.runs().await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].status, RunStatus::Promoted);
    }

    #[tokio::test]
    async fn test_skips_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("optimizations.jsonl");
        let t0 = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
        let good = serde_json::to_string(&OptimizationRun::new(t0, RunStatus::NoCandidate, 12)).unwrap();
        tokio::fs::write(&path, format!("{}\ngarbage\n\n", good)).await.unwrap();

        let log = JsonlOptimizationLog::new(&path);
        assert_eq!(log.runs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonlAnalysisStore::new(dir.path().join("analyses.jsonl"));
        assert!(store.recent(10).await.unwrap().is_empty());
    }
}
