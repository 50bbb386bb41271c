//! Persistence sinks for hourly averages.

use crate::core::{PersistenceSink, PipelineError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// Channel recorded by the hourly flush.
pub const HOURLY_CHANNEL: &str = "vib_left";

/// One persisted hourly average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRecord {
    pub machine: String,
    pub channel: String,
    pub average: f64,
    pub recorded_at: DateTime<Utc>,
}

impl HourlyRecord {
    fn now(machine: &str, average: f64) -> Self {
        Self {
            machine: machine.to_string(),
            channel: HOURLY_CHANNEL.to_string(),
            average,
            recorded_at: Utc::now(),
        }
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `data_dir/hourly_averages.jsonl`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("hourly_averages.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record in the file.
    pub fn load(&self) -> Result<Vec<HourlyRecord>, std::io::Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(std::io::Error::other))
            .collect()
    }

    async fn append(&self, record: &HourlyRecord) -> Result<(), std::io::Error> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(record).map_err(std::io::Error::other)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl PersistenceSink for JsonlStore {
    async fn save_now(&self, machine: &str, value: f64) -> Result<(), PipelineError> {
        let record = HourlyRecord::now(machine, value);
        self.append(&record).await.map_err(|e| {
            PipelineError::Persistence(format!("{}: {e}", self.path.display()))
        })
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<HourlyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record saved so far.
    pub fn records(&self) -> Result<Vec<HourlyRecord>, PipelineError> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|e| PipelineError::Persistence(e.to_string()))
    }
}

#[async_trait]
impl PersistenceSink for MemoryStore {
    async fn save_now(&self, machine: &str, value: f64) -> Result<(), PipelineError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| PipelineError::Persistence(e.to_string()))?;
        records.push(HourlyRecord::now(machine, value));
        Ok(())
    }
}
