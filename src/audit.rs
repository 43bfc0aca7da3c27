//! JSONL record of cleanup runs.
//!
//! Each run writes a `run_started` line, one `item_action` line per removed
//! (or failed) entry and a closing `run_finished` line with the totals.

use crate::config::Config;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditRecord {
    RunStarted {
        run_id: String,
        root: PathBuf,
        dry_run: bool,
        ts: DateTime<Utc>,
    },
    ItemAction {
        run_id: String,
        path: PathBuf,
        kind: EntryKind,
        result: ItemResult,
        bytes: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        ts: DateTime<Utc>,
    },
    RunFinished {
        run_id: String,
        files_removed: usize,
        directories_removed: usize,
        failed: usize,
        freed_bytes: u64,
        ts: DateTime<Utc>,
    },
}

impl AuditRecord {
    pub fn run_id(&self) -> &str {
        match self {
            AuditRecord::RunStarted { run_id, .. }
            | AuditRecord::ItemAction { run_id, .. }
            | AuditRecord::RunFinished { run_id, .. } => run_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemResult {
    Removed,
    WouldRemove,
    Failed,
}

/// Totals of one run, assembled from its start and finish records
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditRunSummary {
    pub run_id: String,
    pub root: Option<PathBuf>,
    pub dry_run: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub files_removed: usize,
    pub directories_removed: usize,
    pub failed: usize,
    pub freed_bytes: u64,
}

/// Append-only JSONL log of cleanup runs
#[derive(Debug, Clone)]
pub struct AuditLogger {
    path: PathBuf,
    enabled: bool,
}

impl AuditLogger {
    pub fn new(path: PathBuf, enabled: bool) -> Self {
        Self { path, enabled }
    }

    pub fn from_config(config: &Config) -> Self {
        let path = config.audit.path.clone().unwrap_or_else(default_audit_path);
        Self::new(path, config.audit.enabled)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the opening record of a run and return its id
    pub fn start_run(&self, root: &Path, dry_run: bool) -> Result<String> {
        let ts = Utc::now();
        let run_id = format!("{}-{}", ts.format("%Y%m%dT%H%M%S%.6f"), std::process::id());

        self.append(&AuditRecord::RunStarted {
            run_id: run_id.clone(),
            root: root.to_path_buf(),
            dry_run,
            ts,
        })?;
        Ok(run_id)
    }

    pub fn log_item(
        &self,
        run_id: &str,
        path: &Path,
        kind: EntryKind,
        result: ItemResult,
        bytes: u64,
        reason: Option<String>,
    ) -> Result<()> {
        self.append(&AuditRecord::ItemAction {
            run_id: run_id.to_string(),
            path: path.to_path_buf(),
            kind,
            result,
            bytes,
            reason,
            ts: Utc::now(),
        })
    }

    pub fn finish_run(
        &self,
        run_id: &str,
        files_removed: usize,
        directories_removed: usize,
        failed: usize,
        freed_bytes: u64,
    ) -> Result<()> {
        self.append(&AuditRecord::RunFinished {
            run_id: run_id.to_string(),
            files_removed,
            directories_removed,
            failed,
            freed_bytes,
            ts: Utc::now(),
        })
    }

    fn append(&self, record: &AuditRecord) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create audit directory: {}", parent.display())
            })?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .with_context(|| format!("Failed to write audit log: {}", self.path.display()))
    }

    /// All records in the log; a missing log reads as empty
    pub fn read_records(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read audit log: {}", self.path.display()))?;

        // A line cut short by an interrupted run is skipped
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    pub fn records_for_run(&self, run_id: &str) -> Result<Vec<AuditRecord>> {
        let mut records = self.read_records()?;
        records.retain(|record| record.run_id() == run_id);
        Ok(records)
    }

    /// Summaries of all runs, most recent first
    pub fn list_runs(&self) -> Result<Vec<AuditRunSummary>> {
        let mut runs = BTreeMap::<String, AuditRunSummary>::new();

        for record in self.read_records()? {
            let summary = runs
                .entry(record.run_id().to_string())
                .or_insert_with_key(|run_id| AuditRunSummary {
                    run_id: run_id.clone(),
                    ..Default::default()
                });

            match record {
                AuditRecord::RunStarted {
                    root, dry_run, ts, ..
                } => {
                    summary.root = Some(root);
                    summary.dry_run = dry_run;
                    summary.started_at = Some(ts);
                }
                AuditRecord::RunFinished {
                    files_removed,
                    directories_removed,
                    failed,
                    freed_bytes,
                    ts,
                    ..
                } => {
                    summary.files_removed = files_removed;
                    summary.directories_removed = directories_removed;
                    summary.failed = failed;
                    summary.freed_bytes = freed_bytes;
                    summary.finished_at = Some(ts);
                }
                AuditRecord::ItemAction { .. } => {}
            }
        }

        let mut summaries: Vec<_> = runs.into_values().collect();
        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(summaries)
    }
}

/// `<data dir>/temp-sweeper/operations.jsonl`
pub fn default_audit_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("temp-sweeper")
        .join("operations.jsonl")
}
