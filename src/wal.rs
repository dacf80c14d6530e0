//! The copy/move WAL record shape shared by the copy and move engines (§3).
//!
//! One file per outstanding long job, named `{job_id}.wal`, written through
//! `fsutil::atomic_write` exactly like journal records.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalPhase {
    Copying,
    Deleting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    pub job_id: String,
    pub source: String,
    pub target: String,
    pub total_bytes: u64,
    pub copied_bytes: u64,
    pub is_directory: bool,
    /// Only set for the move engine's cross-backend transaction.
    pub phase: Option<WalPhase>,
}

pub fn wal_path(dir: &Path, job_id: &str) -> std::path::PathBuf {
    dir.join(format!("{job_id}.wal"))
}

pub fn write_wal(dir: &Path, record: &WalRecord) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let bytes = serde_json::to_vec_pretty(record).expect("WAL record serializes");
    crate::fsutil::atomic_write(&wal_path(dir, &record.job_id), &bytes)
}

pub fn read_wal(dir: &Path, job_id: &str) -> Option<WalRecord> {
    let bytes = fs::read(wal_path(dir, job_id)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn remove_wal(dir: &Path, job_id: &str) -> std::io::Result<()> {
    let path = wal_path(dir, job_id);
    if path.exists() {
        fs::remove_file(&path)?;
        crate::fsutil::fsync_dir(dir)?;
    }
    Ok(())
}

/// Lists every job id with a WAL record currently in `dir`.
pub fn list_wal_jobs(dir: &Path) -> std::io::Result<Vec<WalRecord>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().extension().and_then(|e| e.to_str()) != Some("wal") {
            continue;
        }
        if let Ok(bytes) = fs::read(entry.path()) {
            if let Ok(record) = serde_json::from_slice::<WalRecord>(&bytes) {
                out.push(record);
            }
        }
    }
    Ok(out)
}
