//! Trash store: a single JSON-array file holding trash entries.
//!
//! All mutations go read-whole/modify/write-whole/atomic-rename under a single
//! in-process mutex (§4.5), the same "append/remove index... persisted as a
//! single atomically-written file" shape the spec calls for, built with the
//! same `fsutil::atomic_write` primitive the journal uses.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::location::BackendKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrashEntry {
    pub id: String,
    pub display_name: String,
    pub backend_kind: BackendKind,
    pub is_directory: bool,
    pub trashed_at: i64,
    pub size: Option<u64>,
    pub original_location: String,
    pub parked_location: String,
}

pub struct TrashStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TrashStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole file. A missing, empty, or unparsable file reads as an
    /// empty list and is rewritten on the next mutation, per §4.5.
    pub fn read_all(&self) -> Vec<TrashEntry> {
        let _guard = self.lock.lock().expect("trash store lock poisoned");
        self.read_all_locked()
    }

    fn read_all_locked(&self) -> Vec<TrashEntry> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn write_all_locked(&self, entries: &[TrashEntry]) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(entries).expect("trash entries serialize");
        crate::fsutil::atomic_write(&self.path, &bytes)
    }

    pub fn append(&self, entry: TrashEntry) -> std::io::Result<()> {
        let _guard = self.lock.lock().expect("trash store lock poisoned");
        let mut entries = self.read_all_locked();
        entries.push(entry);
        self.write_all_locked(&entries)
    }

    pub fn remove(&self, id: &str) -> std::io::Result<Option<TrashEntry>> {
        let _guard = self.lock.lock().expect("trash store lock poisoned");
        let mut entries = self.read_all_locked();
        let index = entries.iter().position(|e| e.id == id);
        let removed = index.map(|i| entries.remove(i));
        if removed.is_some() {
            self.write_all_locked(&entries)?;
        }
        Ok(removed)
    }

    /// Replaces the whole entry list, used by eviction policies that need to
    /// drop several entries atomically.
    pub fn replace_all(&self, entries: Vec<TrashEntry>) -> std::io::Result<()> {
        let _guard = self.lock.lock().expect("trash store lock poisoned");
        self.write_all_locked(&entries)
    }
}
