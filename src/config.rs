//! Resolves the on-disk layout (§6) under a private app-data directory.
//!
//! Grounded on the desktop crate's use of `dirs::home_dir()`/app-data resolution
//! in its config loading; `storax` uses `dirs::data_dir()` the same way, scoped
//! under an app-name subdirectory the host supplies.

use std::path::{Path, PathBuf};

use crate::fsutil::ensure_dir;

/// Default undo/redo stack capacity (§3 invariant: undo stack size ≤ N).
pub const DEFAULT_UNDO_CAPACITY: usize = 100;

/// Default trash age eviction threshold, in milliseconds.
pub const DEFAULT_TRASH_MAX_AGE_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Default trash quota, in bytes.
pub const DEFAULT_TRASH_MAX_SIZE_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Resolved paths for every durable component named in §6's on-disk layout.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Scopes all paths under `root` directly — callers that want the OS app-data
    /// directory should combine this with `Paths::app_data_root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves `$XDG_DATA_HOME`/equivalent/`app_name`, via `dirs::data_dir()`,
    /// the way the desktop crate resolves its own private storage root.
    pub fn app_data_root(app_name: &str) -> std::io::Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no platform data directory available")
        })?;
        Ok(Self::new(base.join(app_name)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.root.join("storax_journal")
    }

    pub fn copy_wal_dir(&self) -> PathBuf {
        self.root.join("copy_wal")
    }

    pub fn move_wal_dir(&self) -> PathBuf {
        self.root.join("move_wal")
    }

    pub fn undo_dir(&self) -> PathBuf {
        self.root.join("storax_undo")
    }

    pub fn undo_stack_file(&self) -> PathBuf {
        self.undo_dir().join("undo_stack.json")
    }

    pub fn redo_stack_file(&self) -> PathBuf {
        self.undo_dir().join("redo_stack.json")
    }

    pub fn trash_index_file(&self) -> PathBuf {
        self.root.join("trash_index.json")
    }

    /// Per-backend parked-object area. The path backend's lives alongside the
    /// original object's volume when possible; callers that manage multiple
    /// path roots should namespace this further themselves.
    pub fn trash_dir_name() -> &'static str {
        ".storax_trash"
    }

    /// Creates every directory this layout names (idempotent).
    pub fn ensure_all(&self) -> std::io::Result<()> {
        ensure_dir(&self.journal_dir())?;
        ensure_dir(&self.copy_wal_dir())?;
        ensure_dir(&self.move_wal_dir())?;
        ensure_dir(&self.undo_dir())?;
        Ok(())
    }
}
