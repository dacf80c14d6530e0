//! Write-temp / fsync / rename / fsync-dir: the durability primitive shared by
//! the journal, WAL, trash store, and undo log.
//!
//! Grounded on the desktop crate's `safe_overwrite_file` (`write_operations/helpers.rs`):
//! write to a sibling temp name, then rename into place so a crash mid-write
//! never leaves a half-written file at the real name. This module adds the
//! fsync calls the spec requires that the desktop crate's variant (overwriting
//! a user's existing file, not recovering from a crash) does not need.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use uuid::Uuid;

/// Writes `contents` to `path` via a sibling `.tmp` file, fsync'd before and
/// after the rename into place, with the containing directory fsync'd last.
pub fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("storax"),
        Uuid::new_v4()
    );
    let tmp_path = parent.join(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    fsync_dir(parent)?;
    Ok(())
}

/// Fsyncs a directory so a prior rename into it is durable. A no-op on
/// platforms without directory-handle fsync (this crate targets Unix-like
/// hosts, matching the desktop crate's own platform-gated helpers).
pub fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    let dir_file = File::open(dir)?;
    dir_file.sync_all()
}

/// Ensures `dir` exists, creating parents as needed.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_leaves_no_tmp_behind() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("record.json");
        atomic_write(&target, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn atomic_write_overwrites_existing() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("record.json");
        atomic_write(&target, b"first").unwrap();
        atomic_write(&target, b"second").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
    }
}
