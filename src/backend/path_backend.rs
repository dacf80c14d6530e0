//! Path backend: operates directly on filesystem paths.
//!
//! Grounded on the desktop crate's `LocalPosixVolume`: `symlink_metadata`-based
//! existence checks (so broken symlinks are still "there"), and a fixed
//! extension whitelist that triggers a best-effort media-index notification
//! after successful mutations.

use std::fs;
use std::path::{Path, PathBuf};

use crate::conflict::{ConflictPolicy, resolve_name};
use crate::location::BackendKind;
use crate::node::{Node, NodeType};

use super::{Backend, BackendError, CreateOutcome};

/// Extensions that trigger a media-index notification on successful mutation.
/// The notifier itself is an external collaborator (§6); it is not part of
/// this crate's correctness and failures here are swallowed.
const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4", "mov", "mp3", "wav"];

/// A media-index notifier. Production hosts provide a real implementation;
/// the default is a no-op.
pub trait MediaIndexNotifier: Send + Sync {
    fn notify(&self, path: &Path);
}

struct NoopNotifier;
impl MediaIndexNotifier for NoopNotifier {
    fn notify(&self, _path: &Path) {}
}

pub struct PathBackend {
    notifier: Box<dyn MediaIndexNotifier>,
}

impl Default for PathBackend {
    fn default() -> Self {
        Self {
            notifier: Box::new(NoopNotifier),
        }
    }
}

impl PathBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(notifier: Box<dyn MediaIndexNotifier>) -> Self {
        Self { notifier }
    }

    fn maybe_notify(&self, path: &Path) {
        let is_media = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| MEDIA_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_media {
            self.notifier.notify(path);
        }
    }

    fn exists_path(path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }
}

/// Recursively copies `source` to `target`, used as the cross-device fallback
/// for `relocate` when a direct rename is not possible.
fn copy_recursive(source: &Path, target: &Path) -> Result<(), BackendError> {
    let metadata = fs::symlink_metadata(source)?;
    if metadata.is_dir() {
        fs::create_dir_all(target)?;
        for entry in walkdir::WalkDir::new(source).min_depth(1) {
            let entry = entry.map_err(|e| BackendError::IoError(e.to_string()))?;
            let relative = entry.path().strip_prefix(source).expect("walkdir entry under source");
            let dest = target.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else {
                fs::copy(entry.path(), &dest)?;
            }
        }
    } else {
        fs::copy(source, target)?;
    }
    Ok(())
}

impl Backend for PathBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Path
    }

    fn create(
        &self,
        parent: &str,
        name: &str,
        node_type: NodeType,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<CreateOutcome, BackendError> {
        let parent_path = PathBuf::from(parent);
        let exists = |candidate: &str| Self::exists_path(&parent_path.join(candidate));
        let final_name =
            resolve_name(exists, name, policy, manual).ok_or_else(|| BackendError::ConflictDeclined(name.to_string()))?;

        let target = parent_path.join(&final_name);
        match node_type {
            NodeType::File => {
                // Open-and-create atomically: a plain `create_new` unless REPLACE
                // intends to overwrite an existing file.
                if policy == ConflictPolicy::Replace && target.exists() {
                    fs::write(&target, [])?;
                } else {
                    fs::OpenOptions::new().write(true).create_new(true).open(&target).or_else(|e| {
                        if e.kind() == std::io::ErrorKind::AlreadyExists && policy == ConflictPolicy::Replace {
                            fs::OpenOptions::new().write(true).truncate(true).open(&target)
                        } else {
                            Err(e)
                        }
                    })?;
                }
            }
            NodeType::Directory => {
                if !target.exists() {
                    fs::create_dir(&target)?;
                }
            }
        }

        self.maybe_notify(&target);

        Ok(CreateOutcome {
            final_name,
            location: target.to_string_lossy().to_string(),
        })
    }

    fn delete(&self, location: &str) -> Result<(), BackendError> {
        let path = Path::new(location);
        let metadata = fs::symlink_metadata(path)?;
        if metadata.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn rename(
        &self,
        source: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<String, BackendError> {
        let source_path = Path::new(source);
        let parent = source_path.parent().unwrap_or_else(|| Path::new(""));
        let exists = |candidate: &str| Self::exists_path(&parent.join(candidate));
        let final_name = resolve_name(exists, new_name, policy, manual)
            .ok_or_else(|| BackendError::ConflictDeclined(new_name.to_string()))?;

        let target = parent.join(&final_name);
        if target != source_path {
            fs::rename(source_path, &target)?;
        }
        self.maybe_notify(&target);
        Ok(target.to_string_lossy().to_string())
    }

    fn exists(&self, location: &str) -> bool {
        Self::exists_path(Path::new(location))
    }

    fn is_directory(&self, location: &str) -> Result<bool, BackendError> {
        let metadata = fs::symlink_metadata(location)?;
        Ok(metadata.is_dir())
    }

    fn read_all(&self, location: &str) -> Result<Vec<u8>, BackendError> {
        Ok(fs::read(location)?)
    }

    fn write_whole(&self, parent: &str, name: &str, data: &[u8]) -> Result<String, BackendError> {
        let target = PathBuf::from(parent).join(name);
        fs::write(&target, data)?;
        Ok(target.to_string_lossy().to_string())
    }

    fn relocate(&self, source: &str, dest_parent: &str, dest_name: &str) -> Result<String, BackendError> {
        let source_path = Path::new(source);
        let target = PathBuf::from(dest_parent).join(dest_name);

        match fs::rename(source_path, &target) {
            Ok(()) => Ok(target.to_string_lossy().to_string()),
            // Cross-device rename (EXDEV) cannot be an atomic in-place move; fall
            // back to a recursive copy followed by deleting the source.
            Err(_) => {
                copy_recursive(source_path, &target)?;
                self.delete(source)?;
                Ok(target.to_string_lossy().to_string())
            }
        }
    }

    fn list(&self, location: &str) -> Result<Vec<Node>, BackendError> {
        let path = Path::new(location);
        let mut out = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let loc = crate::location::Location::Path(entry.path());
            let mut node = Node::new(entry.file_name().to_string_lossy().to_string(), &loc, metadata.is_dir(), 0);
            if !metadata.is_dir() {
                node.size = metadata.len();
            }
            node.last_modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64);
            out.push(node);
        }
        out.sort_by(|a, b| match (a.is_directory, b.is_directory) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_file_then_rename_then_delete() {
        let dir = tempdir().unwrap();
        let backend = PathBackend::new();
        let parent = dir.path().to_string_lossy().to_string();

        let outcome = backend
            .create(&parent, "a.txt", NodeType::File, ConflictPolicy::Fail, None)
            .unwrap();
        assert_eq!(outcome.final_name, "a.txt");
        assert!(backend.exists(&outcome.location));

        let renamed = backend.rename(&outcome.location, "b.txt", ConflictPolicy::Fail, None).unwrap();
        assert!(backend.exists(&renamed));
        assert!(!backend.exists(&outcome.location));

        backend.delete(&renamed).unwrap();
        assert!(!backend.exists(&renamed));
    }

    #[test]
    fn create_with_rename_new_on_conflict() {
        let dir = tempdir().unwrap();
        let backend = PathBackend::new();
        let parent = dir.path().to_string_lossy().to_string();

        backend
            .create(&parent, "a.txt", NodeType::File, ConflictPolicy::Fail, None)
            .unwrap();
        let outcome = backend
            .create(&parent, "a.txt", NodeType::File, ConflictPolicy::RenameNew, None)
            .unwrap();
        assert_eq!(outcome.final_name, "a.txt (1)");
    }

    #[test]
    fn rename_in_place_noop_when_name_unchanged() {
        let dir = tempdir().unwrap();
        let backend = PathBackend::new();
        let parent = dir.path().to_string_lossy().to_string();
        let outcome = backend
            .create(&parent, "a.txt", NodeType::File, ConflictPolicy::Fail, None)
            .unwrap();
        let renamed = backend.rename(&outcome.location, "a.txt", ConflictPolicy::Fail, None).unwrap();
        assert_eq!(renamed, outcome.location);
    }
}
