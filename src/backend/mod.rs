//! Backend abstraction: a uniform `{create, delete, rename}` capability set
//! satisfied by two very different storages (`path_backend`, `handle_backend`).
//!
//! Modeled on the desktop crate's `Volume` trait: a small capability set with
//! `Send + Sync`, no virtual inheritance, no deep hierarchy.

pub mod handle_backend;
pub mod path_backend;

use crate::conflict::ConflictPolicy;
use crate::node::NodeType;

pub use handle_backend::HandleBackend;
pub use path_backend::PathBackend;

/// Error type for backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    NotFound(String),
    PermissionDenied(String),
    AlreadyExists(String),
    /// The conflict resolver declined (FAIL policy, name already taken, or an
    /// empty manual rename) — distinct from a backend-level `AlreadyExists`
    /// raised outside conflict resolution.
    ConflictDeclined(String),
    NotSupported(String),
    IoError(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(loc) => write!(f, "not found: {}", loc),
            Self::PermissionDenied(loc) => write!(f, "permission denied: {}", loc),
            Self::AlreadyExists(loc) => write!(f, "already exists: {}", loc),
            Self::ConflictDeclined(loc) => write!(f, "conflict declined: {}", loc),
            Self::NotSupported(op) => write!(f, "not supported: {}", op),
            Self::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

/// Outcome of a `create` call.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub final_name: String,
    pub location: String,
}

/// Operations exposed by every backend (§4.3).
///
/// Backends are responsible for resolving conflicts against their own
/// existence check; they must not rename in-place when the chosen name equals
/// the current name.
pub trait Backend: Send + Sync {
    /// Kind tag used for trash-entry bookkeeping and lock-key derivation.
    fn kind(&self) -> crate::location::BackendKind;

    fn create(
        &self,
        parent: &str,
        name: &str,
        node_type: NodeType,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<CreateOutcome, BackendError>;

    fn delete(&self, location: &str) -> Result<(), BackendError>;

    fn rename(
        &self,
        source: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<String, BackendError>;

    fn exists(&self, location: &str) -> bool;

    fn is_directory(&self, location: &str) -> Result<bool, BackendError>;

    fn list(&self, location: &str) -> Result<Vec<crate::node::Node>, BackendError>;

    /// Reads the whole object at `location` into memory.
    ///
    /// Backends that support seekable byte ranges (path backends) are not
    /// expected to route normal copy traffic through this — it exists for the
    /// handle-native whole-object copy path (§4.3, §9 Open Questions). Default
    /// declines; `PathBackend` and `HandleBackend` both override it.
    fn read_all(&self, location: &str) -> Result<Vec<u8>, BackendError> {
        let _ = location;
        Err(BackendError::NotSupported("read_all".to_string()))
    }

    /// Writes `data` as a new child of `parent`, named `name`, in one call.
    fn write_whole(&self, parent: &str, name: &str, data: &[u8]) -> Result<String, BackendError> {
        let _ = (parent, name, data);
        Err(BackendError::NotSupported("write_whole".to_string()))
    }

    /// Moves `source` to be a child named `dest_name` of `dest_parent`,
    /// possibly a different directory — unlike `rename`, which only changes
    /// the final name component within the current parent.
    ///
    /// Used by the trash manager's park step and the move engine's
    /// same-backend shortcut (§4.4, §4.12: "attempts a rename; if rename
    /// fails, falls back to copy-then-delete"). The default implementation
    /// *is* that fallback — read the whole object, write it under the new
    /// parent/name, delete the source — so backends that can do better (a
    /// real filesystem rename) override it; backends that cannot (the handle
    /// backend, lacking a reparenting primitive) get a correct if slower
    /// default for free.
    fn relocate(&self, source: &str, dest_parent: &str, dest_name: &str) -> Result<String, BackendError> {
        if self.is_directory(source)? {
            return Err(BackendError::NotSupported("relocate directory without native move".to_string()));
        }
        let data = self.read_all(source)?;
        let new_location = self.write_whole(dest_parent, dest_name, &data)?;
        self.delete(source)?;
        Ok(new_location)
    }
}
