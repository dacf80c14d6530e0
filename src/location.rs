//! Location addressing and backend classification.

use std::fmt;
use std::path::PathBuf;

/// Scheme prefix identifying an opaque, handle-based document-tree location.
pub const HANDLE_SCHEME: &str = "content://";

/// A node's address in some backend.
///
/// A location is either a filesystem path or an opaque handle URI. The backend
/// detector (`Location::backend_kind`) classifies by scheme prefix, never by
/// probing the storage itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Path(PathBuf),
    Handle(String),
}

/// Which backend a location belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Path,
    Handle,
}

impl Location {
    /// Classifies a raw location string by scheme prefix.
    pub fn parse(raw: &str) -> Self {
        if let Some(uri) = raw.strip_prefix(HANDLE_SCHEME) {
            Location::Handle(format!("{}{}", HANDLE_SCHEME, uri))
        } else {
            Location::Path(PathBuf::from(raw))
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self {
            Location::Path(_) => BackendKind::Path,
            Location::Handle(_) => BackendKind::Handle,
        }
    }

    pub fn as_path(&self) -> Option<&std::path::Path> {
        match self {
            Location::Path(p) => Some(p),
            Location::Handle(_) => None,
        }
    }

    pub fn as_handle_uri(&self) -> Option<&str> {
        match self {
            Location::Handle(uri) => Some(uri),
            Location::Path(_) => None,
        }
    }

    /// The final path/name component, used to derive display names and lock keys.
    pub fn name(&self) -> String {
        match self {
            Location::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            Location::Handle(uri) => uri.rsplit('/').next().unwrap_or(uri).to_string(),
        }
    }

    /// Canonical string form, used as the basis for lock keys.
    ///
    /// Paths are not canonicalized against the filesystem here (the node may not
    /// exist yet, e.g. a create target); callers that need symlink-resolved
    /// canonicalization should do so before constructing the key.
    pub fn canonical_key(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Handle(uri) => uri.clone(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(p) => write!(f, "{}", p.display()),
            Location::Handle(uri) => write!(f, "{}", uri),
        }
    }
}

impl From<&str> for Location {
    fn from(raw: &str) -> Self {
        Location::parse(raw)
    }
}

impl From<String> for Location {
    fn from(raw: String) -> Self {
        Location::parse(&raw)
    }
}

impl From<std::path::PathBuf> for Location {
    fn from(path: std::path::PathBuf) -> Self {
        Location::Path(path)
    }
}
