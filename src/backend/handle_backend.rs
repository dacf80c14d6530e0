//! Handle backend: operates on an opaque, permission-scoped document tree.
//!
//! Exposes only handle-based operations — child lookup by name, creation,
//! deletion, and URI-identified open — never a seekable byte offset. Grounded
//! on the desktop crate's `MtpVolume`: paths are opaque URIs
//! (`content://provider/tree/id` here, `mtp://device/storage/...` there), and
//! `exists`/`is_directory` are answered by listing the parent and matching by
//! name rather than stat-by-id, because the underlying protocol has no
//! stat-by-id call.
//!
//! Random I/O is not supported (§4.3); `read_all`/`write_whole` are the only
//! data-moving primitives, used by the copy engine's handle-native path
//! (see `engines::copy`), which is necessarily whole-object rather than
//! chunked/resumable for this backend.

use crate::conflict::{ConflictPolicy, resolve_name};
use crate::location::BackendKind;
use crate::node::{Node, NodeType};

use super::{Backend, BackendError, CreateOutcome};

/// A single child entry as reported by `HandleProvider::list_children`.
#[derive(Debug, Clone)]
pub struct HandleChild {
    pub name: String,
    pub uri: String,
    pub is_directory: bool,
    pub size: u64,
}

/// The contract a concrete document-tree provider must satisfy.
///
/// Implementations wrap whatever IPC/async client talks to the real document
/// provider; as in `MtpVolume`, bridging from this synchronous trait to an
/// async client is the provider's responsibility (e.g. via
/// `tokio::runtime::Handle::current().block_on(..)` from a blocking-pool
/// context).
pub trait HandleProvider: Send + Sync {
    fn list_children(&self, parent_uri: &str) -> Result<Vec<HandleChild>, BackendError>;

    /// The URI of `uri`'s parent directory, used to re-check sibling names
    /// before a rename.
    fn parent_of(&self, uri: &str) -> Result<String, BackendError>;

    fn create_child(&self, parent_uri: &str, name: &str, is_directory: bool) -> Result<String, BackendError>;

    fn delete(&self, uri: &str) -> Result<(), BackendError>;

    /// Renames `uri` to `new_name`, returning the backend-assigned post-rename
    /// URI (document providers commonly mint a new URI on rename).
    fn rename(&self, uri: &str, new_name: &str) -> Result<String, BackendError>;

    fn is_directory(&self, uri: &str) -> Result<bool, BackendError>;

    fn read_all(&self, uri: &str) -> Result<Vec<u8>, BackendError>;

    /// Writes `data` as a new child of `parent_uri`, in one call (the backend
    /// exposes no partial-write primitive).
    fn write_whole(&self, parent_uri: &str, name: &str, data: &[u8]) -> Result<String, BackendError>;
}

pub struct HandleBackend<P: HandleProvider> {
    provider: P,
}

impl<P: HandleProvider> HandleBackend<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn name_in(&self, parent: &str, uri: &str) -> Result<String, BackendError> {
        self.provider
            .list_children(parent)?
            .into_iter()
            .find(|c| c.uri == uri)
            .map(|c| c.name)
            .ok_or_else(|| BackendError::NotFound(uri.to_string()))
    }
}

impl<P: HandleProvider> Backend for HandleBackend<P> {
    fn kind(&self) -> BackendKind {
        BackendKind::Handle
    }

    fn create(
        &self,
        parent: &str,
        name: &str,
        node_type: NodeType,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<CreateOutcome, BackendError> {
        let children = self.provider.list_children(parent)?;
        let exists = |candidate: &str| children.iter().any(|c| c.name == candidate);
        let final_name =
            resolve_name(exists, name, policy, manual).ok_or_else(|| BackendError::ConflictDeclined(name.to_string()))?;

        if policy == ConflictPolicy::Replace {
            if let Some(existing) = children.iter().find(|c| c.name == final_name) {
                self.provider.delete(&existing.uri)?;
            }
        }

        let uri = self.provider.create_child(parent, &final_name, node_type.is_directory())?;
        Ok(CreateOutcome {
            final_name,
            location: uri,
        })
    }

    fn delete(&self, location: &str) -> Result<(), BackendError> {
        self.provider.delete(location)
    }

    fn rename(
        &self,
        source: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<String, BackendError> {
        let parent = self.provider.parent_of(source)?;
        let current_name = self.name_in(&parent, source)?;
        let children = self.provider.list_children(&parent)?;
        let exists = |candidate: &str| children.iter().any(|c| c.name == candidate && c.uri != source);
        let final_name = resolve_name(exists, new_name, policy, manual)
            .ok_or_else(|| BackendError::ConflictDeclined(new_name.to_string()))?;

        if final_name == current_name {
            return Ok(source.to_string());
        }

        let new_uri = self.provider.rename(source, &final_name)?;

        // Re-resolve the handle from the returned post-rename URI and verify the name.
        let verified_name = self.name_in(&parent, &new_uri)?;
        if verified_name != final_name {
            return Err(BackendError::IoError(format!(
                "provider renamed to unexpected name: expected {}, got {}",
                final_name, verified_name
            )));
        }
        Ok(new_uri)
    }

    fn exists(&self, location: &str) -> bool {
        // A listable node is a real node regardless of whether it has a
        // parent to re-verify it against — this is the only way a
        // parent-less root (no `parent_of` answer) can ever report true.
        if self.provider.list_children(location).is_ok() {
            return true;
        }
        match self.provider.parent_of(location) {
            Ok(parent) => self.name_in(&parent, location).is_ok(),
            Err(_) => false,
        }
    }

    fn is_directory(&self, location: &str) -> Result<bool, BackendError> {
        self.provider.is_directory(location)
    }

    fn read_all(&self, location: &str) -> Result<Vec<u8>, BackendError> {
        self.provider.read_all(location)
    }

    fn write_whole(&self, parent: &str, name: &str, data: &[u8]) -> Result<String, BackendError> {
        self.provider.write_whole(parent, name, data)
    }

    fn list(&self, location: &str) -> Result<Vec<Node>, BackendError> {
        let children = self.provider.list_children(location)?;
        let mut nodes: Vec<Node> = children
            .into_iter()
            .map(|c| {
                let loc = crate::location::Location::Handle(c.uri.clone());
                Node::new(c.name, &loc, c.is_directory, c.size)
            })
            .collect();
        nodes.sort_by(|a, b| match (a.is_directory, b.is_directory) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        });
        Ok(nodes)
    }
}

/// An in-memory document-tree provider, used by tests and as a reference
/// implementation of `HandleProvider`.
pub mod in_memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    pub const ROOT_URI: &str = "content://storax.test/root";

    struct Entry {
        name: String,
        parent: Option<String>,
        is_directory: bool,
        content: Vec<u8>,
    }

    /// An in-memory stand-in for a real document-tree provider (e.g. Android
    /// SAF). Not persisted; intended for tests and demos.
    pub struct InMemoryHandleProvider {
        entries: Mutex<HashMap<String, Entry>>,
    }

    impl Default for InMemoryHandleProvider {
        fn default() -> Self {
            let mut entries = HashMap::new();
            entries.insert(
                ROOT_URI.to_string(),
                Entry {
                    name: String::new(),
                    parent: None,
                    is_directory: true,
                    content: Vec::new(),
                },
            );
            Self {
                entries: Mutex::new(entries),
            }
        }
    }

    impl InMemoryHandleProvider {
        pub fn new() -> Self {
            Self::default()
        }

        fn next_uri() -> String {
            format!("content://storax.test/{}", Uuid::new_v4())
        }
    }

    impl HandleProvider for InMemoryHandleProvider {
        fn list_children(&self, parent_uri: &str) -> Result<Vec<HandleChild>, BackendError> {
            let entries = self.entries.lock().expect("handle provider poisoned");
            if !entries.contains_key(parent_uri) {
                return Err(BackendError::NotFound(parent_uri.to_string()));
            }
            Ok(entries
                .iter()
                .filter(|(_, e)| e.parent.as_deref() == Some(parent_uri))
                .map(|(uri, e)| HandleChild {
                    name: e.name.clone(),
                    uri: uri.clone(),
                    is_directory: e.is_directory,
                    size: e.content.len() as u64,
                })
                .collect())
        }

        fn parent_of(&self, uri: &str) -> Result<String, BackendError> {
            let entries = self.entries.lock().expect("handle provider poisoned");
            entries
                .get(uri)
                .and_then(|e| e.parent.clone())
                .ok_or_else(|| BackendError::NotFound(uri.to_string()))
        }

        fn create_child(&self, parent_uri: &str, name: &str, is_directory: bool) -> Result<String, BackendError> {
            let mut entries = self.entries.lock().expect("handle provider poisoned");
            if !entries.contains_key(parent_uri) {
                return Err(BackendError::NotFound(parent_uri.to_string()));
            }
            let uri = Self::next_uri();
            entries.insert(
                uri.clone(),
                Entry {
                    name: name.to_string(),
                    parent: Some(parent_uri.to_string()),
                    is_directory,
                    content: Vec::new(),
                },
            );
            Ok(uri)
        }

        fn delete(&self, uri: &str) -> Result<(), BackendError> {
            let mut entries = self.entries.lock().expect("handle provider poisoned");
            let children: Vec<String> = entries
                .iter()
                .filter(|(_, e)| e.parent.as_deref() == Some(uri))
                .map(|(u, _)| u.clone())
                .collect();
            drop(entries);
            for child in children {
                self.delete(&child)?;
            }
            let mut entries = self.entries.lock().expect("handle provider poisoned");
            entries.remove(uri).ok_or_else(|| BackendError::NotFound(uri.to_string()))?;
            Ok(())
        }

        fn rename(&self, uri: &str, new_name: &str) -> Result<String, BackendError> {
            let mut entries = self.entries.lock().expect("handle provider poisoned");
            let entry = entries.get_mut(uri).ok_or_else(|| BackendError::NotFound(uri.to_string()))?;
            entry.name = new_name.to_string();
            // Real providers commonly mint a new URI on rename; simulate that here.
            let parent = entry.parent.clone();
            let is_directory = entry.is_directory;
            let content = std::mem::take(&mut entry.content);
            entries.remove(uri);
            let new_uri = Self::next_uri();
            entries.insert(
                new_uri.clone(),
                Entry {
                    name: new_name.to_string(),
                    parent,
                    is_directory,
                    content,
                },
            );
            Ok(new_uri)
        }

        fn is_directory(&self, uri: &str) -> Result<bool, BackendError> {
            let entries = self.entries.lock().expect("handle provider poisoned");
            entries
                .get(uri)
                .map(|e| e.is_directory)
                .ok_or_else(|| BackendError::NotFound(uri.to_string()))
        }

        fn read_all(&self, uri: &str) -> Result<Vec<u8>, BackendError> {
            let entries = self.entries.lock().expect("handle provider poisoned");
            entries
                .get(uri)
                .map(|e| e.content.clone())
                .ok_or_else(|| BackendError::NotFound(uri.to_string()))
        }

        fn write_whole(&self, parent_uri: &str, name: &str, data: &[u8]) -> Result<String, BackendError> {
            let uri = self.create_child(parent_uri, name, false)?;
            let mut entries = self.entries.lock().expect("handle provider poisoned");
            entries.get_mut(&uri).expect("just inserted").content = data.to_vec();
            Ok(uri)
        }
    }
}

pub use in_memory::InMemoryHandleProvider;
