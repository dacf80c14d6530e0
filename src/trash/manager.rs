//! Trash manager: parks objects into a private trash area and enforces
//! age/size quotas (§4.4).

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::StoraxError;
use crate::location::{BackendKind, Location};

use super::store::{TrashEntry, TrashStore};

pub struct TrashManagerConfig {
    pub max_age_ms: i64,
    pub max_size_bytes: u64,
}

impl Default for TrashManagerConfig {
    fn default() -> Self {
        Self {
            max_age_ms: crate::config::DEFAULT_TRASH_MAX_AGE_MS,
            max_size_bytes: crate::config::DEFAULT_TRASH_MAX_SIZE_BYTES,
        }
    }
}

pub struct TrashManager {
    store: TrashStore,
    /// Per-backend parked-object area (§6: `.storax_trash/` on each backend).
    trash_roots: HashMap<BackendKind, String>,
    config: TrashManagerConfig,
}

impl TrashManager {
    pub fn new(store: TrashStore, trash_roots: HashMap<BackendKind, String>, config: TrashManagerConfig) -> Self {
        Self {
            store,
            trash_roots,
            config,
        }
    }

    pub fn store(&self) -> &TrashStore {
        &self.store
    }

    fn trash_root(&self, kind: BackendKind) -> Result<&str, StoraxError> {
        self.trash_roots
            .get(&kind)
            .map(|s| s.as_str())
            .ok_or_else(|| StoraxError::BackendUnsupported {
                operation: "trash".to_string(),
            })
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Parks `location` and records it in the trash index, then runs eviction
    /// policies. Returns the new entry.
    pub fn move_to_trash(&self, location: &str, backend: &dyn Backend) -> Result<TrashEntry, StoraxError> {
        let loc = Location::parse(location);
        let display_name = loc.name();
        let kind = backend.kind();
        let trash_root = self.trash_root(kind)?;
        let id = Uuid::new_v4().to_string();
        let parked_name = format!("{id}_{display_name}");

        let is_directory = backend.is_directory(location)?;
        let parked_location = backend.relocate(location, trash_root, &parked_name)?;

        let size = if is_directory { None } else { directory_agnostic_size(backend, &parked_location) };

        let entry = TrashEntry {
            id,
            display_name,
            backend_kind: kind,
            is_directory,
            trashed_at: Self::now_ms(),
            size,
            original_location: location.to_string(),
            parked_location,
        };

        self.store.append(entry.clone())?;
        self.enforce_policies(backend)?;
        Ok(entry)
    }

    /// Restores `entry` to its original location. Best-effort on the handle
    /// backend, per §4.4.
    pub fn restore(&self, entry: &TrashEntry, backend: &dyn Backend) -> Result<(), StoraxError> {
        let original = Location::parse(&entry.original_location);
        if let Some(path) = original.as_path() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let dest_parent = match &original {
            Location::Path(p) => p.parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default(),
            Location::Handle(_) => {
                // Handle locations carry no separate parent component here;
                // callers restoring onto a handle backend supply the parent
                // via `original_location`'s backend-specific convention.
                entry.original_location.clone()
            }
        };

        backend.relocate(&entry.parked_location, &dest_parent, &original.name())?;
        self.store.remove(&entry.id)?;
        Ok(())
    }

    pub fn list(&self) -> Vec<TrashEntry> {
        self.store.read_all()
    }

    /// Removes a parked object and its index entry. A parked file without an
    /// index entry, or vice versa, is tolerated per §3's eventual-consistency
    /// invariant.
    pub fn purge(&self, entry: &TrashEntry, backend: &dyn Backend) -> Result<(), StoraxError> {
        if backend.exists(&entry.parked_location) {
            backend.delete(&entry.parked_location)?;
        }
        self.store.remove(&entry.id)?;
        Ok(())
    }

    pub fn empty(&self, backend: &dyn Backend) -> Result<bool, StoraxError> {
        let mut all_ok = true;
        for entry in self.store.read_all() {
            if self.purge(&entry, backend).is_err() {
                all_ok = false;
            }
        }
        Ok(all_ok)
    }

    /// Age and quota eviction, run inline after every add (§4.4, §9 notes that
    /// implementers may defer this to a background task without changing the
    /// external contract — this crate keeps it inline).
    fn enforce_policies(&self, backend: &dyn Backend) -> Result<(), StoraxError> {
        let now = Self::now_ms();
        let mut entries = self.store.read_all();

        let expired: Vec<TrashEntry> = entries
            .iter()
            .filter(|e| now - e.trashed_at > self.config.max_age_ms)
            .cloned()
            .collect();
        if !expired.is_empty() {
            log::debug!("trash eviction: {} entr(ies) past max_age_ms={}", expired.len(), self.config.max_age_ms);
        }
        for entry in &expired {
            let _ = self.purge(entry, backend);
        }
        entries.retain(|e| now - e.trashed_at <= self.config.max_age_ms);

        entries.sort_by_key(|e| e.trashed_at);
        let mut total: u64 = entries.iter().filter_map(|e| e.size).sum();
        if total > self.config.max_size_bytes {
            log::warn!("trash over quota: {total} bytes > max_size_bytes={}, evicting oldest first", self.config.max_size_bytes);
        }
        let mut index = 0;
        while total > self.config.max_size_bytes && index < entries.len() {
            let victim = entries[index].clone();
            if self.purge(&victim, backend).is_ok() {
                log::debug!("trash eviction: purged {} to satisfy quota", victim.display_name);
                total = total.saturating_sub(victim.size.unwrap_or(0));
            }
            index += 1;
        }

        Ok(())
    }
}

fn directory_agnostic_size(backend: &dyn Backend, location: &str) -> Option<u64> {
    backend
        .list(location.rsplit_once(['/', '\\']).map(|(p, _)| p).unwrap_or(""))
        .ok()
        .and_then(|nodes| nodes.into_iter().find(|n| n.location == location).map(|n| n.size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PathBackend;
    use tempfile::tempdir;

    fn manager_for(dir: &std::path::Path) -> (TrashManager, PathBackend) {
        let trash_dir = dir.join(".storax_trash");
        std::fs::create_dir_all(&trash_dir).unwrap();
        let store = TrashStore::new(dir.join("trash_index.json"));
        let mut roots = HashMap::new();
        roots.insert(BackendKind::Path, trash_dir.to_string_lossy().to_string());
        let manager = TrashManager::new(
            store,
            roots,
            TrashManagerConfig {
                max_age_ms: i64::MAX,
                max_size_bytes: u64::MAX,
            },
        );
        (manager, PathBackend::new())
    }

    #[test]
    fn move_to_trash_parks_and_indexes() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hello").unwrap();
        let (manager, backend) = manager_for(dir.path());

        let entry = manager.move_to_trash(&file.to_string_lossy(), &backend).unwrap();
        assert!(!file.exists());
        assert!(std::path::Path::new(&entry.parked_location).exists());
        assert_eq!(manager.list().len(), 1);
    }

    #[test]
    fn restore_recreates_original() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hello").unwrap();
        let (manager, backend) = manager_for(dir.path());

        let entry = manager.move_to_trash(&file.to_string_lossy(), &backend).unwrap();
        manager.restore(&entry, &backend).unwrap();
        assert!(file.exists());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello");
        assert!(manager.list().is_empty());
    }

    #[test]
    fn quota_eviction_purges_oldest_first() {
        let dir = tempdir().unwrap();
        let trash_dir = dir.path().join(".storax_trash");
        std::fs::create_dir_all(&trash_dir).unwrap();
        let store = TrashStore::new(dir.path().join("trash_index.json"));
        let mut roots = HashMap::new();
        roots.insert(BackendKind::Path, trash_dir.to_string_lossy().to_string());
        let manager = TrashManager::new(
            store,
            roots,
            TrashManagerConfig {
                max_age_ms: i64::MAX,
                max_size_bytes: 10,
            },
        );
        let backend = PathBackend::new();

        for name in ["a.txt", "b.txt"] {
            let file = dir.path().join(name);
            std::fs::write(&file, vec![0u8; 8]).unwrap();
            manager.move_to_trash(&file.to_string_lossy(), &backend).unwrap();
        }

        let remaining = manager.list();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].display_name, "b.txt");
    }
}
