//! Rename engine (§4.9): journal-guarded rename.

use crate::backend::Backend;
use crate::conflict::ConflictPolicy;
use crate::error::StoraxError;
use crate::journal::Journal;
use crate::lock::LockManager;

pub async fn rename(
    locks: &LockManager,
    journal: &Journal,
    backend: &dyn Backend,
    source: &str,
    new_name: &str,
    policy: ConflictPolicy,
    manual: Option<&str>,
) -> Result<String, StoraxError> {
    let key = format!("rename::{source}");
    let _guard = locks.acquire(&key).await?;

    let parent = parent_of(source);
    let target = format!("{parent}/{new_name}");
    let handle = journal.begin_rename(source, &target, backend.kind())?;

    match backend.rename(source, new_name, policy, manual) {
        Ok(new_location) => {
            journal.commit(handle)?;
            Ok(new_location)
        }
        Err(err) => {
            journal.abandon(handle);
            Err(err.into())
        }
    }
}

fn parent_of(location: &str) -> String {
    match location.rsplit_once(['/', '\\']) {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PathBackend;
    use crate::node::NodeType;

    #[tokio::test]
    async fn rename_commits_and_clears_journal() {
        let temp = tempfile::tempdir().unwrap();
        let journal_dir = temp.path().join("journal");
        let locks = LockManager::default();
        let journal = Journal::new(&journal_dir);
        let backend = PathBackend::new();
        let parent = temp.path().to_str().unwrap().to_string();

        let created = backend.create(&parent, "a.txt", NodeType::File, ConflictPolicy::Fail, None).unwrap();

        let new_location = rename(&locks, &journal, &backend, &created.location, "b.txt", ConflictPolicy::Fail, None)
            .await
            .unwrap();
        assert!(new_location.ends_with("b.txt"));
        assert!(temp.path().join("b.txt").exists());
        assert!(!temp.path().join("a.txt").exists());
        assert!(std::fs::read_dir(&journal_dir).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn rename_conflict_fail_leaves_journal_record() {
        let temp = tempfile::tempdir().unwrap();
        let journal_dir = temp.path().join("journal");
        let locks = LockManager::default();
        let journal = Journal::new(&journal_dir);
        let backend = PathBackend::new();
        let parent = temp.path().to_str().unwrap().to_string();

        let created = backend.create(&parent, "a.txt", NodeType::File, ConflictPolicy::Fail, None).unwrap();
        backend.create(&parent, "b.txt", NodeType::File, ConflictPolicy::Fail, None).unwrap();

        let result = rename(&locks, &journal, &backend, &created.location, "b.txt", ConflictPolicy::Fail, None).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(&journal_dir).unwrap().count(), 1);
    }
}
