//! Create engine (§4.8): journal-guarded create with conflict resolution.

use crate::backend::{Backend, CreateOutcome};
use crate::conflict::ConflictPolicy;
use crate::error::StoraxError;
use crate::journal::Journal;
use crate::lock::LockManager;
use crate::node::NodeType;

pub async fn create(
    locks: &LockManager,
    journal: &Journal,
    backend: &dyn Backend,
    parent: &str,
    name: &str,
    node_type: NodeType,
    policy: ConflictPolicy,
    manual: Option<&str>,
) -> Result<CreateOutcome, StoraxError> {
    let key = format!("create::{parent}/{name}");
    let _guard = locks.acquire(&key).await?;

    let handle = journal.begin_create(parent, name, node_type, backend.kind())?;

    match backend.create(parent, name, node_type, policy, manual) {
        Ok(outcome) => {
            journal.commit(handle)?;
            Ok(outcome)
        }
        Err(err) => {
            // Leave the record for the next recovery pass rather than special-
            // casing the failure here: recovery's own "target already present"
            // check (§4.6) cleans up a conflict decline, and a transient
            // failure gets retried with FAIL on the next startup.
            journal.abandon(handle);
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PathBackend;
    use crate::node::NodeType;

    #[tokio::test]
    async fn create_commits_and_clears_journal() {
        let temp = tempfile::tempdir().unwrap();
        let journal_dir = temp.path().join("journal");
        let locks = LockManager::default();
        let journal = Journal::new(&journal_dir);
        let backend = PathBackend::new();
        let parent = temp.path().to_str().unwrap().to_string();

        let outcome = create(&locks, &journal, &backend, &parent, "note.txt", NodeType::File, ConflictPolicy::Fail, None)
            .await
            .unwrap();
        assert_eq!(outcome.final_name, "note.txt");
        assert!(std::path::Path::new(&outcome.location).exists());
        assert!(std::fs::read_dir(&journal_dir).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn conflict_fail_leaves_journal_record_for_recovery() {
        let temp = tempfile::tempdir().unwrap();
        let journal_dir = temp.path().join("journal");
        let locks = LockManager::default();
        let journal = Journal::new(&journal_dir);
        let backend = PathBackend::new();
        let parent = temp.path().to_str().unwrap().to_string();

        std::fs::write(temp.path().join("note.txt"), b"existing").unwrap();

        let result = create(&locks, &journal, &backend, &parent, "note.txt", NodeType::File, ConflictPolicy::Fail, None).await;
        assert!(result.is_err());
        // abandon() deliberately leaves the record for the next recovery pass.
        assert_eq!(std::fs::read_dir(&journal_dir).unwrap().count(), 1);
    }
}
