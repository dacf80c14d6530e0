//! Delete engine (§4.10): trash move or permanent delete.
//!
//! Engines never touch the undo log themselves — the orchestrator is the
//! sole registrant (§4.13), since it alone supplies the invertors.

use crate::backend::Backend;
use crate::error::StoraxError;
use crate::lock::LockManager;
use crate::trash::{TrashEntry, TrashManager};

/// Parks `location` in the trash. Caller (the orchestrator) registers the
/// `Delete` undo action on success.
pub async fn to_trash(locks: &LockManager, trash: &TrashManager, backend: &dyn Backend, location: &str) -> Result<TrashEntry, StoraxError> {
    let key = format!("delete::{location}");
    let _guard = locks.acquire(&key).await?;
    trash.move_to_trash(location, backend)
}

pub async fn permanent_delete(locks: &LockManager, backend: &dyn Backend, location: &str) -> Result<(), StoraxError> {
    let key = format!("permanent_delete::{location}");
    let _guard = locks.acquire(&key).await?;
    backend.delete(location)?;
    Ok(())
}

pub async fn permanent_delete_from_trash(
    locks: &LockManager,
    trash: &TrashManager,
    backend: &dyn Backend,
    entry: &TrashEntry,
) -> Result<(), StoraxError> {
    let key = format!("trash_delete::{}", entry.parked_location);
    let _guard = locks.acquire(&key).await?;
    trash.purge(entry, backend)?;
    Ok(())
}
