//! Undo/redo log: two stacks, mirrored to disk as two JSON arrays, serialized
//! by a single mutex (§4.7).
//!
//! Payloads are tagged variants with an explicit per-case encoder/decoder
//! (`#[serde(tag = "type", ...)]`) rather than runtime reflection, per the
//! REDESIGN FLAGS note on undo-action serialization. The invertors themselves
//! are supplied by the orchestrator, which is the only caller that knows how
//! to re-run an engine operation.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::node::NodeType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UndoAction {
    Create { location: String, node_type: NodeType },
    Delete { original_location: String, parked_location: String },
    /// See §9 Open Questions: `from`/`to` describe the post-operation side and
    /// the pre-operation side respectively — the reverse of what the field
    /// names suggest. Undoing replays the operation from `from` to the name
    /// of `to`; redoing replays it the other way.
    Rename { from: String, to: String },
    /// Same reversed-field convention as `Rename`.
    Move { from: String, to: String },
    Copy { location: String },
}

struct UndoState {
    undo: VecDeque<UndoAction>,
    redo: VecDeque<UndoAction>,
}

pub struct UndoLog {
    state: Mutex<UndoState>,
    capacity: usize,
    undo_file: PathBuf,
    redo_file: PathBuf,
}

impl UndoLog {
    pub fn new(undo_file: impl Into<PathBuf>, redo_file: impl Into<PathBuf>, capacity: usize) -> Self {
        let undo_file = undo_file.into();
        let redo_file = redo_file.into();
        let undo = read_stack(&undo_file);
        let redo = read_stack(&redo_file);
        Self {
            state: Mutex::new(UndoState { undo, redo }),
            capacity,
            undo_file,
            redo_file,
        }
    }

    fn persist(&self, state: &UndoState) -> std::io::Result<()> {
        write_stack(&self.undo_file, &state.undo)?;
        write_stack(&self.redo_file, &state.redo)?;
        Ok(())
    }

    /// Pushes `action` onto the undo stack, clears redo, evicts the oldest
    /// entry if the stack now exceeds capacity.
    pub async fn register(&self, action: UndoAction) -> std::io::Result<()> {
        let mut state = self.state.lock().await;
        state.redo.clear();
        state.undo.push_back(action);
        if state.undo.len() > self.capacity {
            state.undo.pop_front();
        }
        self.persist(&state)
    }

    /// Peeks the top of the undo stack and invokes `invert`; on success (`true`),
    /// pops it from undo and pushes it to redo. Returns `false` when the stack
    /// is empty or the invertor declines.
    pub async fn undo_last<F, Fut>(&self, invert: F) -> bool
    where
        F: FnOnce(&UndoAction) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut state = self.state.lock().await;
        let Some(top) = state.undo.back().cloned() else {
            return false;
        };
        if !invert(&top).await {
            return false;
        }
        state.undo.pop_back();
        state.redo.push_back(top);
        if state.redo.len() > self.capacity {
            state.redo.pop_front();
        }
        let _ = self.persist(&state);
        true
    }

    /// Symmetric to `undo_last`, replaying from the redo stack back onto undo.
    pub async fn redo_last<F, Fut>(&self, replay: F) -> bool
    where
        F: FnOnce(&UndoAction) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut state = self.state.lock().await;
        let Some(top) = state.redo.back().cloned() else {
            return false;
        };
        if !replay(&top).await {
            return false;
        }
        state.redo.pop_back();
        state.undo.push_back(top);
        if state.undo.len() > self.capacity {
            state.undo.pop_front();
        }
        let _ = self.persist(&state);
        true
    }

    pub async fn can_undo(&self) -> bool {
        !self.state.lock().await.undo.is_empty()
    }

    pub async fn can_redo(&self) -> bool {
        !self.state.lock().await.redo.is_empty()
    }

    pub async fn undo_count(&self) -> usize {
        self.state.lock().await.undo.len()
    }

    pub async fn redo_count(&self) -> usize {
        self.state.lock().await.redo.len()
    }

    pub async fn clear(&self) -> std::io::Result<()> {
        let mut state = self.state.lock().await;
        state.undo.clear();
        state.redo.clear();
        self.persist(&state)
    }
}

fn read_stack(path: &Path) -> VecDeque<UndoAction> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => VecDeque::new(),
    }
}

fn write_stack(path: &Path, stack: &VecDeque<UndoAction>) -> std::io::Result<()> {
    let items: Vec<&UndoAction> = stack.iter().collect();
    let bytes = serde_json::to_vec_pretty(&items).expect("undo stack serializes");
    crate::fsutil::atomic_write(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn action(n: u32) -> UndoAction {
        UndoAction::Create {
            location: format!("/t/c{n}.txt"),
            node_type: NodeType::File,
        }
    }

    #[tokio::test]
    async fn register_then_undo_round_trips() {
        let dir = tempdir().unwrap();
        let log = UndoLog::new(dir.path().join("undo.json"), dir.path().join("redo.json"), 100);
        log.register(action(1)).await.unwrap();
        assert!(log.can_undo().await);
        assert!(!log.can_redo().await);

        let undone = log.undo_last(|_| async { true }).await;
        assert!(undone);
        assert!(!log.can_undo().await);
        assert!(log.can_redo().await);

        let redone = log.redo_last(|_| async { true }).await;
        assert!(redone);
        assert!(log.can_undo().await);
        assert!(!log.can_redo().await);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let dir = tempdir().unwrap();
        let log = UndoLog::new(dir.path().join("undo.json"), dir.path().join("redo.json"), 3);
        for n in 1..=4 {
            log.register(action(n)).await.unwrap();
        }
        assert_eq!(log.undo_count().await, 3);

        for expected in [4, 3, 2] {
            let undone = log
                .undo_last(|a| {
                    let matches = matches!(a, UndoAction::Create { location, .. } if location == &format!("/t/c{expected}.txt"));
                    async move { matches }
                })
                .await;
            assert!(undone, "expected to undo c{expected}");
        }
        assert!(!log.can_undo().await);
    }

    #[tokio::test]
    async fn undo_on_empty_stack_returns_false() {
        let dir = tempdir().unwrap();
        let log = UndoLog::new(dir.path().join("undo.json"), dir.path().join("redo.json"), 10);
        assert!(!log.undo_last(|_| async { true }).await);
    }
}
