//! Orchestrator (§4.13, §6): the facade. Acquires locks, selects backends,
//! drives engines, and is the sole registrant of undo actions. Exposes the
//! method surface of §6 and the `transferProgress`/`undoStateChanged` event
//! channel.
//!
//! The method-surface table describes an RPC-style `bool | jobId` return for
//! `copy`; Rust renders that more naturally as an enum (`CopyReply`) than as
//! a dynamically-typed union, so that is the one deliberate shape departure
//! from the literal table — every argument and every other method's return
//! keeps its described meaning.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::{Backend, CreateOutcome};
use crate::config::Paths;
use crate::conflict::ConflictPolicy;
use crate::engines::{self, copy::CopyOutcome, copy::CopyParams, move_op::MoveOutcome};
use crate::error::StoraxError;
use crate::journal::{Journal, RecoveryOutcome};
use crate::listing;
use crate::location::{BackendKind, Location};
use crate::lock::LockManager;
use crate::node::{Node, NodeType};
use crate::progress::ProgressStream;
use crate::trash::{TrashEntry, TrashManager, TrashManagerConfig, TrashStore};
use crate::undo::{UndoAction, UndoLog};

/// Events emitted on the orchestrator's channel after every mutation,
/// success or failure (§7), plus transfer progress for copy/move jobs.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    TransferProgress { job_id: String, percent: f64 },
    UndoStateChanged { can_undo: bool, can_redo: bool },
}

/// `copy`'s method-surface return is `bool | jobId` (§6): a quick copy
/// finishes inline, a transactional copy hands back a job id to watch on the
/// event channel.
#[derive(Debug, Clone)]
pub enum CopyReply {
    Done { location: String },
    Job { job_id: String },
}

/// Result of `recover_pending_operations` (§4.13).
#[derive(Debug)]
pub struct RecoveryReport {
    pub journal: Vec<RecoveryOutcome>,
    /// Job ids of copy/move transactions resumed in the background; their
    /// completion is observable only via the event channel.
    pub resumed_jobs: Vec<String>,
}

pub struct Orchestrator {
    locks: LockManager,
    journal: Journal,
    trash: TrashManager,
    undo: Arc<UndoLog>,
    copy_engine: engines::copy::CopyEngine,
    move_engine: engines::move_op::MoveEngine,
    backends: HashMap<BackendKind, Arc<dyn Backend>>,
    events: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl Orchestrator {
    pub fn new(
        paths: &Paths,
        backends: HashMap<BackendKind, Arc<dyn Backend>>,
        trash_roots: HashMap<BackendKind, String>,
    ) -> std::io::Result<(Self, mpsc::UnboundedReceiver<OrchestratorEvent>)> {
        paths.ensure_all()?;
        let store = TrashStore::new(paths.trash_index_file());
        let trash = TrashManager::new(store, trash_roots, TrashManagerConfig::default());
        let undo = Arc::new(UndoLog::new(
            paths.undo_stack_file(),
            paths.redo_stack_file(),
            crate::config::DEFAULT_UNDO_CAPACITY,
        ));
        let journal = Journal::new(paths.journal_dir());
        let copy_engine = engines::copy::CopyEngine::new(paths.copy_wal_dir(), paths.root().join("copy_cache"));
        let move_engine = engines::move_op::MoveEngine::new(paths.move_wal_dir());
        let (events, rx) = mpsc::unbounded_channel();

        Ok((
            Self {
                locks: LockManager::default(),
                journal,
                trash,
                undo,
                copy_engine,
                move_engine,
                backends,
                events,
            },
            rx,
        ))
    }

    fn backend(&self, kind: BackendKind) -> Result<Arc<dyn Backend>, StoraxError> {
        self.backends.get(&kind).cloned().ok_or(StoraxError::BackendUnsupported {
            operation: format!("{kind:?} backend not configured"),
        })
    }

    async fn notify_undo_state(&self) {
        let can_undo = self.undo.can_undo().await;
        let can_redo = self.undo.can_redo().await;
        let _ = self.events.send(OrchestratorEvent::UndoStateChanged { can_undo, can_redo });
    }

    /// Spawns a background drain of `stream`, forwarding progress and a final
    /// undo-state notification. Used by transactional copy and by resumed
    /// recovery jobs, which the caller does not block on.
    fn spawn_stream_drain(&self, job_id: String, mut stream: ProgressStream) {
        let events = self.events.clone();
        let undo = self.undo.clone();
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let _ = events.send(OrchestratorEvent::TransferProgress {
                    job_id: job_id.clone(),
                    percent: event.percent(),
                });
            }
            let _ = stream.join().await;
            let can_undo = undo.can_undo().await;
            let can_redo = undo.can_redo().await;
            let _ = events.send(OrchestratorEvent::UndoStateChanged { can_undo, can_redo });
        });
    }

    // ---- listing ----

    pub async fn list_directory(&self, kind: BackendKind, target: &str) -> Result<Vec<Node>, StoraxError> {
        let backend = self.backend(kind)?;
        listing::list_directory(backend.as_ref(), target)
    }

    pub async fn traverse_directory(&self, kind: BackendKind, target: &str, max_depth: i64) -> Result<Vec<Node>, StoraxError> {
        let backend = self.backend(kind)?;
        listing::traverse_directory(backend.as_ref(), target, max_depth)
    }

    // ---- create / rename ----

    pub async fn create(
        &self,
        kind: BackendKind,
        parent: &str,
        name: &str,
        node_type: NodeType,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<CreateOutcome, StoraxError> {
        let backend = self.backend(kind)?;
        let result = engines::create::create(&self.locks, &self.journal, backend.as_ref(), parent, name, node_type, policy, manual).await;
        if let Ok(outcome) = &result {
            let _ = self
                .undo
                .register(UndoAction::Create {
                    location: outcome.location.clone(),
                    node_type,
                })
                .await;
        }
        self.notify_undo_state().await;
        result
    }

    pub async fn rename(
        &self,
        kind: BackendKind,
        source: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<String, StoraxError> {
        let backend = self.backend(kind)?;
        let result = engines::rename::rename(&self.locks, &self.journal, backend.as_ref(), source, new_name, policy, manual).await;
        if let Ok(new_location) = &result {
            let _ = self
                .undo
                .register(UndoAction::Rename {
                    from: new_location.clone(),
                    to: source.to_string(),
                })
                .await;
        }
        self.notify_undo_state().await;
        result
    }

    // ---- move ----

    #[allow(clippy::too_many_arguments)]
    pub async fn move_node(
        &self,
        source_kind: BackendKind,
        dest_kind: BackendKind,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<String, StoraxError> {
        let source_backend = self.backend(source_kind)?;
        let dest_backend = self.backend(dest_kind)?;

        let outcome = self
            .move_engine
            .move_adaptive(&self.locks, &self.copy_engine, source_backend, dest_backend, source, dest_parent, new_name, policy, manual)
            .await;
        let outcome = match outcome {
            Ok(o) => o,
            Err(err) => {
                self.notify_undo_state().await;
                return Err(err);
            }
        };

        let final_location = match outcome {
            MoveOutcome::Immediate { location } => location,
            MoveOutcome::Transactional { job_id, mut stream } => {
                let mut last_target = format!("{dest_parent}/{new_name}");
                while let Some(event) = stream.next().await {
                    last_target = event.target.clone();
                    let _ = self.events.send(OrchestratorEvent::TransferProgress {
                        job_id: job_id.clone(),
                        percent: event.percent(),
                    });
                }
                if let Err(err) = stream.join().await {
                    self.notify_undo_state().await;
                    return Err(err);
                }
                last_target
            }
        };

        let _ = self
            .undo
            .register(UndoAction::Move {
                from: final_location.clone(),
                to: source.to_string(),
            })
            .await;
        self.notify_undo_state().await;
        Ok(final_location)
    }

    // ---- copy ----

    #[allow(clippy::too_many_arguments)]
    pub async fn copy(
        &self,
        source_kind: BackendKind,
        dest_kind: BackendKind,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
        force_progress: bool,
    ) -> Result<CopyReply, StoraxError> {
        let source_backend = self.backend(source_kind)?;
        let dest_backend = self.backend(dest_kind)?;

        let outcome = self
            .copy_engine
            .copy_adaptive(
                &self.locks,
                source_backend.as_ref(),
                dest_backend.as_ref(),
                CopyParams {
                    source,
                    dest_parent,
                    new_name,
                    policy,
                    manual,
                    force_progress,
                },
            )
            .await;

        let outcome = match outcome {
            Ok(o) => o,
            Err(err) => {
                self.notify_undo_state().await;
                return Err(err);
            }
        };

        match outcome {
            CopyOutcome::Quick { location } => {
                let _ = self.undo.register(UndoAction::Copy { location: location.clone() }).await;
                self.notify_undo_state().await;
                Ok(CopyReply::Done { location })
            }
            CopyOutcome::Transactional { job_id, stream } => {
                // The final location only becomes known once the job finishes;
                // the Copy undo action is registered by the background drain
                // below instead of here.
                let events = self.events.clone();
                let undo = self.undo.clone();
                let job_id_for_task = job_id.clone();
                let target_hint = format!("{dest_parent}/{new_name}");
                tokio::spawn(async move {
                    let mut stream = stream;
                    let mut last_target = target_hint;
                    while let Some(event) = stream.next().await {
                        last_target = event.target.clone();
                        let _ = events.send(OrchestratorEvent::TransferProgress {
                            job_id: job_id_for_task.clone(),
                            percent: event.percent(),
                        });
                    }
                    if stream.join().await.is_ok() {
                        let _ = undo.register(UndoAction::Copy { location: last_target }).await;
                    }
                    let can_undo = undo.can_undo().await;
                    let can_redo = undo.can_redo().await;
                    let _ = events.send(OrchestratorEvent::UndoStateChanged { can_undo, can_redo });
                });
                Ok(CopyReply::Job { job_id })
            }
        }
    }

    pub fn cancel_copy(&self, job_id: &str) -> bool {
        self.copy_engine.cancel(job_id)
    }

    pub fn pause_copy(&self, job_id: &str) -> bool {
        self.copy_engine.pause(job_id)
    }

    pub fn resume_copy(&self, job_id: &str) -> bool {
        self.copy_engine.resume(job_id)
    }

    // ---- delete / trash ----

    pub async fn delete(&self, kind: BackendKind, location: &str) -> Result<TrashEntry, StoraxError> {
        let backend = self.backend(kind)?;
        let result = engines::delete::to_trash(&self.locks, &self.trash, backend.as_ref(), location).await;
        if let Ok(entry) = &result {
            let _ = self
                .undo
                .register(UndoAction::Delete {
                    original_location: entry.original_location.clone(),
                    parked_location: entry.parked_location.clone(),
                })
                .await;
        }
        self.notify_undo_state().await;
        result
    }

    pub async fn permanently_delete(&self, kind: BackendKind, path: &str) -> Result<(), StoraxError> {
        let backend = self.backend(kind)?;
        let result = engines::delete::permanent_delete(&self.locks, backend.as_ref(), path).await;
        self.notify_undo_state().await;
        result
    }

    pub fn list_trash(&self) -> Vec<TrashEntry> {
        self.trash.list()
    }

    pub async fn restore_from_trash(&self, entry: &TrashEntry) -> Result<(), StoraxError> {
        let backend = self.backend(entry.backend_kind)?;
        let result = self.trash.restore(entry, backend.as_ref());
        self.notify_undo_state().await;
        result
    }

    pub async fn permanently_delete_from_trash(&self, entry: &TrashEntry) -> Result<(), StoraxError> {
        let backend = self.backend(entry.backend_kind)?;
        let result = engines::delete::permanent_delete_from_trash(&self.locks, &self.trash, backend.as_ref(), entry).await;
        self.notify_undo_state().await;
        result
    }

    /// Iterates the trash index and permanent-deletes each entry, resolving
    /// the backend per entry (entries may span both backend kinds). Returns
    /// the conjunction of individual outcomes (§4.13).
    pub async fn empty_trash(&self) -> Result<bool, StoraxError> {
        let mut all_ok = true;
        for entry in self.trash.list() {
            match self.backend(entry.backend_kind) {
                Ok(backend) => {
                    if engines::delete::permanent_delete_from_trash(&self.locks, &self.trash, backend.as_ref(), &entry)
                        .await
                        .is_err()
                    {
                        all_ok = false;
                    }
                }
                Err(_) => all_ok = false,
            }
        }
        self.notify_undo_state().await;
        Ok(all_ok)
    }

    // ---- undo / redo ----

    pub async fn undo(&self) -> bool {
        let result = self.undo.undo_last(|action| self.invert(action)).await;
        self.notify_undo_state().await;
        result
    }

    pub async fn redo(&self) -> bool {
        let result = self.undo.redo_last(|action| self.replay(action)).await;
        self.notify_undo_state().await;
        result
    }

    pub async fn can_undo(&self) -> bool {
        self.undo.can_undo().await
    }

    pub async fn can_redo(&self) -> bool {
        self.undo.can_redo().await
    }

    pub async fn undo_count(&self) -> usize {
        self.undo.undo_count().await
    }

    pub async fn redo_count(&self) -> usize {
        self.undo.redo_count().await
    }

    pub async fn clear_undo(&self) -> Result<(), StoraxError> {
        Ok(self.undo.clear().await?)
    }

    /// Invertors per §4.7's table. Must never touch `self.undo` — `undo_last`
    /// already holds the undo mutex while this runs.
    async fn invert(&self, action: &UndoAction) -> bool {
        match action {
            UndoAction::Create { location, .. } => self.to_trash_raw(location).await,
            UndoAction::Delete {
                original_location: _,
                parked_location,
            } => self.restore_raw(parked_location).await,
            UndoAction::Rename { from, to } => {
                let new_name = Location::parse(to).name();
                self.rename_raw(from, &new_name).await
            }
            UndoAction::Move { from, to } => {
                let dest_parent = parent_of(to);
                let new_name = Location::parse(to).name();
                self.move_raw(from, &dest_parent, &new_name).await
            }
            UndoAction::Copy { location } => self.to_trash_raw(location).await,
        }
    }

    /// Redo counterparts per §4.7's table. `Copy` is "not invertible" on redo.
    async fn replay(&self, action: &UndoAction) -> bool {
        match action {
            UndoAction::Create { location, node_type } => {
                let parent = parent_of(location);
                let name = Location::parse(location).name();
                let Ok(backend) = self.backend(Location::parse(location).backend_kind()) else {
                    return false;
                };
                engines::create::create(&self.locks, &self.journal, backend.as_ref(), &parent, &name, *node_type, ConflictPolicy::Fail, None)
                    .await
                    .is_ok()
            }
            UndoAction::Delete { original_location, .. } => self.to_trash_raw(original_location).await,
            UndoAction::Rename { from, to } => {
                let new_name = Location::parse(from).name();
                self.rename_raw(to, &new_name).await
            }
            UndoAction::Move { from, to } => {
                let dest_parent = parent_of(from);
                let new_name = Location::parse(from).name();
                self.move_raw(to, &dest_parent, &new_name).await
            }
            UndoAction::Copy { .. } => false,
        }
    }

    async fn to_trash_raw(&self, location: &str) -> bool {
        let Ok(backend) = self.backend(Location::parse(location).backend_kind()) else {
            return false;
        };
        engines::delete::to_trash(&self.locks, &self.trash, backend.as_ref(), location).await.is_ok()
    }

    async fn restore_raw(&self, parked_location: &str) -> bool {
        let Ok(backend) = self.backend(Location::parse(parked_location).backend_kind()) else {
            return false;
        };
        let Some(entry) = self.trash.list().into_iter().find(|e| e.parked_location == parked_location) else {
            return false;
        };
        self.trash.restore(&entry, backend.as_ref()).is_ok()
    }

    async fn rename_raw(&self, source: &str, new_name: &str) -> bool {
        let Ok(backend) = self.backend(Location::parse(source).backend_kind()) else {
            return false;
        };
        engines::rename::rename(&self.locks, &self.journal, backend.as_ref(), source, new_name, ConflictPolicy::Fail, None)
            .await
            .is_ok()
    }

    async fn move_raw(&self, source: &str, dest_parent: &str, new_name: &str) -> bool {
        let Ok(source_backend) = self.backend(Location::parse(source).backend_kind()) else {
            return false;
        };
        let Ok(dest_backend) = self.backend(Location::parse(dest_parent).backend_kind()) else {
            return false;
        };
        match self
            .move_engine
            .move_adaptive(
                &self.locks,
                &self.copy_engine,
                source_backend,
                dest_backend,
                source,
                dest_parent,
                new_name,
                ConflictPolicy::Fail,
                None,
            )
            .await
        {
            Ok(MoveOutcome::Immediate { .. }) => true,
            Ok(MoveOutcome::Transactional { mut stream, .. }) => stream.join().await.is_ok(),
            Err(_) => false,
        }
    }

    // ---- recovery ----

    /// Runs journal recovery, then aggregates copy/move WAL recovery,
    /// resuming each as a background job whose progress is observable on the
    /// event channel (§4.13).
    pub async fn recover_pending_operations(&self) -> Result<RecoveryReport, StoraxError> {
        let journal_outcomes = self.journal.recover(|kind| {
            self.backends
                .get(&kind)
                .map(|b| b.as_ref())
                .expect("journal referenced a backend kind this orchestrator was not configured with")
        })?;

        let mut resumed = Vec::new();

        let copy_streams = self.copy_engine.recover(&self.locks).await?;
        for (job_id, stream) in copy_streams {
            resumed.push(job_id.clone());
            self.spawn_stream_drain(job_id, stream);
        }

        if let (Ok(path_backend), Ok(handle_backend)) = (self.backend(BackendKind::Path), self.backend(BackendKind::Handle)) {
            let move_streams = self
                .move_engine
                .recover(&self.locks, &self.copy_engine, path_backend, handle_backend)
                .await?;
            for (job_id, stream) in move_streams {
                resumed.push(job_id.clone());
                self.spawn_stream_drain(job_id, stream);
            }
        }

        Ok(RecoveryReport {
            journal: journal_outcomes,
            resumed_jobs: resumed,
        })
    }
}

fn parent_of(location: &str) -> String {
    match location.rsplit_once(['/', '\\']) {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}
