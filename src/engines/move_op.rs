//! Move engine (§4.12): same-backend atomic shortcut, or a two-phase
//! `{COPYING, DELETING}` cross-backend transaction built on the copy engine.
//!
//! Backends are taken as `Arc<dyn Backend>` rather than `&dyn Backend` here,
//! unlike the copy engine: the delete phase of a cross-backend move runs
//! inside a spawned task and needs a `'static` handle to call back into the
//! backend once the copy phase is done. The orchestrator owns backends as
//! `Arc`s for exactly this reason.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::Backend;
use crate::conflict::{resolve_name, ConflictPolicy};
use crate::error::StoraxError;
use crate::lock::LockManager;
use crate::progress::{ProgressEvent, ProgressStream};
use crate::wal::{self, WalPhase, WalRecord};

use super::copy::{compute_total_bytes, CopyEngine, CopyOutcome, CopyParams};

pub enum MoveOutcome {
    Immediate { location: String },
    Transactional { job_id: String, stream: ProgressStream },
}

pub struct MoveEngine {
    wal_dir: PathBuf,
}

impl MoveEngine {
    pub fn new(wal_dir: impl Into<PathBuf>) -> Self {
        Self { wal_dir: wal_dir.into() }
    }

    pub fn wal_dir(&self) -> &std::path::Path {
        &self.wal_dir
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn move_adaptive(
        &self,
        locks: &LockManager,
        copy_engine: &CopyEngine,
        source_backend: Arc<dyn Backend>,
        dest_backend: Arc<dyn Backend>,
        source: &str,
        dest_parent: &str,
        new_name: &str,
        policy: ConflictPolicy,
        manual: Option<&str>,
    ) -> Result<MoveOutcome, StoraxError> {
        let key = format!("move::{source}->{dest_parent}/{new_name}");
        let guard = locks.acquire(&key).await?;

        let existing = dest_backend.list(dest_parent)?;
        let exists = |candidate: &str| existing.iter().any(|n| n.name == candidate);
        let final_name = resolve_name(exists, new_name, policy, manual).ok_or_else(|| StoraxError::ConflictDeclined {
            location: format!("{dest_parent}/{new_name}"),
        })?;

        if source_backend.kind() == dest_backend.kind() {
            let location = source_backend.relocate(source, dest_parent, &final_name)?;
            return Ok(MoveOutcome::Immediate { location });
        }

        self.run_cross_backend(guard, locks, copy_engine, source_backend, dest_backend, source, dest_parent, &final_name)
            .await
    }

    /// Runs the copy phase then the delete phase, holding `guard` for the
    /// whole transaction (including the part that runs in the background
    /// task after this function returns a `Transactional` outcome).
    #[allow(clippy::too_many_arguments)]
    async fn run_cross_backend(
        &self,
        guard: crate::lock::LockGuard,
        locks: &LockManager,
        copy_engine: &CopyEngine,
        source_backend: Arc<dyn Backend>,
        dest_backend: Arc<dyn Backend>,
        source: &str,
        dest_parent: &str,
        final_name: &str,
    ) -> Result<MoveOutcome, StoraxError> {
        let job_id = Uuid::new_v4().to_string();
        let is_directory = source_backend.is_directory(source)?;
        let total_bytes = compute_total_bytes(source_backend.as_ref(), source, is_directory)?;
        let target = format!("{dest_parent}/{final_name}");

        let record = WalRecord {
            job_id: job_id.clone(),
            source: source.to_string(),
            target: target.clone(),
            total_bytes,
            copied_bytes: 0,
            is_directory,
            phase: Some(WalPhase::Copying),
        };
        wal::write_wal(&self.wal_dir, &record)?;

        let copy_outcome = copy_engine
            .copy_adaptive(
                locks,
                source_backend.as_ref(),
                dest_backend.as_ref(),
                CopyParams {
                    source,
                    dest_parent,
                    new_name: final_name,
                    policy: ConflictPolicy::Replace,
                    manual: None,
                    force_progress: false,
                },
            )
            .await
            .map_err(|err| {
                let _ = wal::remove_wal(&self.wal_dir, &job_id);
                err
            })?;

        // A quick copy's `location` is the destination's own answer for where
        // the object landed (e.g. an opaque handle URI), which can differ
        // from the naively joined `dest_parent/final_name` — that join is
        // only a correct path for a same-backend-kind destination.
        let final_target = match &copy_outcome {
            CopyOutcome::Quick { location } => location.clone(),
            CopyOutcome::Transactional { .. } => target.clone(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let wal_dir = self.wal_dir.clone();
        let source_owned = source.to_string();
        let target_owned = final_target.clone();
        let job_id_for_task = job_id.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let copy_result = match copy_outcome {
                CopyOutcome::Quick { .. } => {
                    let _ = tx.send(ProgressEvent {
                        job_id: job_id_for_task.clone(),
                        source: source_owned.clone(),
                        target: target_owned.clone(),
                        copied: total_bytes,
                        total: total_bytes,
                    });
                    Ok(())
                }
                CopyOutcome::Transactional { stream, .. } => forward_and_join(stream, &tx, &job_id_for_task).await,
            };

            if let Err(err) = copy_result {
                wal::remove_wal(&wal_dir, &job_id_for_task).ok();
                return Err(err);
            }

            let deleting = WalRecord {
                job_id: job_id_for_task.clone(),
                source: source_owned.clone(),
                target: target_owned.clone(),
                total_bytes,
                copied_bytes: total_bytes,
                is_directory,
                phase: Some(WalPhase::Deleting),
            };
            wal::write_wal(&wal_dir, &deleting).ok();

            match source_backend.delete(&source_owned) {
                Ok(()) => {
                    wal::remove_wal(&wal_dir, &job_id_for_task).ok();
                    Ok(())
                }
                Err(delete_err) => {
                    // Best-effort: the destination already has a verified copy: leaving
                    // it in place loses nothing the source still has, so cleanup here
                    // only removes a duplicate, never data. Cleanup failures are
                    // swallowed deliberately (§4.12: "best effort").
                    let _ = dest_backend.delete(&target_owned);
                    wal::remove_wal(&wal_dir, &job_id_for_task).ok();
                    Err(delete_err.into())
                }
            }
        });

        Ok(MoveOutcome::Transactional {
            job_id,
            stream: ProgressStream::new(rx, handle),
        })
    }

    /// Recovery (§4.12): `COPYING` restarts the cross-backend copy (the inner
    /// copy WAL makes that idempotent); `DELETING` retries the source delete.
    pub async fn recover(
        &self,
        locks: &LockManager,
        copy_engine: &CopyEngine,
        source_backend: Arc<dyn Backend>,
        dest_backend: Arc<dyn Backend>,
    ) -> std::io::Result<Vec<(String, ProgressStream)>> {
        let mut streams = Vec::new();
        for record in wal::list_wal_jobs(&self.wal_dir)? {
            match record.phase {
                Some(WalPhase::Deleting) => {
                    let job_id = record.job_id.clone();
                    let wal_dir = self.wal_dir.clone();
                    let source = record.source.clone();
                    let target = record.target.clone();
                    let total = record.total_bytes;
                    let backend = source_backend.clone();
                    let lock_key = format!("move::{}->{}", record.source, record.target);
                    let guard = match locks.acquire(&lock_key).await {
                        Ok(g) => g,
                        Err(_) => continue,
                    };
                    let (tx, rx) = mpsc::unbounded_channel();
                    let handle = tokio::spawn(async move {
                        let _guard = guard;
                        let result = backend.delete(&source).map_err(StoraxError::from);
                        wal::remove_wal(&wal_dir, &job_id).ok();
                        let _ = tx.send(ProgressEvent {
                            job_id: job_id.clone(),
                            source: source.clone(),
                            target,
                            copied: total,
                            total,
                        });
                        result
                    });
                    streams.push((record.job_id.clone(), ProgressStream::new(rx, handle)));
                }
                _ => {
                    let dest_parent = parent_of(&record.target);
                    let final_name = crate::location::Location::parse(&record.target).name();
                    let lock_key = format!("move::{}->{}/{}", record.source, dest_parent, final_name);
                    let guard = match locks.acquire(&lock_key).await {
                        Ok(g) => g,
                        Err(_) => continue,
                    };
                    let result = self
                        .run_cross_backend(
                            guard,
                            locks,
                            copy_engine,
                            source_backend.clone(),
                            dest_backend.clone(),
                            &record.source,
                            &dest_parent,
                            &final_name,
                        )
                        .await;
                    if let Ok(MoveOutcome::Transactional { job_id, stream }) = result {
                        streams.push((job_id, stream));
                    }
                }
            }
        }
        Ok(streams)
    }
}

fn parent_of(location: &str) -> String {
    match location.rsplit_once(['/', '\\']) {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

async fn forward_and_join(mut stream: ProgressStream, tx: &mpsc::UnboundedSender<ProgressEvent>, job_id: &str) -> Result<(), StoraxError> {
    while let Some(event) = stream.next().await {
        let _ = tx.send(ProgressEvent {
            job_id: job_id.to_string(),
            source: event.source,
            target: event.target,
            copied: event.copied,
            total: event.total,
        });
    }
    stream.join().await
}
