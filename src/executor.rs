//! Drives upload tasks through the injected transport.
//!
//! Admission control is a semaphore with `max_concurrent_uploads` permits:
//! queued tasks hold no permit and wait their turn. Each spawned upload
//! carries a cancellation token so removal aborts it whether it is still
//! waiting or already mid-transfer. Every outcome, including transport
//! failure, lands as a status transition through the registry; nothing
//! escapes the async boundary.

use crate::common::task::{FileRef, TaskId};
use crate::registry::TaskRegistry;
use crate::transport::Transport;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub struct TransportExecutor {
    transport: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
    inflight: Arc<DashMap<TaskId, CancellationToken>>,
}

impl TransportExecutor {
    pub fn new(transport: Arc<dyn Transport>, max_concurrent: usize) -> Self {
        Self {
            transport,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Uploads tracked by this executor, waiting or active.
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Cancel a waiting or mid-transfer upload. No-op for unknown ids.
    pub fn abort(&self, id: &TaskId) {
        if let Some((_, token)) = self.inflight.remove(id) {
            tracing::debug!("Aborting upload for task {}", id);
            token.cancel();
        }
    }

    /// Start one task's uploading episode on a background tokio task.
    ///
    /// `already_uploading` is set on the retry path, where the registry has
    /// marked the task Uploading before a permit is available; fresh tasks
    /// stay Queued until their permit is acquired.
    pub fn spawn(
        &self,
        registry: Arc<TaskRegistry>,
        id: TaskId,
        episode: u64,
        file: FileRef,
        already_uploading: bool,
    ) {
        let token = CancellationToken::new();
        self.inflight.insert(id, token.clone());

        let transport = self.transport.clone();
        let permits = self.permits.clone();
        let inflight = self.inflight.clone();

        tokio::spawn(async move {
            let permit = tokio::select! {
                _ = token.cancelled() => {
                    inflight.remove(&id);
                    return;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        inflight.remove(&id);
                        return;
                    }
                },
            };

            if !already_uploading && !registry.begin_upload(&id, episode) {
                // Removed while queued
                inflight.remove(&id);
                return;
            }

            tracing::debug!("Uploading {} (task {})", file.name, id);

            let progress_registry = registry.clone();
            let on_progress = Box::new(move |percent: u8| {
                progress_registry.record_progress(&id, episode, percent);
            });

            let outcome = tokio::select! {
                _ = token.cancelled() => None,
                result = transport.upload(&file, on_progress) => Some(result),
            };

            inflight.remove(&id);
            drop(permit);

            match outcome {
                Some(result) => {
                    if let Err(ref err) = result {
                        tracing::warn!("Upload of {} failed: {}", file.name, err);
                    }
                    registry.finish(&id, episode, result);
                }
                None => {
                    // Aborted; the session removes the task, no terminal write
                    tracing::debug!("Upload of {} aborted", file.name);
                }
            }
        });
    }
}
