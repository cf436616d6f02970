//! Session façade: the public surface consumed by the UI layer.
//!
//! Composes validator, registry and executor for one form-submission
//! session. The UI observes state exclusively through snapshot
//! notifications; errors it must react to synchronously (limit overflow,
//! bad retry targets) come back as typed results.

use crate::common::config::UploadConfig;
use crate::common::task::{FileRef, RawFile, TaskId, TaskStatus, UploadTask};
use crate::executor::TransportExecutor;
use crate::registry::{AggregateLimitError, RetryDenied, TaskRegistry};
use crate::transport::Transport;
use crate::validate::validate;
use anyhow::{Context, Result};
use std::sync::{Arc, Weak};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown task id")]
    UnknownTask,
    #[error("task is not in a failed state")]
    NotRetryable,
}

/// Aggregate owning all upload tasks for one form submission.
pub struct UploadSession {
    config: UploadConfig,
    registry: Arc<TaskRegistry>,
    executor: TransportExecutor,
}

impl UploadSession {
    /// Build a session over the given transport. Fails on invalid config.
    pub fn new(config: UploadConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate().context("Invalid upload configuration")?;

        let registry = Arc::new(TaskRegistry::new(config.effective_max_files()));
        let executor = TransportExecutor::new(transport, config.max_concurrent_uploads);

        tracing::debug!(
            "Created upload session (max_files={}, max_concurrent={})",
            config.effective_max_files(),
            config.max_concurrent_uploads
        );

        Ok(Self {
            config,
            registry,
            executor,
        })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Validate and enqueue a batch of files.
    ///
    /// Files failing validation enter the list already in Error with their
    /// reason code, so every supplied file produces visible feedback. The
    /// whole batch, valid and invalid alike, counts against the file limit
    /// and is rejected atomically when it does not fit. Returns the task ids
    /// in input order.
    pub fn add_files(&self, files: Vec<RawFile>) -> Result<Vec<TaskId>, AggregateLimitError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch = Vec::with_capacity(files.len());
        for raw in &files {
            let file = FileRef::from_raw(raw);
            match validate(&file, &self.config) {
                Ok(()) => batch.push(UploadTask::queued(file)),
                Err(err) => {
                    tracing::debug!("Rejected {}: {}", file.name, err);
                    batch.push(UploadTask::rejected(file, err.reason()));
                }
            }
        }

        let ids: Vec<TaskId> = batch.iter().map(|t| t.id).collect();
        let queued: Vec<(TaskId, FileRef)> = batch
            .iter()
            .filter(|t| t.status == TaskStatus::Queued)
            .map(|t| (t.id, t.file.clone()))
            .collect();

        self.registry.add_batch(batch)?;

        for (id, file) in queued {
            self.executor.spawn(self.registry.clone(), id, 0, file, false);
        }

        Ok(ids)
    }

    /// Abort any in-flight transfer and delete the task permanently.
    pub fn remove_file(&self, id: &TaskId) -> Result<(), SessionError> {
        self.executor.abort(id);
        if self.registry.remove(id) {
            Ok(())
        } else {
            Err(SessionError::UnknownTask)
        }
    }

    /// Restart a failed task: progress back to 0, retry count up by one,
    /// fresh uploading episode under the same admission control.
    pub fn retry_file(&self, id: &TaskId) -> Result<(), SessionError> {
        let (episode, file) = self.registry.reset_for_retry(id).map_err(|denied| match denied {
            RetryDenied::UnknownTask => SessionError::UnknownTask,
            RetryDenied::NotFailed => SessionError::NotRetryable,
        })?;

        tracing::debug!("Retrying {} (task {}, episode {})", file.name, id, episode);
        self.executor.spawn(self.registry.clone(), *id, episode, file, true);
        Ok(())
    }

    /// Register a snapshot callback, fired after every committed mutation.
    /// Dropping the returned handle unsubscribes.
    pub fn subscribe(
        &self,
        callback: impl Fn(&[UploadTask]) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.registry.subscribe(Box::new(callback));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Read-only copy of the task list, insertion-ordered.
    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.registry.snapshot()
    }
}

/// Active snapshot subscription. Unsubscribes on drop.
pub struct Subscription {
    registry: Weak<TaskRegistry>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}
