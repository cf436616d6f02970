//! Single-writer task registry.
//!
//! Owns the ordered task list for one session. All mutations, including the
//! ones requested by the executor, commit through this module and emit
//! exactly one snapshot notification per committed change. Stale reports
//! from finished episodes are discarded here, so a removed or retried task
//! can never be written into by a late transport callback.

use crate::common::task::{FileRef, TaskId, TaskStatus, UploadTask};
use crate::transport::TransportError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("adding {attempted} file(s) would exceed the {max_files} file limit")]
pub struct AggregateLimitError {
    pub max_files: usize,
    pub attempted: usize,
}

impl AggregateLimitError {
    pub fn reason(&self) -> &'static str {
        "max_files_exceeded"
    }
}

/// Why a retry request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDenied {
    UnknownTask,
    NotFailed,
}

type SubscriberFn = Box<dyn Fn(&[UploadTask]) + Send + Sync>;

pub struct TaskRegistry {
    tasks: RwLock<Vec<UploadTask>>,
    max_files: usize,
    subscribers: RwLock<Vec<(u64, SubscriberFn)>>,
    next_subscriber: AtomicU64,
    /// Serializes each commit+notify span so snapshots reach subscribers in
    /// commit order even when executors race. Subscriber callbacks must not
    /// mutate the registry; defer through a channel instead.
    ops: Mutex<()>,
}

impl TaskRegistry {
    pub fn new(max_files: usize) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            max_files,
            subscribers: RwLock::new(Vec::new()),
            next_subscriber: AtomicU64::new(0),
            ops: Mutex::new(()),
        }
    }

    //-- Reads

    /// Read-only copy of the task list, insertion-ordered.
    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.read_tasks().clone()
    }

    pub fn get(&self, id: &TaskId) -> Option<UploadTask> {
        self.read_tasks().iter().find(|t| t.id == *id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_tasks().is_empty()
    }

    //-- Mutations

    /// Insert a batch atomically. No task is added when the batch would push
    /// the list past `max_files`.
    pub fn add_batch(&self, batch: Vec<UploadTask>) -> Result<(), AggregateLimitError> {
        if batch.is_empty() {
            return Ok(());
        }

        let _op = self.lock_ops();
        let snapshot = {
            let mut tasks = self.write_tasks();
            if tasks.len() + batch.len() > self.max_files {
                return Err(AggregateLimitError {
                    max_files: self.max_files,
                    attempted: batch.len(),
                });
            }
            tasks.extend(batch);
            tasks.clone()
        };

        self.notify(&snapshot);
        Ok(())
    }

    /// Queued -> Uploading once the executor holds a permit.
    /// Returns false when the task was removed while waiting.
    pub fn begin_upload(&self, id: &TaskId, episode: u64) -> bool {
        self.update(id, |task| {
            if task.episode != episode || task.status != TaskStatus::Queued {
                return false;
            }
            task.status = TaskStatus::Uploading;
            task.progress = 0;
            true
        })
    }

    /// Record a mid-flight progress value.
    ///
    /// Non-increasing values and reports from stale episodes commit nothing.
    /// Values are capped at 99; 100 is reserved for a successful finish.
    pub fn record_progress(&self, id: &TaskId, episode: u64, percent: u8) {
        let percent = percent.min(99);
        self.update(id, |task| {
            if task.episode != episode
                || task.status != TaskStatus::Uploading
                || percent <= task.progress
            {
                return false;
            }
            task.progress = percent;
            true
        });
    }

    /// Terminal transition for one episode.
    ///
    /// A stale episode or a task no longer Uploading (removed, retried) is
    /// ignored, keeping terminal states immutable.
    pub fn finish(&self, id: &TaskId, episode: u64, result: Result<(), TransportError>) {
        let committed = self.update(id, |task| {
            if task.episode != episode || task.status != TaskStatus::Uploading {
                return false;
            }
            match &result {
                Ok(()) => {
                    task.status = TaskStatus::Success;
                    task.progress = 100;
                    task.error_reason = None;
                }
                Err(err) => {
                    task.status = TaskStatus::Error;
                    task.error_reason = Some(err.reason().to_string());
                }
            }
            true
        });

        if !committed {
            tracing::debug!("Discarded stale completion for task {}", id);
        }
    }

    /// Error -> Uploading with a fresh episode. Returns the new episode and
    /// the file to re-upload.
    pub(crate) fn reset_for_retry(&self, id: &TaskId) -> Result<(u64, FileRef), RetryDenied> {
        let mut outcome = Err(RetryDenied::UnknownTask);
        self.update(id, |task| {
            if task.status != TaskStatus::Error {
                outcome = Err(RetryDenied::NotFailed);
                return false;
            }
            task.status = TaskStatus::Uploading;
            task.progress = 0;
            task.error_reason = None;
            task.retry_count += 1;
            task.episode += 1;
            outcome = Ok((task.episode, task.file.clone()));
            true
        });
        outcome
    }

    /// Delete a task permanently. The id never reappears in a snapshot.
    pub fn remove(&self, id: &TaskId) -> bool {
        let _op = self.lock_ops();
        let (removed, snapshot) = {
            let mut tasks = self.write_tasks();
            let Some(index) = tasks.iter().position(|t| t.id == *id) else {
                return false;
            };
            let mut removed = tasks.remove(index);
            removed.status = TaskStatus::Removed;
            (removed, tasks.clone())
        };

        tracing::debug!("Removed task {} ({})", removed.id, removed.file.name);
        self.notify(&snapshot);
        true
    }

    //-- Subscriptions

    /// Register a snapshot callback. Fired once per committed mutation,
    /// after the state lock is released.
    pub fn subscribe(&self, callback: SubscriberFn) -> u64 {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.write_subscribers().push((id, callback));
        id
    }

    pub fn unsubscribe(&self, subscriber: u64) {
        self.write_subscribers().retain(|(id, _)| *id != subscriber);
    }

    //-- Internals

    /// Single mutation entry point: applies `mutation` to the matching task
    /// and notifies iff it reports a committed change.
    fn update(&self, id: &TaskId, mutation: impl FnOnce(&mut UploadTask) -> bool) -> bool {
        let _op = self.lock_ops();
        let snapshot = {
            let mut tasks = self.write_tasks();
            let Some(task) = tasks.iter_mut().find(|t| t.id == *id) else {
                return false;
            };
            if !mutation(task) {
                return false;
            }
            tasks.clone()
        };

        self.notify(&snapshot);
        true
    }

    fn notify(&self, snapshot: &[UploadTask]) {
        let subscribers = self.read_subscribers();
        for (_, callback) in subscribers.iter() {
            callback(snapshot);
        }
    }

    fn lock_ops(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.ops.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Operation lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn read_tasks(&self) -> std::sync::RwLockReadGuard<'_, Vec<UploadTask>> {
        match self.tasks.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Task list lock poisoned during read, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_tasks(&self) -> std::sync::RwLockWriteGuard<'_, Vec<UploadTask>> {
        match self.tasks.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Task list lock poisoned during write, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn read_subscribers(&self) -> std::sync::RwLockReadGuard<'_, Vec<(u64, SubscriberFn)>> {
        match self.subscribers.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Subscriber list lock poisoned during read, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_subscribers(&self) -> std::sync::RwLockWriteGuard<'_, Vec<(u64, SubscriberFn)>> {
        match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Subscriber list lock poisoned during write, recovering");
                poisoned.into_inner()
            }
        }
    }
}
