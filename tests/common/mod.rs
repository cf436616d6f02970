#![allow(dead_code)]


use async_trait::async_trait;
use docdrop::transport::ProgressFn;
use docdrop::{
    FileRef, RawFile, TaskId, TaskStatus, Transport, TransportError, UploadConfig, UploadSession,
    UploadTask,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub fn raw(name: &str, size_bytes: u64) -> RawFile {
    RawFile {
        name: name.to_string(),
        size_bytes,
    }
}

pub fn pdf(name: &str) -> RawFile {
    raw(name, 1000)
}

//===============
// Fake transport
//===============

/// Scripted per-file outcome.
#[derive(Clone)]
pub enum Plan {
    Succeed { steps: Vec<u8> },
    Fail { steps: Vec<u8>, error: TransportError },
}

impl Plan {
    pub fn succeed() -> Self {
        Plan::Succeed {
            steps: vec![25, 50, 75],
        }
    }

    pub fn fail() -> Self {
        Plan::Fail {
            steps: vec![40],
            error: TransportError::NetworkFailure,
        }
    }
}

/// Deterministic transport double.
///
/// Outcomes are scripted per file name; uploads can be parked on a gate and
/// released from the test body. Counts calls, tracks peak concurrency, and
/// records uploads whose futures were dropped before resolving.
pub struct FakeTransport {
    plans: Mutex<HashMap<String, Plan>>,
    held: Mutex<HashSet<String>>,
    release_signal: Notify,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    aborted: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(HashMap::new()),
            held: Mutex::new(HashSet::new()),
            release_signal: Notify::new(),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            aborted: Mutex::new(Vec::new()),
        })
    }

    pub fn plan(&self, name: &str, plan: Plan) {
        self.plans.lock().unwrap().insert(name.to_string(), plan);
    }

    /// Park the named file's upload after its progress steps until released.
    pub fn hold(&self, name: &str) {
        self.held.lock().unwrap().insert(name.to_string());
    }

    pub fn release(&self, name: &str) {
        self.held.lock().unwrap().remove(name);
        self.release_signal.notify_waiters();
    }

    pub fn release_all(&self) {
        self.held.lock().unwrap().clear();
        self.release_signal.notify_waiters();
    }

    /// Total upload() invocations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Uploads inside upload() right now.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest concurrent upload() count observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Names whose upload futures were dropped before resolving.
    pub fn aborted(&self) -> Vec<String> {
        self.aborted.lock().unwrap().clone()
    }

    fn is_held(&self, name: &str) -> bool {
        self.held.lock().unwrap().contains(name)
    }

    async fn wait_for_release(&self, name: &str) {
        loop {
            if !self.is_held(name) {
                return;
            }
            let released = self.release_signal.notified();
            if !self.is_held(name) {
                return;
            }
            released.await;
        }
    }
}

/// Decrements the active counter and records an abort when the upload
/// future is dropped before resolving.
struct ActiveGuard<'a> {
    transport: &'a FakeTransport,
    name: String,
    completed: bool,
}

impl<'a> ActiveGuard<'a> {
    fn enter(transport: &'a FakeTransport, name: &str) -> Self {
        let active = transport.active.fetch_add(1, Ordering::SeqCst) + 1;
        transport.peak.fetch_max(active, Ordering::SeqCst);
        Self {
            transport,
            name: name.to_string(),
            completed: false,
        }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.transport.active.fetch_sub(1, Ordering::SeqCst);
        if !self.completed {
            self.transport
                .aborted
                .lock()
                .unwrap()
                .push(self.name.clone());
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn upload(
        &self,
        file: &FileRef,
        on_progress: ProgressFn,
    ) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = ActiveGuard::enter(self, &file.name);

        let plan = self
            .plans
            .lock()
            .unwrap()
            .get(&file.name)
            .cloned()
            .unwrap_or_else(Plan::succeed);

        let (steps, result) = match plan {
            Plan::Succeed { steps } => (steps, Ok(())),
            Plan::Fail { steps, error } => (steps, Err(error)),
        };

        for step in steps {
            on_progress(step);
            tokio::task::yield_now().await;
        }

        self.wait_for_release(&file.name).await;

        guard.completed = true;
        drop(guard);
        result
    }
}

//===============
// Observation helpers
//===============

/// Subscriber recording every delivered snapshot.
#[derive(Clone)]
pub struct SnapshotCollector {
    snapshots: Arc<Mutex<Vec<Vec<UploadTask>>>>,
}

impl SnapshotCollector {
    pub fn attach(session: &UploadSession) -> (Self, docdrop::Subscription) {
        let collector = Self {
            snapshots: Arc::new(Mutex::new(Vec::new())),
        };
        let sink = collector.snapshots.clone();
        let subscription = session.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.to_vec());
        });
        (collector, subscription)
    }

    pub fn all(&self) -> Vec<Vec<UploadTask>> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    /// Progress values observed for one task, in delivery order.
    pub fn progress_for(&self, id: &TaskId) -> Vec<u8> {
        self.all()
            .iter()
            .filter_map(|snapshot| snapshot.iter().find(|t| t.id == *id))
            .map(|t| t.progress)
            .collect()
    }

    /// Status values observed for one task, deduplicated in delivery order.
    pub fn status_trace(&self, id: &TaskId) -> Vec<TaskStatus> {
        let mut trace: Vec<TaskStatus> = Vec::new();
        for snapshot in self.all() {
            if let Some(task) = snapshot.iter().find(|t| t.id == *id) {
                if trace.last() != Some(&task.status) {
                    trace.push(task.status);
                }
            }
        }
        trace
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub async fn wait_for_status(session: &UploadSession, id: &TaskId, status: TaskStatus) {
    wait_until(|| {
        session
            .snapshot()
            .iter()
            .any(|t| t.id == *id && t.status == status)
    })
    .await;
}

pub fn test_config() -> UploadConfig {
    UploadConfig::default()
}
