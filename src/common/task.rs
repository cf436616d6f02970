//! Upload task model and per-task status shared by registry, executor and UI
//! snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Raw file descriptor handed over by the file-picker collaborator.
/// The only accepted input shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFile {
    pub name: String,
    pub size_bytes: u64,
}

/// Immutable metadata snapshot of a source file, taken at task creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub size_bytes: u64,
    /// Lowercased, dot-prefixed. Empty when the name has no extension.
    pub extension: String,
}

impl FileRef {
    pub fn from_raw(raw: &RawFile) -> Self {
        Self {
            name: raw.name.clone(),
            size_bytes: raw.size_bytes,
            extension: extract_extension(&raw.name),
        }
    }
}

/// Extension including the leading dot, lowercased.
/// "report.PDF" -> ".pdf", "archive.tar.gz" -> ".gz", "README" -> "".
fn extract_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_lowercase())
        }
        _ => String::new(),
    }
}

/// Human-readable file size for display lists.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Opaque task identifier, unique within a session for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a single upload task.
///
/// Queued -> Uploading -> Success | Error, with Error -> Uploading on retry.
/// Removed marks a task deleted by the caller; removed tasks never appear in
/// snapshots again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Queued,
    Uploading,
    Success,
    Error,
    Removed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Error)
    }
}

/// One file's upload lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    pub id: TaskId,
    pub file: FileRef,
    pub status: TaskStatus,
    /// 0-100. Meaningful while Uploading and on Success (always 100 there).
    pub progress: u8,
    /// Stable snake_case reason code, present iff status == Error.
    pub error_reason: Option<String>,
    /// Incremented once per user-triggered retry.
    pub retry_count: u32,
    /// Bumped when a new uploading episode starts. Stale reports from an
    /// earlier episode are discarded by the registry.
    #[serde(skip)]
    pub(crate) episode: u64,
}

impl UploadTask {
    pub(crate) fn queued(file: FileRef) -> Self {
        Self {
            id: TaskId::generate(),
            file,
            status: TaskStatus::Queued,
            progress: 0,
            error_reason: None,
            retry_count: 0,
            episode: 0,
        }
    }

    /// A task rejected by validation enters the list already failed, so the
    /// user sees feedback for every file they supplied.
    pub(crate) fn rejected(file: FileRef, reason: &str) -> Self {
        Self {
            id: TaskId::generate(),
            file,
            status: TaskStatus::Error,
            progress: 0,
            error_reason: Some(reason.to_string()),
            retry_count: 0,
            episode: 0,
        }
    }
}
