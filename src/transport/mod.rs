//! Transport boundary.
//!
//! The byte transfer itself lives behind this trait; the manager only drives
//! lifecycles and observes progress. Tests swap in deterministic fakes.

pub mod simulated;

use crate::common::task::FileRef;
use async_trait::async_trait;
use thiserror::Error;

pub use simulated::SimulatedTransport;

/// Mid-flight progress callback. Called with 0 < percent < 100, strictly
/// increasing within one upload.
pub type ProgressFn = Box<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network failure")]
    NetworkFailure,
    #[error("server rejected the upload: {0}")]
    ServerRejected(String),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Stable code stored in the task's error_reason.
    pub fn reason(&self) -> &'static str {
        match self {
            TransportError::NetworkFailure => "network_failure",
            TransportError::ServerRejected(_) => "server_rejected",
            TransportError::Other(_) => "transport_failure",
        }
    }
}

/// One-shot upload of a single file.
///
/// Implementations report progress through `on_progress` between awaits and
/// resolve with the terminal outcome. Abort is handled by the caller
/// dropping the future, so implementations must not hold state that needs
/// explicit cleanup across await points.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn upload(&self, file: &FileRef, on_progress: ProgressFn)
        -> Result<(), TransportError>;
}
