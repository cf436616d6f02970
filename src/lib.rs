pub mod common;
pub mod executor;
pub mod registry;
pub mod session;
pub mod transport;
pub mod validate;

pub use common::config::UploadConfig;
pub use common::task::{FileRef, RawFile, TaskId, TaskStatus, UploadTask};
pub use registry::AggregateLimitError;
pub use session::{SessionError, Subscription, UploadSession};
pub use transport::{Transport, TransportError};
pub use validate::ValidationError;
