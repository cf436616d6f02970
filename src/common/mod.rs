pub mod config;
pub mod task;

pub use config::UploadConfig;
pub use task::{format_size, FileRef, RawFile, TaskId, TaskStatus, UploadTask};
