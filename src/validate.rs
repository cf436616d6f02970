//! Pre-flight file acceptance checks.
//!
//! Pure and deterministic. Rejections here never reach the transport.

use crate::common::config::UploadConfig;
use crate::common::task::FileRef;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("file exceeds the {limit_bytes} byte size limit")]
    SizeExceeded { limit_bytes: u64 },
    #[error("file type '{extension}' is not accepted")]
    InvalidType { extension: String },
}

impl ValidationError {
    /// Stable code stored in the task's error_reason and mapped to
    /// user-facing text by the embedding UI.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::SizeExceeded { .. } => "size_exceeded",
            ValidationError::InvalidType { .. } => "invalid_type",
        }
    }
}

/// Accept or reject a file against the session config.
///
/// A file of exactly `max_file_size_bytes` is accepted. Extension matching
/// is case-insensitive; a name without an extension is rejected.
pub fn validate(file: &FileRef, config: &UploadConfig) -> Result<(), ValidationError> {
    if file.size_bytes > config.max_file_size_bytes {
        return Err(ValidationError::SizeExceeded {
            limit_bytes: config.max_file_size_bytes,
        });
    }

    if !config.accepts_extension(&file.extension) {
        return Err(ValidationError::InvalidType {
            extension: file.extension.clone(),
        });
    }

    Ok(())
}
