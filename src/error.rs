//! Error taxonomy shared across engines and the orchestrator.

use serde::{Deserialize, Serialize};

use crate::backend::BackendError;

/// Errors surfaced to callers of the orchestrator's method surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoraxError {
    NotFound { location: String },
    AlreadyExists { location: String },
    PermissionDenied { location: String, message: String },
    LockTimeout { key: String },
    ConflictDeclined { location: String },
    IntegrityMismatch { location: String },
    Cancelled { job_id: String },
    Interrupted { job_id: String },
    BackendUnsupported { operation: String },
    IoError { location: String, message: String },
}

impl std::fmt::Display for StoraxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { location } => write!(f, "not found: {}", location),
            Self::AlreadyExists { location } => write!(f, "already exists: {}", location),
            Self::PermissionDenied { location, message } => {
                write!(f, "permission denied at {}: {}", location, message)
            }
            Self::LockTimeout { key } => write!(f, "timed out acquiring lock: {}", key),
            Self::ConflictDeclined { location } => write!(f, "conflict declined at {}", location),
            Self::IntegrityMismatch { location } => write!(f, "integrity mismatch at {}", location),
            Self::Cancelled { job_id } => write!(f, "job {} cancelled", job_id),
            Self::Interrupted { job_id } => write!(f, "job {} interrupted (paused and never resumed)", job_id),
            Self::BackendUnsupported { operation } => write!(f, "backend does not support: {}", operation),
            Self::IoError { location, message } => {
                if location.is_empty() {
                    write!(f, "I/O error: {}", message)
                } else {
                    write!(f, "I/O error at {}: {}", location, message)
                }
            }
        }
    }
}

impl std::error::Error for StoraxError {}

impl From<std::io::Error> for StoraxError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { location: err.to_string() },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                location: String::new(),
                message: err.to_string(),
            },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { location: err.to_string() },
            _ => Self::IoError {
                location: String::new(),
                message: err.to_string(),
            },
        }
    }
}

impl From<BackendError> for StoraxError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(location) => Self::NotFound { location },
            BackendError::PermissionDenied(location) => Self::PermissionDenied {
                location,
                message: "permission denied".to_string(),
            },
            BackendError::AlreadyExists(location) => Self::AlreadyExists { location },
            BackendError::ConflictDeclined(location) => Self::ConflictDeclined { location },
            BackendError::NotSupported(operation) => Self::BackendUnsupported { operation },
            BackendError::IoError(message) => Self::IoError {
                location: String::new(),
                message,
            },
        }
    }
}
