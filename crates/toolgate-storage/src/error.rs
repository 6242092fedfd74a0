use std::path::PathBuf;

use thiserror::Error;

/// Storage-specific error types for the toolgate kiosk.
///
/// These cover the append-only event log, the handoff mailbox shared by
/// stage processes, and the remote GELF sink.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File system operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV log could not be written or read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No handoff file was waiting
    #[error("No handoff file at {}", path.display())]
    HandoffMissing { path: PathBuf },

    /// Handoff file was present but unreadable
    #[error("Corrupt handoff file {}: {message}", path.display())]
    HandoffCorrupt { path: PathBuf, message: String },

    /// Remote log endpoint could not be resolved
    #[error("Remote log endpoint {endpoint} unavailable: {message}")]
    RemoteSink { endpoint: String, message: String },
}

impl StorageError {
    pub fn handoff_corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::HandoffCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn remote_sink(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteSink {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for toolgate_core::Error {
    fn from(e: StorageError) -> Self {
        toolgate_core::Error::Persistence(e.to_string())
    }
}
