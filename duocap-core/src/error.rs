//! Error types for duocap

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for duocap operations
#[derive(Error, Debug)]
pub enum DuocapError {
    /// Missing configuration error
    #[error("Missing required configuration: {field}")]
    MissingConfiguration {
        /// Missing configuration field
        field: String,
    },

    /// Sync relay connection failed
    #[error("Connection to {url} failed: {reason}")]
    Connection {
        /// Relay URL the connection was opened against
        url: String,
        /// Reason for connection failure
        reason: String,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Sending on the sync channel failed
    #[error("Sync send failed: {reason}")]
    SyncSend {
        /// Reason the frame could not be transmitted
        reason: String,
    },

    /// HTTP transport error
    #[error("Transport error during {operation}: {reason}")]
    Transport {
        /// Operation that was in flight
        operation: String,
        /// Underlying transport failure
        reason: String,
    },

    /// Server answered with a non-success status
    #[error("Server rejected {operation} with status {status}")]
    ServerRejected {
        /// Operation the server rejected
        operation: String,
        /// HTTP status code returned
        status: u16,
    },

    /// Malformed or unexpected server response
    #[error("Invalid response to {operation}: {reason}")]
    InvalidResponse {
        /// Operation whose response could not be understood
        operation: String,
        /// Parse or validation failure
        reason: String,
    },

    /// Expected local file is missing
    #[error("File not found: {path}")]
    FileMissing {
        /// Path that did not exist
        path: PathBuf,
    },

    /// Local storage operation failed
    #[error("Storage error at {path}: {source}")]
    Storage {
        /// Path the operation touched
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Reconstruction did not reach a terminal state within the poll budget
    #[error("Reconstruction timed out after {attempts} status checks")]
    GenerationTimedOut {
        /// Number of status checks issued
        attempts: u32,
    },

    /// Server reported the reconstruction job as failed
    #[error("Reconstruction failed with server status {status:?}")]
    GenerationFailed {
        /// Terminal status string reported by the server
        status: String,
    },

    /// Operation cancelled by the user
    #[error("Cancelled during {operation}")]
    Cancelled {
        /// Operation that was cancelled
        operation: String,
    },

    /// Capture pipeline error
    #[error("Capture error: {reason}")]
    Capture {
        /// Underlying capture failure
        reason: String,
    },

    /// Invalid data error
    #[error("Invalid data: {reason}")]
    InvalidData {
        /// Reason for invalid data
        reason: String,
    },
}

impl DuocapError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            DuocapError::MissingConfiguration { .. } => "MISSING_CONFIGURATION",
            DuocapError::Connection { .. } => "CONNECTION_FAILED",
            DuocapError::InvalidState { .. } => "INVALID_STATE",
            DuocapError::SyncSend { .. } => "SYNC_SEND_FAILED",
            DuocapError::Transport { .. } => "TRANSPORT_ERROR",
            DuocapError::ServerRejected { .. } => "SERVER_REJECTED",
            DuocapError::InvalidResponse { .. } => "INVALID_RESPONSE",
            DuocapError::FileMissing { .. } => "FILE_MISSING",
            DuocapError::Storage { .. } => "STORAGE_ERROR",
            DuocapError::GenerationTimedOut { .. } => "GENERATION_TIMED_OUT",
            DuocapError::GenerationFailed { .. } => "GENERATION_FAILED",
            DuocapError::Cancelled { .. } => "CANCELLED",
            DuocapError::Capture { .. } => "CAPTURE_ERROR",
            DuocapError::InvalidData { .. } => "INVALID_DATA",
        }
    }

    /// Whether the flow that hit this error can be retried by the user
    /// without losing local data. Upload and download keep their source
    /// files on failure; there is no automatic retry anywhere but the
    /// bounded status-poll loop.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DuocapError::Connection { .. }
                | DuocapError::Transport { .. }
                | DuocapError::ServerRejected { .. }
                | DuocapError::GenerationTimedOut { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DuocapError::ServerRejected {
            operation: "upload".to_string(),
            status: 500,
        };
        assert_eq!(err.error_code(), "SERVER_REJECTED");
        assert!(err.is_retryable());

        let err = DuocapError::Cancelled {
            operation: "status poll".to_string(),
        };
        assert_eq!(err.error_code(), "CANCELLED");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = DuocapError::GenerationTimedOut { attempts: 120 };
        assert_eq!(
            err.to_string(),
            "Reconstruction timed out after 120 status checks"
        );
    }
}
