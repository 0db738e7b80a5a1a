//! Capture error types

use duocap_core::DuocapError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for capture operations
#[derive(Error, Debug)]
pub enum CaptureError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Recorder backend refused or failed an operation
    #[error("Recorder backend error: {reason}")]
    Backend {
        /// Failure reason reported by the backend
        reason: String,
    },

    /// The encoder failed while a recording was in flight
    #[error("Encoder fault: {reason}")]
    EncoderFault {
        /// Failure reason reported by the encoder
        reason: String,
    },

    /// Operation is not allowed while a recording is active
    #[error("Cannot {operation} while recording")]
    SessionActive {
        /// Operation that was rejected
        operation: String,
    },

    /// The finalized recording file is missing on disk
    #[error("Recorded file missing: {path}")]
    OutputMissing {
        /// Expected path of the finalized file
        path: PathBuf,
    },
}

impl From<CaptureError> for DuocapError {
    fn from(err: CaptureError) -> Self {
        DuocapError::Capture {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err = CaptureError::SessionActive {
            operation: "switch camera".to_string(),
        };
        let core: DuocapError = err.into();
        assert_eq!(core.error_code(), "CAPTURE_ERROR");
        assert!(core.to_string().contains("switch camera"));
    }
}
