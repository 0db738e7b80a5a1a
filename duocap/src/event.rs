//! Event system for session events
//!
//! Everything user-visible (recording lifecycle, sync state, pipeline
//! progress) arrives on a single ordered stream so a UI layer only has to
//! drain one channel.

use duocap_core::{CameraFacing, DeviceId, FinishedRecording};
use duocap_sync::SyncCommandKind;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Session events
#[derive(Debug, Clone)]
pub enum Event {
    /// A recording started on this device
    RecordingStarted {
        /// Device the recording belongs to
        device: DeviceId,
        /// File the encoder writes to
        path: PathBuf,
    },
    /// A recording was finalized
    RecordingStopped {
        /// The finished recording, ready for upload
        recording: FinishedRecording,
    },
    /// The encoder failed and the recording was torn down
    RecordingFailed {
        /// Failure reason
        reason: String,
    },
    /// The active camera changed
    FacingChanged {
        /// New camera facing
        facing: CameraFacing,
    },
    /// The torch was switched on or off
    TorchChanged {
        /// New torch state
        enabled: bool,
    },
    /// The sync relay connection was established
    SyncConnected,
    /// The sync relay connection ended
    SyncDisconnected {
        /// Why the connection ended
        reason: String,
    },
    /// A command arrived over the sync relay
    SyncCommandReceived {
        /// The command
        command: SyncCommandKind,
        /// Device tag from the envelope, if any
        from_device: Option<String>,
    },
    /// The recording was accepted by the server and deleted locally
    UploadCompleted {
        /// Capture timestamp keying the server-side job
        timestamp_ms: i64,
    },
    /// Reconstruction progress changed
    ReconstructionProgress {
        /// Overall percentage (0-100)
        percent: u8,
        /// Human-readable phase description
        message: String,
    },
    /// The reconstruction artifact is fully written and ready for a viewer
    ArtifactReady {
        /// Local path of the downloaded mesh
        path: PathBuf,
    },
    /// The server reported the reconstruction as failed
    ReconstructionFailed {
        /// Terminal status string
        status: String,
    },
    /// The reconstruction did not finish within the poll budget
    ReconstructionTimedOut {
        /// Number of status checks issued
        attempts: u32,
    },
    /// The user cancelled the reconstruction
    ReconstructionCancelled,
    /// An error occurred in the session
    SessionError {
        /// Error description
        error: String,
        /// Whether the session can continue after this error
        recoverable: bool,
    },
}

impl Event {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::RecordingStarted { .. } => "recording_started",
            Event::RecordingStopped { .. } => "recording_stopped",
            Event::RecordingFailed { .. } => "recording_failed",
            Event::FacingChanged { .. } => "facing_changed",
            Event::TorchChanged { .. } => "torch_changed",
            Event::SyncConnected => "sync_connected",
            Event::SyncDisconnected { .. } => "sync_disconnected",
            Event::SyncCommandReceived { .. } => "sync_command_received",
            Event::UploadCompleted { .. } => "upload_completed",
            Event::ReconstructionProgress { .. } => "reconstruction_progress",
            Event::ArtifactReady { .. } => "artifact_ready",
            Event::ReconstructionFailed { .. } => "reconstruction_failed",
            Event::ReconstructionTimedOut { .. } => "reconstruction_timed_out",
            Event::ReconstructionCancelled => "reconstruction_cancelled",
            Event::SessionError { .. } => "session_error",
        }
    }

    /// Check if this is a recording-related event
    pub fn is_recording_event(&self) -> bool {
        matches!(
            self,
            Event::RecordingStarted { .. }
                | Event::RecordingStopped { .. }
                | Event::RecordingFailed { .. }
        )
    }

    /// Check if this is a sync-related event
    pub fn is_sync_event(&self) -> bool {
        matches!(
            self,
            Event::SyncConnected
                | Event::SyncDisconnected { .. }
                | Event::SyncCommandReceived { .. }
        )
    }

    /// Check if this event belongs to the upload/reconstruction flow
    pub fn is_pipeline_event(&self) -> bool {
        matches!(
            self,
            Event::UploadCompleted { .. }
                | Event::ReconstructionProgress { .. }
                | Event::ArtifactReady { .. }
                | Event::ReconstructionFailed { .. }
                | Event::ReconstructionTimedOut { .. }
                | Event::ReconstructionCancelled
        )
    }
}

/// Stream of session events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<Event>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(mpsc::error::TryRecvError::Disconnected)
            }
        }
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
