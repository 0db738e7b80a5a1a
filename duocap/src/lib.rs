//! # duocap - Two-Device Synchronized Capture Client
//!
//! duocap is the client side of a paired-camera 3D reconstruction setup:
//! two devices record video, optionally mirroring start/stop over a
//! WebSocket relay, then each uploads its recording to a processing server,
//! polls for the asynchronously generated mesh, and downloads the GLB
//! artifact for an external viewer.
//!
//! ## Key Pieces
//!
//! - **Capture control**: single-active-session recording through a
//!   pluggable recorder backend
//! - **Sync channel**: JSON command envelopes over a relay WebSocket, so a
//!   button press on either device drives both
//! - **Processing pipeline**: multipart upload, bounded status polling,
//!   streamed artifact download
//! - **One event stream**: every user-visible state change on a single
//!   ordered channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duocap::{CaptureSession, DeviceId, MockRecorder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (recorder, _control) = MockRecorder::new();
//!     let session = CaptureSession::builder("http://172.21.1.123:7777")
//!         .device(DeviceId::Left)
//!         .recorder(Box::new(recorder))
//!         .build()?;
//!
//!     // Mirror start/stop with the paired device
//!     session.enable_sync().await?;
//!
//!     // Record, then run the recording through the server pipeline
//!     session.record_button().await?;
//!     // ... some time later ...
//!     session.record_button().await?;
//!
//!     let mut events = session.events();
//!     while let Some(event) = events.next().await {
//!         println!("Session event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use duocap_core::{
    CameraFacing, DeviceId, DuocapError, FinishedRecording, MediaStore, PollPolicy, TransferPolicy,
};

pub use duocap_capture::{
    CaptureController, CaptureError, CaptureEvent, MockRecorder, MockRecorderControl,
    RecorderBackend, RecordingHandle,
};

pub use duocap_sync::{SyncChannel, SyncCommand, SyncCommandKind, SyncEvent, SyncState};

pub use duocap_pipeline::{
    MapStatus, ReconstructionClient, ReconstructionEvent, ReconstructionOutcome, UploadClient,
};

// Public API modules
pub mod config;
pub mod event;
pub mod session;

// Re-export main API types
pub use config::SessionConfig;
pub use event::{Event, EventStream};
pub use session::{CaptureSession, SessionBuilder};
