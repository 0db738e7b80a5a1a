//! Recorder backend abstraction
//!
//! The platform camera/encoder stack sits behind [`RecorderBackend`]. The
//! controller drives it with start/stop and observes asynchronous encoder
//! completion through a [`RecordingHandle`] instead of platform callbacks.

use crate::error::CaptureError;
use async_trait::async_trait;
use duocap_core::CameraFacing;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Completion handle for one in-flight recording.
///
/// Resolves with `Ok(())` when the encoder finalizes the file (the normal
/// stop path) and with `Err` if the encoder fails mid-recording.
#[derive(Debug)]
pub struct RecordingHandle {
    rx: oneshot::Receiver<Result<(), CaptureError>>,
}

impl RecordingHandle {
    /// Create a completion channel; the backend keeps the sender and
    /// resolves it when encoding ends.
    pub fn channel() -> (oneshot::Sender<Result<(), CaptureError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Wait for the recording to finalize or fail
    pub async fn finished(self) -> Result<(), CaptureError> {
        match self.rx.await {
            Ok(result) => result,
            // Sender dropped without resolving: the recorder went away
            // underneath an active recording.
            Err(_) => Err(CaptureError::EncoderFault {
                reason: "recorder went away".to_string(),
            }),
        }
    }
}

/// Platform recorder backend.
///
/// Implementations own the camera pipeline and encoder. `start` must return
/// promptly once encoding has begun; completion and encoder faults are
/// reported through the returned [`RecordingHandle`].
#[async_trait]
pub trait RecorderBackend: Send {
    /// Begin encoding to `path`
    async fn start(&mut self, path: &Path) -> Result<RecordingHandle, CaptureError>;

    /// Stop encoding and finalize the output file
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Select which camera subsequent recordings use
    fn set_facing(&mut self, facing: CameraFacing) -> Result<(), CaptureError>;

    /// Switch the torch/flash on or off
    fn set_torch(&mut self, enabled: bool) -> Result<(), CaptureError>;
}

#[derive(Debug, Default)]
struct MockState {
    active: Option<oneshot::Sender<Result<(), CaptureError>>>,
    started_paths: Vec<PathBuf>,
    stop_count: u32,
    facing: Option<CameraFacing>,
    torch: bool,
    fail_next_start: bool,
}

/// Scripted recorder backend for tests and demos.
///
/// Creates an empty file on `start` so the stop path observes a real output
/// file, and exposes a [`MockRecorderControl`] for fault injection and
/// assertions.
#[derive(Debug)]
pub struct MockRecorder {
    state: Arc<Mutex<MockState>>,
}

impl MockRecorder {
    /// Create a mock recorder and its control handle
    pub fn new() -> (Self, MockRecorderControl) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockRecorderControl { state },
        )
    }
}

#[async_trait]
impl RecorderBackend for MockRecorder {
    async fn start(&mut self, path: &Path) -> Result<RecordingHandle, CaptureError> {
        let mut state = self.state.lock();
        if state.fail_next_start {
            state.fail_next_start = false;
            return Err(CaptureError::Backend {
                reason: "scripted start failure".to_string(),
            });
        }
        std::fs::File::create(path)?;
        let (tx, handle) = RecordingHandle::channel();
        state.active = Some(tx);
        state.started_paths.push(path.to_path_buf());
        debug!("mock recorder started: {}", path.display());
        Ok(handle)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        match state.active.take() {
            Some(tx) => {
                let _ = tx.send(Ok(()));
                state.stop_count += 1;
                Ok(())
            }
            None => Err(CaptureError::Backend {
                reason: "stop without active recording".to_string(),
            }),
        }
    }

    fn set_facing(&mut self, facing: CameraFacing) -> Result<(), CaptureError> {
        self.state.lock().facing = Some(facing);
        Ok(())
    }

    fn set_torch(&mut self, enabled: bool) -> Result<(), CaptureError> {
        self.state.lock().torch = enabled;
        Ok(())
    }
}

/// Control and inspection handle for a [`MockRecorder`]
#[derive(Debug, Clone)]
pub struct MockRecorderControl {
    state: Arc<Mutex<MockState>>,
}

impl MockRecorderControl {
    /// Simulate an encoder fault on the in-flight recording; returns false
    /// if nothing is recording
    pub fn inject_fault(&self, reason: &str) -> bool {
        match self.state.lock().active.take() {
            Some(tx) => tx
                .send(Err(CaptureError::EncoderFault {
                    reason: reason.to_string(),
                }))
                .is_ok(),
            None => false,
        }
    }

    /// Make the next `start` call fail
    pub fn fail_next_start(&self) {
        self.state.lock().fail_next_start = true;
    }

    /// Number of recordings started so far
    pub fn start_count(&self) -> usize {
        self.state.lock().started_paths.len()
    }

    /// Number of recordings stopped so far
    pub fn stop_count(&self) -> u32 {
        self.state.lock().stop_count
    }

    /// Whether the mock currently has an in-flight recording
    pub fn is_recording(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Facing most recently selected on the backend
    pub fn facing(&self) -> Option<CameraFacing> {
        self.state.lock().facing
    }

    /// Current torch state
    pub fn torch(&self) -> bool {
        self.state.lock().torch
    }
}
