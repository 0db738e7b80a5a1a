//! Finished-recording hand-off value

use crate::device::{CameraFacing, DeviceId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A finalized local recording, ready for upload.
///
/// Produced by the capture controller when a recording stops and consumed
/// by the upload/reconstruction flow. The `(device, started_at_ms)` pair
/// keys the recording on the server side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedRecording {
    /// Local path of the finalized video file
    pub path: PathBuf,
    /// Device that captured the recording
    pub device: DeviceId,
    /// Capture start time in unix milliseconds
    pub started_at_ms: i64,
    /// Camera facing the recording was captured with
    pub facing: CameraFacing,
}

impl FinishedRecording {
    /// Whether the recorded file is still present on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
