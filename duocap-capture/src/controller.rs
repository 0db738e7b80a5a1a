//! Capture controller
//!
//! Owns the recorder backend and the single active recording session.
//! Start requests while a session is active and stop requests while idle
//! are logged no-ops, so no interleaving of calls can produce a second
//! concurrent session.

use crate::backend::RecorderBackend;
use crate::error::CaptureError;
use chrono::Local;
use duocap_core::{CameraFacing, DeviceId, FinishedRecording, MediaStore};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capture lifecycle events
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A recording started
    Started {
        /// Device the recording belongs to
        device: DeviceId,
        /// File the encoder writes to
        path: PathBuf,
        /// Capture start time in unix milliseconds
        started_at_ms: i64,
    },
    /// A recording was finalized
    Stopped {
        /// The finished recording, ready for upload
        recording: FinishedRecording,
    },
    /// The encoder failed mid-recording; the session was torn down
    EncoderFailed {
        /// Device the recording belonged to
        device: DeviceId,
        /// Failure reason reported by the encoder
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
}

struct ActiveSession {
    path: PathBuf,
    started_at_ms: i64,
    started: Instant,
    facing: CameraFacing,
    watcher: Option<tokio::task::JoinHandle<()>>,
}

/// Controls recording on one capture device.
///
/// All mutation runs under the backend lock, so concurrent calls serialize
/// into sequential turns and the single-session invariant holds under any
/// interleaving of local button presses and peer sync commands.
pub struct CaptureController {
    device: DeviceId,
    store: MediaStore,
    backend: tokio::sync::Mutex<Box<dyn RecorderBackend>>,
    session: Arc<Mutex<Option<ActiveSession>>>,
    facing: Mutex<CameraFacing>,
    torch: Mutex<bool>,
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl std::fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureController")
            .field("device", &self.device)
            .field("recording", &self.is_recording())
            .finish()
    }
}

impl CaptureController {
    /// Create a controller for `device` recording through `backend`
    pub fn new(device: DeviceId, store: MediaStore, backend: Box<dyn RecorderBackend>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            device,
            store,
            backend: tokio::sync::Mutex::new(backend),
            session: Arc::new(Mutex::new(None)),
            facing: Mutex::new(CameraFacing::default()),
            torch: Mutex::new(false),
            event_tx,
        }
    }

    /// Subscribe to capture events
    pub fn events(&self) -> broadcast::Receiver<CaptureEvent> {
        self.event_tx.subscribe()
    }

    /// Device this controller records for
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Whether a recording is currently active
    pub fn is_recording(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Elapsed time of the active recording, if any
    pub fn elapsed(&self) -> Option<Duration> {
        self.session.lock().as_ref().map(|s| s.started.elapsed())
    }

    /// Camera the next recording will use
    pub fn facing(&self) -> CameraFacing {
        *self.facing.lock()
    }

    /// Current torch state
    pub fn torch_enabled(&self) -> bool {
        *self.torch.lock()
    }

    /// Start a new recording.
    ///
    /// Returns `Ok(false)` without touching the backend when a recording is
    /// already active. On success the output path is derived from the
    /// device identity and the current wall clock.
    pub async fn start(&self) -> Result<bool, CaptureError> {
        let mut backend = self.backend.lock().await;
        if self.session.lock().is_some() {
            warn!("[{}] start requested while already recording", self.device);
            return Ok(false);
        }

        self.store.ensure_root()?;
        let now = Local::now();
        let started_at_ms = now.timestamp_millis();
        let path = self.store.video_path(self.device, now);

        let handle = backend.start(&path).await?;
        let facing = *self.facing.lock();
        *self.session.lock() = Some(ActiveSession {
            path: path.clone(),
            started_at_ms,
            started: Instant::now(),
            facing,
            watcher: None,
        });

        // Tear the session down if the encoder fails before stop() runs.
        let session = Arc::clone(&self.session);
        let event_tx = self.event_tx.clone();
        let device = self.device;
        let watched_path = path.clone();
        let watcher = tokio::spawn(async move {
            if let Err(err) = handle.finished().await {
                let torn_down = {
                    let mut guard = session.lock();
                    match guard.as_ref() {
                        Some(active) if active.path == watched_path => {
                            *guard = None;
                            true
                        }
                        _ => false,
                    }
                };
                if torn_down {
                    warn!("[{}] encoder fault: {}", device, err);
                    let _ = event_tx.send(CaptureEvent::EncoderFailed {
                        device,
                        reason: err.to_string(),
                    });
                }
            }
        });
        if let Some(active) = self.session.lock().as_mut() {
            active.watcher = Some(watcher);
        }

        info!("[{}] recording started: {}", self.device, path.display());
        let _ = self.event_tx.send(CaptureEvent::Started {
            device: self.device,
            path,
            started_at_ms,
        });
        Ok(true)
    }

    /// Stop the active recording and finalize its file.
    ///
    /// Returns `Ok(None)` when no recording is active. On success the
    /// finished recording is returned and also emitted as
    /// [`CaptureEvent::Stopped`].
    pub async fn stop(&self) -> Result<Option<FinishedRecording>, CaptureError> {
        let mut backend = self.backend.lock().await;
        let taken = self.session.lock().take();
        let active = match taken {
            Some(active) => active,
            None => {
                warn!("[{}] stop requested while not recording", self.device);
                return Ok(None);
            }
        };
        if let Some(watcher) = active.watcher {
            watcher.abort();
        }

        backend.stop().await?;

        if !active.path.exists() {
            return Err(CaptureError::OutputMissing { path: active.path });
        }
        let recording = FinishedRecording {
            path: active.path,
            device: self.device,
            started_at_ms: active.started_at_ms,
            facing: active.facing,
        };
        info!(
            "[{}] recording stopped: {}",
            self.device,
            recording.path.display()
        );
        let _ = self.event_tx.send(CaptureEvent::Stopped {
            recording: recording.clone(),
        });
        Ok(Some(recording))
    }

    /// Switch between the back and front camera.
    ///
    /// Rejected while a recording is active; the encoder cannot change its
    /// input mid-file.
    pub async fn switch_facing(&self) -> Result<CameraFacing, CaptureError> {
        let mut backend = self.backend.lock().await;
        if self.session.lock().is_some() {
            return Err(CaptureError::SessionActive {
                operation: "switch camera".to_string(),
            });
        }
        let next = self.facing.lock().toggled();
        backend.set_facing(next)?;
        *self.facing.lock() = next;
        debug!("[{}] camera facing now {}", self.device, next);
        let _ = self
            .event_tx
            .send(CaptureEvent::FacingChanged { facing: next });
        Ok(next)
    }

    /// Toggle the torch; allowed at any time
    pub async fn toggle_torch(&self) -> Result<bool, CaptureError> {
        let mut backend = self.backend.lock().await;
        let enabled = !*self.torch.lock();
        backend.set_torch(enabled)?;
        *self.torch.lock() = enabled;
        debug!("[{}] torch {}", self.device, if enabled { "on" } else { "off" });
        let _ = self.event_tx.send(CaptureEvent::TorchChanged { enabled });
        Ok(enabled)
    }

    /// Delete a finished recording the user chose to discard
    pub async fn discard(&self, recording: &FinishedRecording) -> Result<(), CaptureError> {
        tokio::fs::remove_file(&recording.path).await?;
        info!("recording discarded: {}", recording.path.display());
        Ok(())
    }
}
