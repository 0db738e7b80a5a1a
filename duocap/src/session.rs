//! Capture session orchestration
//!
//! Wires the capture controller, sync channel, and processing pipeline
//! together behind one owned object. All component events funnel into a
//! single [`EventStream`], and relay commands drive the controller exactly
//! like local button presses.

use crate::config::SessionConfig;
use crate::event::{Event, EventStream};
use duocap_capture::{CaptureController, CaptureEvent, RecorderBackend};
use duocap_core::{
    CameraFacing, DeviceId, DuocapError, FinishedRecording, MediaStore, PollPolicy, TransferPolicy,
};
use duocap_pipeline::{
    ReconstructionClient, ReconstructionEvent, ReconstructionOutcome, UploadClient,
};
use duocap_sync::{SyncChannel, SyncCommandKind, SyncEvent, SyncState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fluent builder for a capture session
pub struct SessionBuilder {
    config: SessionConfig,
    device: Option<DeviceId>,
    recorder: Option<Box<dyn RecorderBackend>>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("server_url", &self.config.server_url)
            .field("device", &self.device)
            .finish()
    }
}

impl SessionBuilder {
    /// Start building a session against the given server
    pub fn new(server_url: &str) -> Self {
        Self {
            config: SessionConfig::new(server_url),
            device: None,
            recorder: None,
        }
    }

    /// Set the device identity (required)
    pub fn device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set the recorder backend (required)
    pub fn recorder(mut self, backend: Box<dyn RecorderBackend>) -> Self {
        self.recorder = Some(backend);
        self
    }

    /// Override the media store location
    pub fn store(mut self, store: MediaStore) -> Self {
        self.config.store = store;
        self
    }

    /// Override the status-poll policy
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.config.poll = policy;
        self
    }

    /// Override the transfer timeouts
    pub fn transfer_policy(mut self, policy: TransferPolicy) -> Self {
        self.config.transfer = policy;
        self
    }

    /// Build the session. Must be called within a tokio runtime; the
    /// session spawns its event-forwarding tasks immediately.
    pub fn build(self) -> Result<CaptureSession, DuocapError> {
        let device = self.device.ok_or_else(|| DuocapError::MissingConfiguration {
            field: "device".to_string(),
        })?;
        let recorder = self
            .recorder
            .ok_or_else(|| DuocapError::MissingConfiguration {
                field: "recorder".to_string(),
            })?;
        CaptureSession::assemble(device, recorder, self.config)
    }
}

/// One device's capture session: recording control, the optional sync
/// channel, and the upload/reconstruction flow.
///
/// Component state is mutated only from sequential async turns (button
/// calls and the event-forwarding tasks), so a relay command racing a local
/// press resolves through the controller's own idempotence rules rather
/// than any cross-flow lock.
pub struct CaptureSession {
    device: DeviceId,
    config: SessionConfig,
    capture: Arc<CaptureController>,
    sync: Arc<SyncChannel>,
    upload: UploadClient,
    reconstruction: Arc<ReconstructionClient>,
    event_tx: mpsc::UnboundedSender<Event>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    processing_cancel: Mutex<CancellationToken>,
    forwarders: Vec<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("device", &self.device)
            .field("recording", &self.is_recording())
            .field("sync", &self.sync_state())
            .finish()
    }
}

impl CaptureSession {
    /// Start building a session
    pub fn builder(server_url: &str) -> SessionBuilder {
        SessionBuilder::new(server_url)
    }

    fn assemble(
        device: DeviceId,
        recorder: Box<dyn RecorderBackend>,
        config: SessionConfig,
    ) -> Result<Self, DuocapError> {
        let capture = Arc::new(CaptureController::new(
            device,
            config.store.clone(),
            recorder,
        ));
        let sync = Arc::new(SyncChannel::new(device));
        let upload = UploadClient::new(&config.server_url, config.transfer)?;
        let reconstruction = Arc::new(ReconstructionClient::new(
            &config.server_url,
            config.store.clone(),
            config.poll,
            config.transfer,
        )?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut forwarders = Vec::new();
        forwarders.push(Self::forward_capture_events(
            capture.events(),
            event_tx.clone(),
        ));
        forwarders.push(Self::forward_sync_events(
            sync.events(),
            Arc::clone(&capture),
            event_tx.clone(),
        ));
        forwarders.push(Self::forward_reconstruction_events(
            reconstruction.events(),
            event_tx.clone(),
        ));

        info!("[{}] capture session ready ({})", device, config.server_url);
        Ok(Self {
            device,
            config,
            capture,
            sync,
            upload,
            reconstruction,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            processing_cancel: Mutex::new(CancellationToken::new()),
            forwarders,
        })
    }

    fn forward_capture_events(
        mut rx: broadcast::Receiver<CaptureEvent>,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let mapped = match event {
                    CaptureEvent::Started { device, path, .. } => {
                        Event::RecordingStarted { device, path }
                    }
                    CaptureEvent::Stopped { recording } => Event::RecordingStopped { recording },
                    CaptureEvent::EncoderFailed { reason, .. } => {
                        Event::RecordingFailed { reason }
                    }
                    CaptureEvent::FacingChanged { facing } => Event::FacingChanged { facing },
                    CaptureEvent::TorchChanged { enabled } => Event::TorchChanged { enabled },
                };
                if event_tx.send(mapped).is_err() {
                    break;
                }
            }
        })
    }

    fn forward_sync_events(
        mut rx: broadcast::Receiver<SyncEvent>,
        capture: Arc<CaptureController>,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                match event {
                    SyncEvent::Connected => {
                        if event_tx.send(Event::SyncConnected).is_err() {
                            break;
                        }
                    }
                    SyncEvent::Disconnected { reason } => {
                        if event_tx.send(Event::SyncDisconnected { reason }).is_err() {
                            break;
                        }
                    }
                    SyncEvent::CommandReceived {
                        command,
                        from_device,
                        ..
                    } => {
                        let _ = event_tx.send(Event::SyncCommandReceived {
                            command,
                            from_device,
                        });
                        Self::apply_command(&capture, &event_tx, command).await;
                    }
                }
            }
        })
    }

    fn forward_reconstruction_events(
        mut rx: broadcast::Receiver<ReconstructionEvent>,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ReconstructionEvent::Progress { percent, message }) => {
                        if event_tx
                            .send(Event::ReconstructionProgress { percent, message })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Apply a relay command to the controller with the same idempotence as
    /// a local button press: start while recording and stop while idle are
    /// no-ops.
    async fn apply_command(
        capture: &CaptureController,
        event_tx: &mpsc::UnboundedSender<Event>,
        command: SyncCommandKind,
    ) {
        let result = match command {
            SyncCommandKind::StartRecording => capture.start().await.map(|_| ()),
            SyncCommandKind::StopRecording => capture.stop().await.map(|_| ()),
        };
        if let Err(err) = result {
            warn!("peer command {} failed: {}", command.as_str(), err);
            let _ = event_tx.send(Event::SessionError {
                error: err.to_string(),
                recoverable: true,
            });
        }
    }

    /// Take the session event stream.
    ///
    /// The stream can be taken once; subsequent calls return a stream that
    /// yields nothing.
    pub fn events(&self) -> EventStream {
        match self.event_rx.lock().take() {
            Some(rx) => EventStream::new(rx),
            None => {
                let (_tx, rx) = mpsc::unbounded_channel();
                EventStream::new(rx)
            }
        }
    }

    /// Device identity of this session
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a recording is currently active
    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    /// Elapsed time of the active recording, if any
    pub fn recording_elapsed(&self) -> Option<Duration> {
        self.capture.elapsed()
    }

    /// The record button: in sync mode the command goes to the relay so
    /// both devices act on the echoed envelope; otherwise the controller
    /// acts immediately.
    pub async fn record_button(&self) -> Result<(), DuocapError> {
        let command = if self.is_recording() {
            SyncCommandKind::StopRecording
        } else {
            SyncCommandKind::StartRecording
        };
        if self.sync.is_connected() {
            self.sync.send(command).await
        } else {
            Self::apply_command(&self.capture, &self.event_tx, command).await;
            Ok(())
        }
    }

    /// Start recording locally, bypassing the relay. Returns false when a
    /// recording was already active.
    pub async fn start_recording(&self) -> Result<bool, DuocapError> {
        Ok(self.capture.start().await?)
    }

    /// Stop the active recording locally, bypassing the relay
    pub async fn stop_recording(&self) -> Result<Option<FinishedRecording>, DuocapError> {
        Ok(self.capture.stop().await?)
    }

    /// Apply a relay command as if it had just arrived; start while
    /// recording and stop while idle are no-ops
    pub async fn apply_peer_command(&self, command: SyncCommandKind) {
        Self::apply_command(&self.capture, &self.event_tx, command).await;
    }

    /// Switch between back and front camera; rejected while recording
    pub async fn switch_facing(&self) -> Result<CameraFacing, DuocapError> {
        Ok(self.capture.switch_facing().await?)
    }

    /// Toggle the torch
    pub async fn toggle_torch(&self) -> Result<bool, DuocapError> {
        Ok(self.capture.toggle_torch().await?)
    }

    /// Delete a finished recording the user rejected
    pub async fn discard_recording(&self, recording: &FinishedRecording) -> Result<(), DuocapError> {
        Ok(self.capture.discard(recording).await?)
    }

    /// Connect the sync channel to the relay
    pub async fn enable_sync(&self) -> Result<(), DuocapError> {
        self.sync.connect(&self.config.relay_url()).await
    }

    /// Disconnect the sync channel; idempotent
    pub async fn disable_sync(&self) {
        self.sync.disconnect().await;
    }

    /// Current sync channel state
    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// Run the full processing flow for a finished recording: upload,
    /// request generation, poll to a terminal state, download the mesh.
    ///
    /// Steps run strictly in sequence. Terminal outcomes are returned and
    /// also emitted on the event stream; transport and storage failures
    /// abort the flow with an error (the recording file survives a failed
    /// upload for a manual retry).
    pub async fn process_recording(
        &self,
        recording: FinishedRecording,
    ) -> Result<ReconstructionOutcome, DuocapError> {
        let timestamp_ms = recording.started_at_ms;
        info!(
            "[{}] processing recording {}",
            self.device,
            recording.path.display()
        );

        if let Err(err) = self.upload.upload(&recording).await {
            let _ = self.event_tx.send(Event::SessionError {
                error: err.to_string(),
                recoverable: err.is_retryable(),
            });
            return Err(err);
        }
        let _ = self.event_tx.send(Event::UploadCompleted { timestamp_ms });

        let cancel = CancellationToken::new();
        *self.processing_cancel.lock() = cancel.clone();

        let outcome = match self
            .reconstruction
            .run(recording.device, timestamp_ms, &cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = self.event_tx.send(Event::SessionError {
                    error: err.to_string(),
                    recoverable: err.is_retryable(),
                });
                return Err(err);
            }
        };

        let event = match &outcome {
            ReconstructionOutcome::Completed { artifact } => Event::ArtifactReady {
                path: artifact.clone(),
            },
            ReconstructionOutcome::Failed { status } => Event::ReconstructionFailed {
                status: status.clone(),
            },
            ReconstructionOutcome::TimedOut { attempts } => Event::ReconstructionTimedOut {
                attempts: *attempts,
            },
            ReconstructionOutcome::Cancelled => Event::ReconstructionCancelled,
        };
        let _ = self.event_tx.send(event);
        Ok(outcome)
    }

    /// Cancel the in-flight processing flow, if any. The poll loop
    /// observes the flag at its next iteration; the in-flight request is
    /// not aborted, its result is discarded.
    pub fn cancel_processing(&self) {
        info!("[{}] processing cancelled by user", self.device);
        self.processing_cancel.lock().cancel();
    }

    /// Shut the session down: disconnect the relay, cancel any processing,
    /// and stop the event-forwarding tasks.
    pub async fn close(&self) {
        self.cancel_processing();
        self.sync.disconnect().await;
        for task in &self.forwarders {
            task.abort();
        }
    }
}
