//! Reconstruction request, status polling, and artifact download
//!
//! After an upload the server builds the 3D mesh asynchronously. The client
//! requests generation once, then polls the status endpoint on a fixed
//! interval until the job reaches a terminal state, the poll budget runs
//! out, or the user cancels; a completed job is downloaded to the media
//! store.

use crate::client::{build_http, validate_base_url};
use duocap_core::{DeviceId, DuocapError, MediaStore, PollPolicy, TransferPolicy};
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Status snapshot polled from the server
#[derive(Debug, Clone, Deserialize)]
pub struct MapStatus {
    /// Job status string; anything that is not a terminal value counts as
    /// still processing
    #[serde(default = "default_status")]
    pub status: String,
    /// Server-reported progress percentage
    #[serde(default)]
    pub progress: u8,
}

fn default_status() -> String {
    "processing".to_string()
}

impl MapStatus {
    /// Whether the job reached its success state
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    /// Whether the server reported the job as failed
    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "failed" | "error")
    }
}

/// Terminal result of one reconstruction flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionOutcome {
    /// The mesh was generated and downloaded
    Completed {
        /// Local path of the downloaded artifact
        artifact: PathBuf,
    },
    /// The server reported the job as failed, or rejected the request
    Failed {
        /// Terminal status string
        status: String,
    },
    /// The poll budget ran out before the job finished
    TimedOut {
        /// Number of status checks issued
        attempts: u32,
    },
    /// The user cancelled while polling
    Cancelled,
}

/// Progress events for the reconstruction flow
#[derive(Debug, Clone)]
pub enum ReconstructionEvent {
    /// Progress percentage and a short phase message
    Progress {
        /// Overall percentage (0-100)
        percent: u8,
        /// Human-readable phase description
        message: String,
    },
}

enum PollVerdict {
    Ready,
    Failed { status: String },
    TimedOut { attempts: u32 },
    Cancelled,
}

/// Drives one upload's server-side reconstruction to a terminal state.
#[derive(Debug)]
pub struct ReconstructionClient {
    base_url: String,
    http: reqwest::Client,
    store: MediaStore,
    policy: PollPolicy,
    event_tx: broadcast::Sender<ReconstructionEvent>,
}

impl ReconstructionClient {
    /// Create a client against `base_url`, downloading artifacts into
    /// `store`
    pub fn new(
        base_url: impl Into<String>,
        store: MediaStore,
        policy: PollPolicy,
        transfer: TransferPolicy,
    ) -> Result<Self, DuocapError> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;
        policy.validate()?;
        let (event_tx, _) = broadcast::channel(64);
        Ok(Self {
            http: build_http(&transfer)?,
            base_url,
            store,
            policy,
            event_tx,
        })
    }

    /// Subscribe to progress events
    pub fn events(&self) -> broadcast::Receiver<ReconstructionEvent> {
        self.event_tx.subscribe()
    }

    /// Poll policy this client runs with
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Run the whole flow: request generation, poll to a terminal state,
    /// download on completion.
    ///
    /// `cancel` is checked at the top of every poll iteration; an in-flight
    /// request is not aborted, its result is discarded.
    pub async fn run(
        &self,
        device: DeviceId,
        timestamp_ms: i64,
        cancel: &CancellationToken,
    ) -> Result<ReconstructionOutcome, DuocapError> {
        self.progress(5, "requesting map generation");
        if !self.request_generation(device, timestamp_ms).await? {
            return Ok(ReconstructionOutcome::Failed {
                status: "rejected".to_string(),
            });
        }

        self.progress(10, "generating map");
        match self.poll_status(device, timestamp_ms, cancel).await {
            PollVerdict::Ready => {
                self.progress(90, "downloading map");
                let artifact = self.download(device, timestamp_ms).await?;
                self.progress(100, "completed");
                Ok(ReconstructionOutcome::Completed { artifact })
            }
            PollVerdict::Failed { status } => {
                warn!("[{}] map generation failed: {}", device, status);
                Ok(ReconstructionOutcome::Failed { status })
            }
            PollVerdict::TimedOut { attempts } => {
                warn!("[{}] map generation timed out", device);
                Ok(ReconstructionOutcome::TimedOut { attempts })
            }
            PollVerdict::Cancelled => {
                info!("[{}] map generation cancelled", device);
                Ok(ReconstructionOutcome::Cancelled)
            }
        }
    }

    /// Ask the server to start generating the mesh. `Ok(false)` means the
    /// server rejected the request with a non-success status.
    async fn request_generation(
        &self,
        device: DeviceId,
        timestamp_ms: i64,
    ) -> Result<bool, DuocapError> {
        let response = self
            .http
            .post(format!("{}/generate_map", self.base_url))
            .form(&[
                ("device_id", device.as_str().to_string()),
                ("timestamp", timestamp_ms.to_string()),
            ])
            .send()
            .await
            .map_err(|err| DuocapError::Transport {
                operation: "generation request".to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        debug!("[{}] generate_map answered {}", device, status);
        if !status.is_success() {
            warn!("[{}] generation request rejected: {}", device, status);
        }
        Ok(status.is_success())
    }

    /// Bounded status-poll loop. Every iteration issues at most one GET;
    /// transport and parse failures count against the budget the same as a
    /// still-processing answer.
    async fn poll_status(
        &self,
        device: DeviceId,
        timestamp_ms: i64,
        cancel: &CancellationToken,
    ) -> PollVerdict {
        let mut attempts = 0u32;
        while attempts < self.policy.max_attempts {
            if cancel.is_cancelled() {
                return PollVerdict::Cancelled;
            }
            tokio::time::sleep(self.policy.interval).await;
            attempts += 1;

            let status = match self.fetch_status(device, timestamp_ms).await {
                Ok(status) => status,
                Err(err) => {
                    warn!("[{}] status check {} failed: {}", device, attempts, err);
                    continue;
                }
            };

            debug!(
                "[{}] status check {}: {} ({}%)",
                device, attempts, status.status, status.progress
            );
            if status.is_completed() {
                return PollVerdict::Ready;
            }
            if status.is_failed() {
                return PollVerdict::Failed {
                    status: status.status,
                };
            }
            let percent = self.policy.clamp_progress(status.progress);
            self.progress(percent, &format!("generating map ({})", status.status));
        }
        PollVerdict::TimedOut { attempts }
    }

    async fn fetch_status(
        &self,
        device: DeviceId,
        timestamp_ms: i64,
    ) -> Result<MapStatus, DuocapError> {
        let response = self
            .http
            .get(format!("{}/map_status", self.base_url))
            .query(&[
                ("device_id", device.as_str().to_string()),
                ("timestamp", timestamp_ms.to_string()),
            ])
            .send()
            .await
            .map_err(|err| DuocapError::Transport {
                operation: "status check".to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DuocapError::ServerRejected {
                operation: "status check".to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json::<MapStatus>()
            .await
            .map_err(|err| DuocapError::InvalidResponse {
                operation: "status check".to_string(),
                reason: err.to_string(),
            })
    }

    /// Download the finished mesh, streaming the body to the artifact path
    async fn download(&self, device: DeviceId, timestamp_ms: i64) -> Result<PathBuf, DuocapError> {
        let response = self
            .http
            .get(format!("{}/download_map", self.base_url))
            .query(&[
                ("device_id", device.as_str().to_string()),
                ("timestamp", timestamp_ms.to_string()),
            ])
            .send()
            .await
            .map_err(|err| DuocapError::Transport {
                operation: "download".to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DuocapError::ServerRejected {
                operation: "download".to_string(),
                status: status.as_u16(),
            });
        }

        self.store
            .ensure_root()
            .map_err(|source| DuocapError::Storage {
                path: self.store.root().to_path_buf(),
                source,
            })?;
        let path = self.store.artifact_path(device, timestamp_ms);
        let mut file =
            tokio::fs::File::create(&path)
                .await
                .map_err(|source| DuocapError::Storage {
                    path: path.clone(),
                    source,
                })?;

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| DuocapError::Transport {
                operation: "download".to_string(),
                reason: err.to_string(),
            })?;
            written += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|source| DuocapError::Storage {
                    path: path.clone(),
                    source,
                })?;
        }
        file.flush().await.map_err(|source| DuocapError::Storage {
            path: path.clone(),
            source,
        })?;

        info!(
            "[{}] map downloaded: {} ({} KB)",
            device,
            path.display(),
            written / 1024
        );
        Ok(path)
    }

    fn progress(&self, percent: u8, message: &str) {
        let _ = self.event_tx.send(ReconstructionEvent::Progress {
            percent,
            message: message.to_string(),
        });
    }
}
