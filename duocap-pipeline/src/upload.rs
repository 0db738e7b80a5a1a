//! One-shot multipart upload of a finished recording

use crate::client::{build_http, validate_base_url};
use duocap_core::{DuocapError, FinishedRecording, TransferPolicy};
use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

/// Uploads finished recordings to the processing server.
///
/// One multipart `POST /upload_video` per recording; the server only
/// answers with a status code. There is no automatic retry: on failure the
/// local file is retained so the user can try again.
#[derive(Debug, Clone)]
pub struct UploadClient {
    base_url: String,
    http: reqwest::Client,
}

impl UploadClient {
    /// Create an upload client against `base_url`
    pub fn new(base_url: impl Into<String>, policy: TransferPolicy) -> Result<Self, DuocapError> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;
        Ok(Self {
            http: build_http(&policy)?,
            base_url,
        })
    }

    /// Upload `recording` and, on success, delete the local source file.
    ///
    /// Deletion is at-most-once: a failure to delete is logged but not
    /// retried, and does not fail the upload.
    pub async fn upload(&self, recording: &FinishedRecording) -> Result<(), DuocapError> {
        if !recording.path.exists() {
            return Err(DuocapError::FileMissing {
                path: recording.path.clone(),
            });
        }

        let file = tokio::fs::File::open(&recording.path)
            .await
            .map_err(|source| DuocapError::Storage {
                path: recording.path.clone(),
                source,
            })?;
        let size = file
            .metadata()
            .await
            .map_err(|source| DuocapError::Storage {
                path: recording.path.clone(),
                source,
            })?
            .len();

        let file_name = recording
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        let video = Part::stream_with_length(
            reqwest::Body::wrap_stream(ReaderStream::new(file)),
            size,
        )
        .file_name(file_name)
        .mime_str("video/mp4")
        .map_err(|err| DuocapError::InvalidData {
            reason: err.to_string(),
        })?;

        let form = Form::new()
            .part("video", video)
            .text("device_id", recording.device.as_str())
            .text("timestamp", recording.started_at_ms.to_string())
            .text("camera_position", recording.facing.as_str());

        info!(
            "[{}] uploading {} ({} KB)",
            recording.device,
            recording.path.display(),
            size / 1024
        );

        let response = self
            .http
            .post(format!("{}/upload_video", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|err| DuocapError::Transport {
                operation: "upload".to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("[{}] upload rejected: {}", recording.device, status);
            return Err(DuocapError::ServerRejected {
                operation: "upload".to_string(),
                status: status.as_u16(),
            });
        }

        info!("[{}] upload complete", recording.device);
        if let Err(err) = tokio::fs::remove_file(&recording.path).await {
            warn!(
                "uploaded recording not deleted ({}): {}",
                recording.path.display(),
                err
            );
        }
        Ok(())
    }
}
