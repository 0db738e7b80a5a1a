//! Sync relay protocol messages

use chrono::Utc;
use duocap_core::DeviceId;
use serde::{Deserialize, Serialize};

/// Commands mirrored between the paired devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCommandKind {
    /// Begin recording
    StartRecording,
    /// Stop recording
    StopRecording,
}

impl SyncCommandKind {
    /// Wire name of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncCommandKind::StartRecording => "start_recording",
            SyncCommandKind::StopRecording => "stop_recording",
        }
    }
}

/// One command envelope on the relay.
///
/// Constructed, serialized, sent, and discarded; never persisted. The relay
/// echoes envelopes to both devices, so the issuing device also receives
/// its own commands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCommand {
    /// Command kind
    pub command: SyncCommandKind,
    /// Device that issued the command
    pub device_id: DeviceId,
    /// Issue time in unix milliseconds
    pub timestamp: i64,
}

impl SyncCommand {
    /// Build an envelope stamped with the current wall clock
    pub fn now(command: SyncCommandKind, device_id: DeviceId) -> Self {
        Self {
            command,
            device_id,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Lenient receive-side view of a relay message.
///
/// The command stays a raw string so unrecognized commands can be logged
/// and dropped instead of failing the whole frame, and the peer's fields
/// are optional because only `command` is load-bearing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSyncMessage {
    /// Raw command name
    pub command: String,
    /// Device that issued the command, if present
    #[serde(default)]
    pub device_id: Option<String>,
    /// Issue time in unix milliseconds, if present
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl RawSyncMessage {
    /// Typed view of the command, if it is one we understand
    pub fn kind(&self) -> Option<SyncCommandKind> {
        match self.command.as_str() {
            "start_recording" => Some(SyncCommandKind::StartRecording),
            "stop_recording" => Some(SyncCommandKind::StopRecording),
            _ => None,
        }
    }
}
