//! # duocap sync
//!
//! The sync side-channel between the two paired capture devices: a
//! persistent WebSocket connection to the relay server carrying small JSON
//! command envelopes, so a start/stop on one device mirrors to the other
//! as if a local button had been pressed.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod protocol;

// Re-export main types
pub use channel::{SyncChannel, SyncEvent, SyncState};
pub use protocol::{RawSyncMessage, SyncCommand, SyncCommandKind};

#[cfg(test)]
mod tests {
    use super::protocol::*;
    use duocap_core::DeviceId;

    #[test]
    fn test_command_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&SyncCommandKind::StartRecording).unwrap(),
            "\"start_recording\""
        );
        assert_eq!(SyncCommandKind::StopRecording.as_str(), "stop_recording");
    }

    #[test]
    fn test_sync_command_round_trip() {
        let command = SyncCommand {
            command: SyncCommandKind::StopRecording,
            device_id: DeviceId::Right,
            timestamp: 123456,
        };

        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains("\"stop_recording\""));
        assert!(json.contains("\"RIGHT\""));
        assert!(json.contains("123456"));

        let parsed: SyncCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, command);
    }

    #[test]
    fn test_sync_command_now_stamps_clock() {
        let command = SyncCommand::now(SyncCommandKind::StartRecording, DeviceId::Left);
        assert_eq!(command.device_id, DeviceId::Left);
        assert!(command.timestamp > 0);
    }

    #[test]
    fn test_raw_message_recognizes_commands() {
        let raw: RawSyncMessage = serde_json::from_str(
            r#"{"command":"start_recording","device_id":"LEFT","timestamp":1723000000000}"#,
        )
        .unwrap();
        assert_eq!(raw.kind(), Some(SyncCommandKind::StartRecording));
        assert_eq!(raw.device_id.as_deref(), Some("LEFT"));
        assert_eq!(raw.timestamp, Some(1723000000000));
    }

    #[test]
    fn test_raw_message_unknown_command() {
        let raw: RawSyncMessage =
            serde_json::from_str(r#"{"command":"reboot","device_id":"LEFT"}"#).unwrap();
        assert_eq!(raw.kind(), None);
        assert_eq!(raw.timestamp, None);
    }

    #[test]
    fn test_raw_message_missing_fields_tolerated() {
        let raw: RawSyncMessage = serde_json::from_str(r#"{"command":"stop_recording"}"#).unwrap();
        assert_eq!(raw.kind(), Some(SyncCommandKind::StopRecording));
        assert!(raw.device_id.is_none());
    }
}
