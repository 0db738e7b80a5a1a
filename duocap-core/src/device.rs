//! Device identity and camera orientation tags

use crate::error::DuocapError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of one of the two paired capture devices.
///
/// Chosen once at session startup and immutable for the session. The tag
/// namespaces local files and addresses sync messages on the relay, so the
/// wire form (`"LEFT"` / `"RIGHT"`) is fixed by the relay protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceId {
    /// Left capture unit
    #[serde(rename = "LEFT")]
    Left,
    /// Right capture unit
    #[serde(rename = "RIGHT")]
    Right,
}

impl DeviceId {
    /// Wire tag used in file names, form fields, and sync envelopes
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceId::Left => "LEFT",
            DeviceId::Right => "RIGHT",
        }
    }

    /// Identity of the paired peer device
    pub fn peer(&self) -> Self {
        match self {
            DeviceId::Left => DeviceId::Right,
            DeviceId::Right => DeviceId::Left,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceId {
    type Err = DuocapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEFT" => Ok(DeviceId::Left),
            "RIGHT" => Ok(DeviceId::Right),
            other => Err(DuocapError::InvalidData {
                reason: format!("unknown device id: {}", other),
            }),
        }
    }
}

/// Which camera a recording was captured with.
///
/// Uploaded alongside the video as the `camera_position` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraFacing {
    /// Rear camera (the default capture direction)
    #[serde(rename = "back")]
    Back,
    /// Front camera
    #[serde(rename = "front")]
    Front,
}

impl CameraFacing {
    /// Wire tag for the `camera_position` upload field
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraFacing::Back => "back",
            CameraFacing::Front => "front",
        }
    }

    /// The opposite facing
    pub fn toggled(&self) -> Self {
        match self {
            CameraFacing::Back => CameraFacing::Front,
            CameraFacing::Front => CameraFacing::Back,
        }
    }
}

impl Default for CameraFacing {
    fn default() -> Self {
        CameraFacing::Back
    }
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_wire_tags() {
        assert_eq!(serde_json::to_string(&DeviceId::Left).unwrap(), "\"LEFT\"");
        assert_eq!(
            serde_json::to_string(&DeviceId::Right).unwrap(),
            "\"RIGHT\""
        );

        let parsed: DeviceId = serde_json::from_str("\"RIGHT\"").unwrap();
        assert_eq!(parsed, DeviceId::Right);
    }

    #[test]
    fn test_device_id_peer() {
        assert_eq!(DeviceId::Left.peer(), DeviceId::Right);
        assert_eq!(DeviceId::Right.peer(), DeviceId::Left);
    }

    #[test]
    fn test_device_id_from_str() {
        assert_eq!("LEFT".parse::<DeviceId>().unwrap(), DeviceId::Left);
        assert!("left".parse::<DeviceId>().is_err());
        assert!("CENTER".parse::<DeviceId>().is_err());
    }

    #[test]
    fn test_camera_facing_tags() {
        assert_eq!(CameraFacing::Back.as_str(), "back");
        assert_eq!(CameraFacing::Front.toggled(), CameraFacing::Back);
        assert_eq!(CameraFacing::default(), CameraFacing::Back);
    }
}
