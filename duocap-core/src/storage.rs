//! Cache-directory layout for recordings and downloaded artifacts

use crate::device::DeviceId;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Names and resolves the app-private files duocap works with.
///
/// Recordings are named `video_{DEVICE}_{yyyyMMdd_HHmmss}.mp4` and
/// downloaded meshes `map_{DEVICE}_{timestamp}.glb`, both directly under the
/// store root. Nothing else is persisted.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store in the platform cache directory, if one can be
    /// resolved for this user
    pub fn in_cache_dir() -> Option<Self> {
        directories::ProjectDirs::from("io", "duocap", "duocap")
            .map(|dirs| Self::new(dirs.cache_dir()))
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Path for a new recording started at `started_at`
    pub fn video_path(&self, device: DeviceId, started_at: DateTime<Local>) -> PathBuf {
        let stamp = started_at.format("%Y%m%d_%H%M%S");
        self.root
            .join(format!("video_{}_{}.mp4", device.as_str(), stamp))
    }

    /// Path for a downloaded mesh keyed by device and capture timestamp
    pub fn artifact_path(&self, device: DeviceId, timestamp_ms: i64) -> PathBuf {
        self.root
            .join(format!("map_{}_{}.glb", device.as_str(), timestamp_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_video_path_naming() {
        let store = MediaStore::new("/tmp/duocap-test");
        let started = Local.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let path = store.video_path(DeviceId::Left, started);
        assert_eq!(
            path,
            PathBuf::from("/tmp/duocap-test/video_LEFT_20260314_150926.mp4")
        );
    }

    #[test]
    fn test_artifact_path_naming() {
        let store = MediaStore::new("/tmp/duocap-test");
        let path = store.artifact_path(DeviceId::Right, 1723000000000);
        assert_eq!(
            path,
            PathBuf::from("/tmp/duocap-test/map_RIGHT_1723000000000.glb")
        );
    }
}
