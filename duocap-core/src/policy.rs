//! Transfer and polling policies
//!
//! The retry ceiling and intervals of the reconstruction flow are named,
//! testable values here instead of literals buried in loop bodies.

use crate::error::DuocapError;
use std::time::Duration;

/// Delay between consecutive status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum number of status checks before the flow times out (~2 minutes
/// at the default interval)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Highest progress percentage reported while the job is still processing;
/// the remaining range is reserved for the download phase
pub const DEFAULT_PROGRESS_CAP: u8 = 85;

/// Connect/read/write timeout for large-payload transfers
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(120);

/// Policy driving the reconstruction status-poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between consecutive status checks
    pub interval: Duration,
    /// Maximum number of status checks before giving up
    pub max_attempts: u32,
    /// Progress ceiling while the job has not completed
    pub progress_cap: u8,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress_cap: DEFAULT_PROGRESS_CAP,
        }
    }
}

impl PollPolicy {
    /// Validate policy values
    pub fn validate(&self) -> Result<(), DuocapError> {
        if self.max_attempts == 0 {
            return Err(DuocapError::InvalidData {
                reason: "poll policy needs at least one attempt".to_string(),
            });
        }
        if self.progress_cap > 100 {
            return Err(DuocapError::InvalidData {
                reason: "progress cap must be a percentage".to_string(),
            });
        }
        Ok(())
    }

    /// Clamp a server-reported progress value to the in-flight ceiling
    pub fn clamp_progress(&self, reported: u8) -> u8 {
        reported.min(self.progress_cap)
    }
}

/// Timeouts applied to upload and download transfers.
///
/// Recordings are large, so the defaults are deliberately generous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Overall request timeout covering write and read
    pub request_timeout: Duration,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_TRANSFER_TIMEOUT,
            request_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }
}
