//! # duocap pipeline
//!
//! The client side of the processing server: one-shot multipart upload of a
//! finished recording, the reconstruction request/poll/download flow, and
//! the policies bounding them. All steps run strictly in sequence; only the
//! status-poll loop retries, and only up to its fixed budget.

#![deny(missing_docs)]
#![warn(clippy::all)]

mod client;
pub mod reconstruction;
pub mod upload;

// Re-export main types
pub use reconstruction::{
    MapStatus, ReconstructionClient, ReconstructionEvent, ReconstructionOutcome,
};
pub use upload::UploadClient;
