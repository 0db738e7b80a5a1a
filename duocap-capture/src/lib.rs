//! # duocap capture
//!
//! Recording control for one capture device: a pluggable recorder backend
//! (the platform camera/encoder stack), a controller enforcing the
//! single-active-session invariant, and capture events for the UI layer.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod controller;
pub mod error;

// Re-export main types
pub use backend::{MockRecorder, MockRecorderControl, RecorderBackend, RecordingHandle};
pub use controller::{CaptureController, CaptureEvent};
pub use error::CaptureError;
