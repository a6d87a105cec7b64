//! Frame acquisition and capture-side policy.
//!
//! This module provides abstractions for pulling frames from a camera
//! feed: the frame task type, the source trait, format negotiation, and
//! stall detection. The feed is treated as unreliable by design; the
//! pipeline tolerates gaps, stalls, and format surprises.

mod config;
mod format;
mod frame;
mod source;
mod watchdog;

pub use config::{CaptureConfig, ConfigError, DispatchConfig, ExportConfig, FileConfig};
pub use format::FormatNegotiator;
pub use frame::{FrameTask, PixelFormat};
pub use source::{CaptureError, FrameSource, MockFrameSource};
pub use watchdog::{CaptureWatchdog, WatchdogVerdict};
