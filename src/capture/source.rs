//! Frame source abstraction.
//!
//! This module provides a trait-based abstraction over the camera feed,
//! allowing for both real capture backends and mock implementations for
//! testing. A source reports its native pixel layout and copies frame
//! data under a caller-requested format.

use std::collections::VecDeque;

use super::{CaptureConfig, PixelFormat};
use thiserror::Error;

/// Errors that can occur during frame acquisition.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open frame source: {0}")]
    OpenFailed(String),
    #[error("failed to configure frame source: {0}")]
    ConfigFailed(String),
    #[error("failed to copy frame data: {0}")]
    CopyFailed(String),
    #[error("failed to reacquire frame source: {0}")]
    ReacquireFailed(String),
    #[error("frame source not initialized")]
    NotInitialized,
}

/// Trait for frame source implementations.
///
/// This abstraction allows swapping between real camera hardware and
/// mock implementations for testing. A source hands out one frame per
/// `next_frame` call, copied under the requested pixel format.
pub trait FrameSource {
    /// Opens and initializes the source with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CaptureError>;

    /// Checks if the source is currently open.
    fn is_open(&self) -> bool;

    /// Closes the source and releases resources.
    fn close(&mut self);

    /// The pixel layout the source produces without conversion.
    fn native_format(&self) -> PixelFormat;

    /// Current frame dimensions as (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Buffer size required to hold one frame under `format`.
    fn allocation_size(&self, format: PixelFormat) -> usize {
        let (w, h) = self.dimensions();
        format.buffer_size(w, h)
    }

    /// Copies the next frame into `out` under the requested format.
    ///
    /// Returns `Ok(false)` when no frame is currently available (idle or
    /// stalled feed); the caller decides whether that constitutes a stall.
    fn next_frame(&mut self, format: PixelFormat, out: &mut Vec<u8>) -> Result<bool, CaptureError>;

    /// Re-establishes a feed that the platform has torn down.
    ///
    /// Some platforms cancel the camera feed behind our back (notably
    /// after a completed download); the watchdog triggers this.
    fn reacquire(&mut self) -> Result<(), CaptureError>;
}

/// Mock frame source that replays a scripted sequence of frame buffers.
///
/// Each queued entry is either a pre-built pixel buffer or a gap
/// (`None`) during which `next_frame` reports no data, letting tests
/// exercise the stall watchdog.
#[derive(Debug, Default)]
pub struct MockFrameSource {
    config: Option<CaptureConfig>,
    native: Option<PixelFormat>,
    queue: VecDeque<Option<Vec<u8>>>,
    reacquire_count: u64,
}

impl MockFrameSource {
    /// Creates a mock source producing frames in the given native format.
    pub fn new(native: PixelFormat) -> Self {
        Self {
            native: Some(native),
            ..Self::default()
        }
    }

    /// Queues a frame buffer for playback.
    pub fn push_frame(&mut self, content: Vec<u8>) {
        self.queue.push_back(Some(content));
    }

    /// Queues a gap: the next `next_frame` call reports no data.
    pub fn push_gap(&mut self) {
        self.queue.push_back(None);
    }

    /// Number of frames (including gaps) still queued.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Number of times the source was reacquired.
    pub fn reacquire_count(&self) -> u64 {
        self.reacquire_count
    }
}

impl FrameSource for MockFrameSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CaptureError> {
        config
            .validate()
            .map_err(|e| CaptureError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        tracing::info!("MockFrameSource opened with config: {:?}", config);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        self.config = None;
        tracing::info!("MockFrameSource closed");
    }

    fn native_format(&self) -> PixelFormat {
        self.native.unwrap_or(PixelFormat::Rgba)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.config
            .as_ref()
            .map(|c| (c.width, c.height))
            .unwrap_or((0, 0))
    }

    fn next_frame(&mut self, format: PixelFormat, out: &mut Vec<u8>) -> Result<bool, CaptureError> {
        if self.config.is_none() {
            return Err(CaptureError::NotInitialized);
        }
        match self.queue.pop_front() {
            None | Some(None) => Ok(false),
            Some(Some(content)) => {
                let size = self.allocation_size(format);
                out.clear();
                out.resize(size, 0);
                let n = content.len().min(size);
                out[..n].copy_from_slice(&content[..n]);
                Ok(true)
            }
        }
    }

    fn reacquire(&mut self) -> Result<(), CaptureError> {
        if self.config.is_none() {
            return Err(CaptureError::NotInitialized);
        }
        self.reacquire_count += 1;
        tracing::info!(count = self.reacquire_count, "MockFrameSource reacquired");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_lifecycle() {
        let mut source = MockFrameSource::new(PixelFormat::Nv12);
        let config = CaptureConfig::default();

        assert!(!source.is_open());
        source.open(&config).unwrap();
        assert!(source.is_open());
        assert_eq!(source.dimensions(), (config.width, config.height));

        source.close();
        assert!(!source.is_open());
    }

    #[test]
    fn test_capture_without_open() {
        let mut source = MockFrameSource::new(PixelFormat::Rgba);
        let mut buf = Vec::new();
        assert!(matches!(
            source.next_frame(PixelFormat::Rgba, &mut buf),
            Err(CaptureError::NotInitialized)
        ));
    }

    #[test]
    fn test_frames_are_padded_to_allocation_size() {
        let mut source = MockFrameSource::new(PixelFormat::Rgba);
        let mut config = CaptureConfig::default();
        config.width = 4;
        config.height = 4;
        source.open(&config).unwrap();
        source.push_frame(vec![1, 2, 3]);

        let mut buf = Vec::new();
        assert!(source.next_frame(PixelFormat::Rgba, &mut buf).unwrap());
        assert_eq!(buf.len(), PixelFormat::Rgba.buffer_size(4, 4));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert!(buf[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_gap_reports_no_frame() {
        let mut source = MockFrameSource::new(PixelFormat::Rgba);
        let mut config = CaptureConfig::default();
        config.width = 2;
        config.height = 2;
        source.open(&config).unwrap();
        source.push_gap();
        source.push_frame(vec![9]);

        let mut buf = Vec::new();
        assert!(!source.next_frame(PixelFormat::Rgba, &mut buf).unwrap());
        assert!(source.next_frame(PixelFormat::Rgba, &mut buf).unwrap());
        // drained
        assert!(!source.next_frame(PixelFormat::Rgba, &mut buf).unwrap());
    }
}
