//! Frame task type and pixel format handling.

use crate::dispatch::DecodeMode;

/// Pixel layout of a captured frame buffer.
///
/// The two planar YUV layouts are what camera sources typically hand
/// out natively; `Rgba` is the generic 4-bytes-per-pixel fallback we
/// request when the native layout is unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar Y plane followed by interleaved UV (4:2:0).
    Nv12,
    /// Fully planar YUV 4:2:0.
    I420,
    /// Packed 4 bytes/pixel. The generic fallback.
    Rgba,
    /// Packed 3 bytes/pixel.
    Rgb,
}

impl PixelFormat {
    /// Expected buffer size in bytes for a frame of the given dimensions.
    pub fn buffer_size(self, width: u32, height: u32) -> usize {
        let pixels = (width as usize) * (height as usize);
        match self {
            PixelFormat::Nv12 | PixelFormat::I420 => pixels * 3 / 2,
            PixelFormat::Rgba => pixels * 4,
            PixelFormat::Rgb => pixels * 3,
        }
    }

    /// Numeric tag used by the decode ABI to identify the layout.
    pub fn wire_tag(self) -> i32 {
        match self {
            PixelFormat::Nv12 => 12,
            PixelFormat::I420 => 420,
            PixelFormat::Rgba => 4,
            PixelFormat::Rgb => 3,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PixelFormat::Nv12 => "NV12",
            PixelFormat::I420 => "I420",
            PixelFormat::Rgba => "RGBA",
            PixelFormat::Rgb => "RGB",
        };
        f.write_str(name)
    }
}

/// A single captured frame awaiting decode.
///
/// The pixel buffer is owned and travels with the task: once a task is
/// handed to a decode worker the submitter must not touch the buffer
/// again. The mode hint stays `None` until the dispatcher attaches
/// either the latched mode or an autodetection candidate.
pub struct FrameTask {
    /// Raw pixel data, ownership transferred to the worker.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Pixel layout of the buffer.
    format: PixelFormat,
    /// Monotonic, process-wide sequence number.
    sequence: u64,
    /// Decode mode to use, attached at dispatch time.
    mode: Option<DecodeMode>,
}

impl FrameTask {
    /// Creates a new frame task with no mode hint.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            sequence,
            mode: None,
        }
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel layout.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the attached decode mode, if any.
    #[inline]
    pub fn mode(&self) -> Option<DecodeMode> {
        self.mode
    }

    /// Attaches a decode mode. Called by the dispatcher before handoff.
    pub fn set_mode(&mut self, mode: DecodeMode) {
        self.mode = Some(mode);
    }

    /// Validates that the pixel buffer size matches the format and dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.format.buffer_size(self.width, self.height)
    }
}

impl std::fmt::Debug for FrameTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTask")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("mode", &self.mode)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sizes() {
        assert_eq!(PixelFormat::Rgba.buffer_size(640, 480), 640 * 480 * 4);
        assert_eq!(PixelFormat::Rgb.buffer_size(640, 480), 640 * 480 * 3);
        assert_eq!(PixelFormat::Nv12.buffer_size(640, 480), 640 * 480 * 3 / 2);
        assert_eq!(PixelFormat::I420.buffer_size(640, 480), 640 * 480 * 3 / 2);
    }

    #[test]
    fn test_wire_tags() {
        assert_eq!(PixelFormat::Nv12.wire_tag(), 12);
        assert_eq!(PixelFormat::I420.wire_tag(), 420);
        assert_eq!(PixelFormat::Rgba.wire_tag(), 4);
        assert_eq!(PixelFormat::Rgb.wire_tag(), 3);
    }

    #[test]
    fn test_task_creation() {
        let pixels = vec![0u8; 64 * 64 * 4];
        let task = FrameTask::new(pixels, 64, 64, PixelFormat::Rgba, 7);

        assert_eq!(task.width(), 64);
        assert_eq!(task.height(), 64);
        assert_eq!(task.sequence(), 7);
        assert!(task.mode().is_none());
        assert!(task.is_valid());
    }

    #[test]
    fn test_task_invalid_size() {
        let task = FrameTask::new(vec![0u8; 100], 64, 64, PixelFormat::Rgba, 1);
        assert!(!task.is_valid());
    }

    #[test]
    fn test_mode_attachment() {
        let mut task = FrameTask::new(vec![0u8; 16], 2, 2, PixelFormat::Rgba, 1);
        task.set_mode(DecodeMode::B);
        assert_eq!(task.mode(), Some(DecodeMode::B));
    }
}
