//! Capture format negotiation.
//!
//! Decides which pixel layout to request from the frame source: the
//! native layout when we can decode it directly, otherwise the generic
//! RGBA fallback. Some sources report a format but deliver differently
//! sized buffers; mismatches degrade silently to the native layout
//! rather than raising errors.

use super::PixelFormat;

/// Pixel layouts the decode path accepts without conversion.
const SUPPORTED_NATIVE: [PixelFormat; 2] = [PixelFormat::Nv12, PixelFormat::I420];

/// Chooses the pixel format requested from the frame source.
#[derive(Debug, Default)]
pub struct FormatNegotiator {
    /// Set once a fallback request came back with the wrong size.
    force_native: bool,
    /// Mismatched buffers observed (diagnostics only).
    fallback_count: u64,
}

impl FormatNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format to request for the next capture.
    ///
    /// Prefers the source's native layout when it is in the supported
    /// set; otherwise requests the RGBA fallback, unless an earlier
    /// size mismatch has pinned us back to native.
    pub fn request_for(&self, native: PixelFormat) -> PixelFormat {
        if self.force_native || SUPPORTED_NATIVE.contains(&native) {
            native
        } else {
            PixelFormat::Rgba
        }
    }

    /// Verifies a returned buffer and relabels the frame if needed.
    ///
    /// When the fallback was requested but the buffer length does not
    /// match the fallback's expected size, the source ignored the
    /// request; the frame is relabeled with the native layout and
    /// future requests stick to native.
    pub fn confirm(
        &mut self,
        requested: PixelFormat,
        native: PixelFormat,
        width: u32,
        height: u32,
        actual_len: usize,
    ) -> PixelFormat {
        if requested == PixelFormat::Rgba && actual_len != PixelFormat::Rgba.buffer_size(width, height)
        {
            self.fallback_count += 1;
            if !self.force_native {
                tracing::debug!(
                    %native,
                    actual_len,
                    "fallback capture returned unexpected size, reverting to native format"
                );
                self.force_native = true;
            }
            return native;
        }
        requested
    }

    /// Number of mismatched fallback captures observed.
    pub fn fallback_count(&self) -> u64 {
        self.fallback_count
    }
}
