//! Frame container shared by ingestion, detection, and rendering.
//!
//! A `Frame` owns one decoded RGB24 image plus the metadata the pipeline
//! needs for a tick: a monotonically increasing timestamp (relative to the
//! start of the stream) and a running frame index. Sources are responsible
//! for producing timestamps that never go backwards; the alert cooldown
//! arithmetic depends on that.

use anyhow::{anyhow, Result};
use std::time::Duration;

/// One decoded video frame in RGB24 layout (3 bytes per pixel, row-major).
#[derive(Clone, Debug)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Time since the stream started. Monotonic across frames from one source.
    pub timestamp: Duration,
    /// Running frame number, starting at 1 for the first captured frame.
    pub index: u64,
}

impl Frame {
    /// Create a frame, checking that the pixel buffer matches the dimensions.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        timestamp: Duration,
        index: u64,
    ) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame buffer is {} bytes, expected {} for {}x{} RGB24",
                pixels.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            timestamp,
            index,
        })
    }
}

/// Byte length of an RGB24 buffer for the given dimensions.
pub fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions {}x{} overflow", width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_buffer() {
        let result = Frame::new(vec![0u8; 10], 4, 4, Duration::ZERO, 1);
        assert!(result.is_err());
    }

    #[test]
    fn frame_accepts_exact_buffer() {
        let frame = Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, Duration::from_millis(33), 1).unwrap();
        assert_eq!(frame.width, 4);
        assert_eq!(frame.timestamp, Duration::from_millis(33));
    }
}
