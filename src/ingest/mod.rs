//! Frame ingestion sources.
//!
//! This module provides the sources the pipeline can pull frames from:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - HTTP MJPEG / single-JPEG streams (IP cameras)
//! - Synthetic stub source (testing, demos)
//!
//! Every source produces `Frame` instances with timestamps that increase
//! monotonically for the lifetime of the source. End of stream is signalled
//! by `Ok(None)` from `next_frame`; the pipeline terminates cleanly when it
//! sees it. Frame rate decimation is the source's concern, not the
//! pipeline's.

mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod http;

pub use file::{FileConfig, FileSource};
pub use http::{HttpConfig, HttpSource};

use anyhow::{anyhow, Result};

use crate::frame::Frame;

/// A source of frames for the pipeline.
pub trait FrameSource: Send {
    /// Open the underlying stream. Must be called before `next_frame`.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame. `Ok(None)` means the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Whether the source is still delivering frames at a healthy rate.
    fn is_healthy(&self) -> bool;

    /// Capture statistics for periodic health logging.
    fn stats(&self) -> SourceStats;
}

/// Statistics shared by all source implementations.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Build a source from a source string.
///
/// - `stub://...` selects the synthetic file source
/// - `http://` and `https://` select the HTTP MJPEG/JPEG source
/// - anything else is treated as a local file path
pub fn open_source(source: &str, target_fps: u32) -> Result<Box<dyn FrameSource>> {
    if source.trim().is_empty() {
        return Err(anyhow!("no video source specified"));
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(Box::new(HttpSource::new(HttpConfig {
            url: source.to_string(),
            target_fps,
        })?));
    }
    if source.contains("://") && !source.starts_with("stub://") {
        return Err(anyhow!(
            "unsupported source scheme in '{}'; expected stub://, http(s)://, or a file path",
            source
        ));
    }
    Ok(Box::new(FileSource::new(FileConfig {
        path: source.to_string(),
        target_fps,
    })?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_source_rejects_empty() {
        assert!(open_source("", 10).is_err());
    }

    #[test]
    fn open_source_rejects_unknown_scheme() {
        assert!(open_source("rtmp://camera/stream", 10).is_err());
    }

    #[test]
    fn open_source_accepts_stub() {
        assert!(open_source("stub://demo", 10).is_ok());
    }
}
