use anyhow::Result;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// A backend is a pure function of the frame: given RGB24 pixels it returns
/// the detections it found, and the pipeline requires no state across calls.
/// Backends may keep internal state (model handles, previous-frame hashes)
/// but must not let one frame's result depend on delivery of its output.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    ///
    /// The pixel slice is read-only and valid only for this call. A failure
    /// here is surfaced by the pipeline as "no detections this frame" and is
    /// never fatal to the run.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
