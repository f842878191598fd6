//! Detection rendering.
//!
//! Rendering is purely observational: the pipeline forwards every frame and
//! its detections here after the alert decision, and nothing flows back.
//! The overlay draws class-colored boxes directly into the RGB buffer; the
//! snapshot module encodes annotated JPEGs for alert delivery. There is no
//! display window; headless runs use `NullRenderer`.

pub mod overlay;
pub mod snapshot;

use anyhow::Result;

use crate::detect::Detection;
use crate::frame::Frame;

/// Frame presentation contract. Consumes pipeline output, never feeds back.
pub trait Renderer: Send {
    fn render(&mut self, frame: &Frame, detections: &[Detection]) -> Result<()>;
}

/// Renderer that discards everything. Used for headless runs.
#[derive(Default)]
pub struct NullRenderer;

impl NullRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for NullRenderer {
    fn render(&mut self, _frame: &Frame, _detections: &[Detection]) -> Result<()> {
        Ok(())
    }
}
