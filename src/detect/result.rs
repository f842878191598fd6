use serde::Serialize;

/// One detected object in a frame.
///
/// Detections are immutable and scoped to a single frame's processing; the
/// pipeline keeps nothing from them beyond the tick they arrived in.
#[derive(Clone, Debug)]
pub struct Detection {
    /// Model class id. The pipeline only acts on ids in its target set.
    pub class_id: u32,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Axis-aligned box in pixel coordinates of the frame it was detected in.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            w: (x2 - x1).max(0.0),
            h: (y2 - y1).max(0.0),
        }
    }

    /// Clamp the box to frame bounds. Model outputs can spill a few pixels
    /// past the edges.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let x = self.x.clamp(0.0, width as f32);
        let y = self.y.clamp(0.0, height as f32);
        Self {
            x,
            y,
            w: self.w.min(width as f32 - x),
            h: self.h.min(height as f32 - y),
        }
    }
}
