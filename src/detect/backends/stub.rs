use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

/// Stub backend for testing and demos. Uses pixel hashing to detect scene
/// changes and reports each change as a detection of a fixed class.
pub struct StubBackend {
    class_id: u32,
    last_hash: Option<[u8; 32]>,
}

impl StubBackend {
    pub fn new(class_id: u32) -> Self {
        Self {
            class_id,
            last_hash: None,
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let current_hash: [u8; 32] = Sha256::digest(pixels).into();

        let changed = match self.last_hash {
            Some(prev) => prev != current_hash,
            None => false,
        };

        self.last_hash = Some(current_hash);

        if !changed {
            return Ok(Vec::new());
        }

        // Report the change as one centered detection covering half the frame.
        let w = width as f32 / 2.0;
        let h = height as f32 / 2.0;
        Ok(vec![Detection {
            class_id: self.class_id,
            confidence: 0.85,
            bbox: BoundingBox {
                x: w / 2.0,
                y: h / 2.0,
                w,
                h,
            },
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_produces_nothing() {
        let mut backend = StubBackend::new(0);
        let detections = backend.detect(b"frame1", 10, 10).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn scene_change_produces_detection() {
        let mut backend = StubBackend::new(3);
        backend.detect(b"frame1", 10, 10).unwrap();
        let detections = backend.detect(b"frame2", 10, 10).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 3);

        // Identical frame: no change, no detection.
        let detections = backend.detect(b"frame2", 10, 10).unwrap();
        assert!(detections.is_empty());
    }
}
