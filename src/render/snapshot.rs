//! Annotated JPEG snapshots for alert delivery.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;

use super::overlay;
use crate::detect::Detection;
use crate::frame::Frame;

const JPEG_QUALITY: u8 = 85;

/// Encode a frame with its detection boxes drawn in as a JPEG.
///
/// Works on a copy of the frame so the caller's buffer stays pristine for
/// any downstream renderer.
pub fn encode_annotated_jpeg(
    frame: &Frame,
    detections: &[Detection],
    label_for: impl Fn(u32) -> String,
) -> Result<Vec<u8>> {
    let mut annotated = frame.clone();
    overlay::draw_detections(&mut annotated, detections, label_for);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(
            &annotated.pixels,
            annotated.width,
            annotated.height,
            image::ExtendedColorType::Rgb8,
        )
        .context("encode alert snapshot jpeg")?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use std::time::Duration;

    #[test]
    fn encodes_a_parseable_jpeg() {
        let frame = Frame::new(
            vec![40u8; 32 * 32 * 3],
            32,
            32,
            Duration::ZERO,
            1,
        )
        .unwrap();
        let detections = vec![Detection {
            class_id: 0,
            confidence: 0.9,
            bbox: BoundingBox {
                x: 4.0,
                y: 4.0,
                w: 10.0,
                h: 10.0,
            },
        }];

        let jpeg = encode_annotated_jpeg(&frame, &detections, |_| "fire".to_string()).unwrap();
        assert!(jpeg.starts_with(&[0xFF, 0xD8]));
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 32);
    }
}
