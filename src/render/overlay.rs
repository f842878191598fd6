//! Box overlay drawing.
//!
//! Draws detection boxes into an RGB24 buffer with per-class colors. Box
//! edges are two pixels thick and clipped to the frame.

use crate::detect::{BoundingBox, Detection};
use crate::frame::Frame;

const COLOR_FIRE: [u8; 3] = [255, 69, 0];
const COLOR_SMOKE: [u8; 3] = [128, 128, 128];
const COLOR_DEFAULT: [u8; 3] = [0, 255, 0];

const BOX_THICKNESS: u32 = 2;

/// Overlay color for a class label.
pub fn class_color(label: &str) -> [u8; 3] {
    match label.to_lowercase().as_str() {
        "fire" => COLOR_FIRE,
        "smoke" => COLOR_SMOKE,
        _ => COLOR_DEFAULT,
    }
}

/// Draw all detections into the frame, colored by their resolved labels.
pub fn draw_detections(
    frame: &mut Frame,
    detections: &[Detection],
    label_for: impl Fn(u32) -> String,
) {
    for detection in detections {
        let color = class_color(&label_for(detection.class_id));
        draw_box(frame, &detection.bbox, color);
    }
}

/// Draw one box outline, clipped to the frame bounds.
pub fn draw_box(frame: &mut Frame, bbox: &BoundingBox, color: [u8; 3]) {
    let clamped = bbox.clamp_to(frame.width, frame.height);
    let x0 = clamped.x as u32;
    let y0 = clamped.y as u32;
    let x1 = (clamped.x + clamped.w) as u32;
    let y1 = (clamped.y + clamped.h) as u32;
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    for t in 0..BOX_THICKNESS {
        // Horizontal edges.
        for x in x0..x1 {
            put_pixel(frame, x, y0.saturating_add(t), color);
            put_pixel(frame, x, y1.saturating_sub(1 + t), color);
        }
        // Vertical edges.
        for y in y0..y1 {
            put_pixel(frame, x0.saturating_add(t), y, color);
            put_pixel(frame, x1.saturating_sub(1 + t), y, color);
        }
    }
}

fn put_pixel(frame: &mut Frame, x: u32, y: u32, color: [u8; 3]) {
    if x >= frame.width || y >= frame.height {
        return;
    }
    let idx = ((y * frame.width + x) * 3) as usize;
    frame.pixels[idx..idx + 3].copy_from_slice(&color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn blank_frame(width: u32, height: u32) -> Frame {
        Frame::new(
            vec![0u8; (width * height * 3) as usize],
            width,
            height,
            Duration::ZERO,
            1,
        )
        .unwrap()
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y * frame.width + x) * 3) as usize;
        [
            frame.pixels[idx],
            frame.pixels[idx + 1],
            frame.pixels[idx + 2],
        ]
    }

    #[test]
    fn fire_and_smoke_have_distinct_colors() {
        assert_ne!(class_color("fire"), class_color("smoke"));
        assert_eq!(class_color("Fire"), COLOR_FIRE);
        assert_eq!(class_color("person"), COLOR_DEFAULT);
    }

    #[test]
    fn box_edges_are_drawn() {
        let mut frame = blank_frame(20, 20);
        let bbox = BoundingBox {
            x: 2.0,
            y: 2.0,
            w: 10.0,
            h: 10.0,
        };
        draw_box(&mut frame, &bbox, COLOR_FIRE);

        assert_eq!(pixel(&frame, 2, 2), COLOR_FIRE);
        assert_eq!(pixel(&frame, 11, 11), COLOR_FIRE);
        // Interior stays untouched.
        assert_eq!(pixel(&frame, 7, 7), [0, 0, 0]);
    }

    #[test]
    fn out_of_bounds_box_is_clipped() {
        let mut frame = blank_frame(10, 10);
        let bbox = BoundingBox {
            x: -5.0,
            y: -5.0,
            w: 100.0,
            h: 100.0,
        };
        // Must not panic.
        draw_box(&mut frame, &bbox, COLOR_DEFAULT);
        assert_eq!(pixel(&frame, 0, 0), COLOR_DEFAULT);
    }
}
