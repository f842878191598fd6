//! Local file frame source using FFmpeg.
//!
//! FFmpeg-backed decoder for real video files. Frames are scaled to RGB24
//! in-memory and timestamped from their presentation timestamps, rebased so
//! the first frame is at zero.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use std::time::Duration;

use super::file::FileConfig;
use super::SourceStats;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    /// Seconds per PTS unit for the video stream.
    time_base: f64,
    first_pts: Option<i64>,
    last_timestamp: Option<Duration>,
    frame_count: u64,
    eof_sent: bool,
    drained: bool,
    last_error: Option<String>,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let time_base = f64::from(input_stream.time_base());
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            time_base,
            first_pts: None,
            last_timestamp: None,
            frame_count: 0,
            eof_sent: false,
            drained: false,
            last_error: None,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: connected to {} (ffmpeg)", self.config.path);
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.drained {
            return Ok(None);
        }

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        loop {
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                if let Some(frame) = self.emit(&decoded, &mut rgb_frame)? {
                    return Ok(Some(frame));
                }
            }

            if self.eof_sent {
                // Decoder is flushed and empty: the stream is exhausted.
                self.drained = true;
                return Ok(None);
            }

            let mut sent_packet = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                sent_packet = true;
                break;
            }

            if !sent_packet {
                self.decoder
                    .send_eof()
                    .context("flush ffmpeg decoder at end of file")?;
                self.eof_sent = true;
            }
        }
    }

    fn emit(
        &mut self,
        decoded: &ffmpeg::frame::Video,
        rgb_frame: &mut ffmpeg::frame::Video,
    ) -> Result<Option<Frame>> {
        let timestamp = self.frame_timestamp(decoded);
        if self.decimated(timestamp) {
            return Ok(None);
        }

        self.scaler
            .run(decoded, rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(rgb_frame)?;

        self.frame_count += 1;
        self.last_timestamp = Some(timestamp);
        let frame = Frame::new(pixels, width, height, timestamp, self.frame_count)?;
        Ok(Some(frame))
    }

    fn frame_timestamp(&mut self, decoded: &ffmpeg::frame::Video) -> Duration {
        let pts = decoded.pts();
        let timestamp = match pts {
            Some(pts) => {
                let first = *self.first_pts.get_or_insert(pts);
                let secs = (pts - first) as f64 * self.time_base;
                Duration::from_secs_f64(secs.max(0.0))
            }
            // No PTS: fall back to counting at the target rate.
            None => {
                let fps = self.config.target_fps.max(1) as f64;
                Duration::from_secs_f64(self.frame_count as f64 / fps)
            }
        };
        // Never let a bad PTS move time backwards.
        match self.last_timestamp {
            Some(last) if timestamp <= last => last + Duration::from_micros(1),
            _ => timestamp,
        }
    }

    fn decimated(&self, timestamp: Duration) -> bool {
        if self.config.target_fps == 0 {
            return false;
        }
        let interval = Duration::from_secs_f64(1.0 / self.config.target_fps as f64);
        match self.last_timestamp {
            Some(last) => timestamp < last + interval,
            None => false,
        }
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.path.clone(),
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
