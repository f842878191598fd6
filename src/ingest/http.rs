//! HTTP frame source.
//!
//! `HttpSource` ingests frames from IP cameras that serve MJPEG multipart
//! streams or single-JPEG snapshot endpoints over HTTP. JPEG frames are
//! decoded in-memory to RGB24 and timestamped against the connect instant.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::{Duration, Instant};

use image::GenericImageView;
use url::Url;

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for an HTTP camera source.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Stream URL. http(s):// serving MJPEG multipart or single JPEGs.
    pub url: String,
    /// Target frame rate. The source decimates to this rate; zero means
    /// deliver every received frame.
    pub target_fps: u32,
}

/// HTTP camera frame source.
pub struct HttpSource {
    config: HttpConfig,
    stream: Option<HttpStream>,
    connected_at: Option<Instant>,
    last_frame_at: Option<Instant>,
    last_timestamp: Option<Duration>,
    frame_count: u64,
    last_error: Option<String>,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

impl HttpSource {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let url = Url::parse(&config.url).context("parse http source url")?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported http source scheme '{}'; expected http or https",
                    other
                ))
            }
        }
        Ok(Self {
            config,
            stream: None,
            connected_at: None,
            last_frame_at: None,
            last_timestamp: None,
            frame_count: 0,
            last_error: None,
        })
    }
}

impl FrameSource for HttpSource {
    fn connect(&mut self) -> Result<()> {
        let response = ureq::get(&self.config.url)
            .call()
            .context("connect to http camera stream")?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(reader)));
        } else {
            self.stream = Some(HttpStream::SingleJpeg);
        }
        self.connected_at = Some(Instant::now());
        log::info!("HttpSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("http source not connected; call connect() first"))?;
        let connected_at = self
            .connected_at
            .ok_or_else(|| anyhow!("http source not connected; call connect() first"))?;
        let min_interval = frame_interval(self.config.target_fps);

        loop {
            let jpeg_bytes = match stream {
                HttpStream::Mjpeg(stream) => match stream.read_next_jpeg()? {
                    Some(bytes) => bytes,
                    None => return Ok(None),
                },
                HttpStream::SingleJpeg => fetch_single_jpeg(&self.config.url)?,
            };

            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    continue;
                }
            }

            let (pixels, width, height) = match decode_jpeg(&jpeg_bytes) {
                Ok(decoded) => decoded,
                Err(e) => {
                    self.last_error = Some(e.to_string());
                    return Err(e);
                }
            };

            self.frame_count += 1;
            self.last_frame_at = Some(now);

            let mut timestamp = now.duration_since(connected_at);
            if let Some(last) = self.last_timestamp {
                if timestamp <= last {
                    timestamp = last + Duration::from_micros(1);
                }
            }
            self.last_timestamp = Some(timestamp);

            let frame = Frame::new(pixels, width, height, timestamp, self.frame_count)?;
            return Ok(Some(frame));
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= health_grace(self.config.target_fps)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    /// Read until a complete JPEG is buffered. `Ok(None)` when the stream
    /// has ended.
    fn read_next_jpeg(&mut self) -> Result<Option<Vec<u8>>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(Some(frame));
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            // Runaway buffer without a frame boundary: keep only the last
            // two bytes so a marker split across chunks still matches.
            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let tail = self.buffer.split_off(self.buffer.len() - 2);
                self.buffer = tail;
            }
        }
    }
}

fn fetch_single_jpeg(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    let (width, height) = image.dimensions();
    let rgb = image.into_rgb8();
    Ok((rgb.into_raw(), width, height))
}

/// Locate one complete JPEG (SOI..EOI inclusive) in the buffer.
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}

fn frame_interval(target_fps: u32) -> Duration {
    match target_fps {
        0 => Duration::ZERO,
        fps => Duration::from_millis((1000 / fps).max(1) as u64),
    }
}

/// How long the source may go without a frame before it reports unhealthy:
/// six frame intervals, floored at two seconds.
fn health_grace(target_fps: u32) -> Duration {
    let six_frames = frame_interval(target_fps).saturating_mul(6);
    six_frames.max(Duration::from_secs(2))
}
