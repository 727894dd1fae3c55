//! Local video sources.
//!
//! `FileVideoOpener` accepts:
//! - `stub://name?frames=N&width=W&height=H&layout=gray|rgb`: deterministic
//!   synthetic stream, for tests and demos. Always honoured as a path; as
//!   uploaded bytes only when synthetic uploads are enabled.
//! - a local file path or uploaded bytes: decoded with FFmpeg
//!   (feature: ingest-file-ffmpeg). Uploaded bytes are spooled to a temporary
//!   file first, which lives as long as the source.
//!
//! Remote URLs are rejected.

use anyhow::{anyhow, Context, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{FrameSource, MediaPayload, SourceStats, VideoOpener};
use crate::frame::{Frame, PixelLayout};

const DEFAULT_STUB_FRAMES: u64 = 300;
const DEFAULT_STUB_WIDTH: u32 = 640;
const DEFAULT_STUB_HEIGHT: u32 = 480;
const MAX_STUB_DIMENSION: u32 = 4096;
const MAX_STUB_FRAMES: u64 = 100_000;

/// Opens local video payloads.
#[derive(Clone, Debug, Default)]
pub struct FileVideoOpener {
    synthetic_uploads: bool,
}

impl FileVideoOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `stub://` locators sent as uploaded bytes.
    pub fn with_synthetic_uploads(mut self, enabled: bool) -> Self {
        self.synthetic_uploads = enabled;
        self
    }
}

impl VideoOpener for FileVideoOpener {
    fn open(&self, video: &MediaPayload) -> Result<Box<dyn FrameSource>> {
        if video.is_empty() {
            return Err(anyhow!("video payload is empty"));
        }
        if let Some(locator) = video.stub_locator() {
            if matches!(video, MediaPayload::Bytes(_)) && !self.synthetic_uploads {
                return Err(anyhow!("synthetic stub:// uploads are disabled"));
            }
            let source = SyntheticSource::parse(&locator)?;
            log::info!("video source: {} (synthetic)", locator);
            return Ok(Box::new(source));
        }
        if let MediaPayload::Path(path) = video {
            let text = path.to_string_lossy();
            if text.contains("://") {
                return Err(anyhow!(
                    "video ingestion only supports local paths (no URL schemes)"
                ));
            }
        }
        open_decoded(video)
    }
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_decoded(video: &MediaPayload) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(FfmpegFileSource::open(video)?))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_decoded(_video: &MediaPayload) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "video decoding requires the ingest-file-ffmpeg feature"
    ))
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

/// Deterministic synthetic stream. The scene changes every 50 frames, which
/// shifts a block pattern so that spot crops see uneven intensity changes.
pub struct SyntheticSource {
    locator: String,
    frames: u64,
    width: u32,
    height: u32,
    layout: PixelLayout,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn parse(locator: &str) -> Result<Self> {
        let rest = locator
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic locator must start with stub://"))?;
        let mut source = Self {
            locator: locator.to_string(),
            frames: DEFAULT_STUB_FRAMES,
            width: DEFAULT_STUB_WIDTH,
            height: DEFAULT_STUB_HEIGHT,
            layout: PixelLayout::Rgb8,
            frame_count: 0,
        };
        let Some((_, query)) = rest.split_once('?') else {
            return Ok(source);
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            match key {
                "frames" => {
                    source.frames = value.parse().context("stub frames must be an integer")?
                }
                "width" => source.width = value.parse().context("stub width must be an integer")?,
                "height" => {
                    source.height = value.parse().context("stub height must be an integer")?
                }
                "layout" => {
                    source.layout = match value {
                        "gray" => PixelLayout::Gray8,
                        "rgb" => PixelLayout::Rgb8,
                        other => return Err(anyhow!("unknown stub layout '{}'", other)),
                    }
                }
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if source.width == 0 || source.height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }
        if source.width > MAX_STUB_DIMENSION || source.height > MAX_STUB_DIMENSION {
            return Err(anyhow!(
                "stub frame size {}x{} exceeds {}x{}",
                source.width,
                source.height,
                MAX_STUB_DIMENSION,
                MAX_STUB_DIMENSION
            ));
        }
        if source.frames > MAX_STUB_FRAMES {
            return Err(anyhow!(
                "stub frame count {} exceeds {}",
                source.frames,
                MAX_STUB_FRAMES
            ));
        }
        Ok(source)
    }

    fn generate(&self, frame_number: u64) -> Result<Frame> {
        let scene_state = frame_number / 50;
        let channels = self.layout.channels();
        let len = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(channels))
            .ok_or_else(|| anyhow!("stub frame dimensions overflow"))?;
        let mut pixels = Vec::with_capacity(len);
        for y in 0..self.height as u64 {
            for x in 0..self.width as u64 {
                let block = (x / 32) * 7 + (y / 32) * 13;
                let value = ((block * 37 + scene_state * (block % 5) * 53) % 256) as u8;
                for _ in 0..channels {
                    pixels.push(value);
                }
            }
        }
        Frame::new(self.width, self.height, self.layout, pixels)
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count >= self.frames {
            return Ok(None);
        }
        let frame = self.generate(self.frame_count)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_decoded: self.frame_count,
            locator: self.locator.clone(),
        }
    }
}
