//! Local video decoding using FFmpeg.
//!
//! Frames are converted to packed RGB24. Uploaded bytes are written to a
//! temporary file because the FFmpeg demuxer needs a seekable input.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use tempfile::NamedTempFile;

use super::{FrameSource, MediaPayload, SourceStats};
use crate::frame::{Frame, PixelLayout};

pub(crate) struct FfmpegFileSource {
    locator: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    eof_sent: bool,
    // Keeps the spooled upload alive while the demuxer reads it.
    _spool: Option<NamedTempFile>,
}

impl FfmpegFileSource {
    pub(crate) fn open(video: &MediaPayload) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let (path, spool) = match video {
            MediaPayload::Path(path) => (path.clone(), None),
            MediaPayload::Bytes(bytes) => {
                let mut spool = tempfile::Builder::new()
                    .prefix("parkwatch-video-")
                    .suffix(".mp4")
                    .tempfile()
                    .context("create temporary video file")?;
                spool
                    .write_all(bytes)
                    .context("write uploaded video to temporary file")?;
                spool.flush()?;
                (PathBuf::from(spool.path()), Some(spool))
            }
        };
        let locator = path.display().to_string();

        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video '{}' with ffmpeg", locator))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
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

        log::info!(
            "video source: {} ({}x{}, ffmpeg)",
            locator,
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            locator,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            eof_sent: false,
            _spool: spool,
        })
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        self.frame_count += 1;
        Frame::new(width, height, PixelLayout::Rgb8, pixels)
    }
}

impl FrameSource for FfmpegFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }
            let stream_index = self.stream_index;
            let next = self
                .input
                .packets()
                .find(|(stream, _)| stream.index() == stream_index)
                .map(|(_, packet)| packet);
            match next {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    self.decoder
                        .send_eof()
                        .context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn release(&mut self) {
        log::debug!(
            "video source {} released after {} frames",
            self.locator,
            self.frame_count
        );
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_decoded: self.frame_count,
            locator: self.locator.clone(),
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
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((packed.to_vec(), width, height));
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
