//! Video frame sources.
//!
//! A session reads frames through two narrow traits:
//! - `VideoOpener`: turns the uploaded (or local) video payload into a source
//! - `FrameSource`: sequential decoder, `next_frame` until end of stream
//!
//! Provided implementations:
//! - `FileVideoOpener`: synthetic `stub://` streams, FFmpeg decoding
//!   (feature: ingest-file-ffmpeg)
//! - `MemorySource`: replays frames held in memory
//!
//! Sources are owned by the producer thread of one session and released when
//! the session ends.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::frame::Frame;

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod memory;

pub use file::FileVideoOpener;
pub use memory::MemorySource;

/// Media handed to a session: a local path or raw uploaded bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaPayload {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl MediaPayload {
    /// Read the payload fully into memory.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match self {
            MediaPayload::Path(path) => std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display())),
            MediaPayload::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MediaPayload::Path(path) => path.as_os_str().is_empty(),
            MediaPayload::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// `stub://` locator, when the payload names a synthetic stream.
    pub(crate) fn stub_locator(&self) -> Option<String> {
        let text = match self {
            MediaPayload::Path(path) => path.to_str()?.trim().to_string(),
            MediaPayload::Bytes(bytes) => {
                if !bytes.starts_with(b"stub://") {
                    return None;
                }
                std::str::from_utf8(bytes).ok()?.trim().to_string()
            }
        };
        text.starts_with("stub://").then_some(text)
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_decoded: u64,
    pub locator: String,
}

/// Sequential frame decoder. Used only by the thread that opened it.
pub trait FrameSource {
    /// Next decoded frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release decoder resources. Called once when the session ends.
    fn release(&mut self) {}

    fn stats(&self) -> SourceStats;
}

/// Opens a frame source for a video payload.
pub trait VideoOpener: Send + Sync {
    fn open(&self, video: &MediaPayload) -> Result<Box<dyn FrameSource>>;
}
