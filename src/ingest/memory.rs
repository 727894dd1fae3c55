use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Replays a fixed list of frames, optionally pacing each read.
pub struct MemorySource {
    frames: VecDeque<Frame>,
    read_delay: Option<Duration>,
    frame_count: u64,
    released: bool,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            read_delay: None,
            frame_count: 0,
            released: false,
        }
    }

    /// Sleep for `delay` before each read, to mimic decode latency.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.frame_count += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) {
        self.frames.clear();
        self.released = true;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_decoded: self.frame_count,
            locator: "memory".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelLayout;

    #[test]
    fn replays_in_order_then_ends() {
        let frames = vec![
            Frame::filled(2, 2, PixelLayout::Gray8, 1),
            Frame::filled(2, 2, PixelLayout::Gray8, 2),
        ];
        let mut source = MemorySource::new(frames);
        assert_eq!(source.next_frame().unwrap().unwrap().pixels()[0], 1);
        assert_eq!(source.next_frame().unwrap().unwrap().pixels()[0], 2);
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_decoded, 2);
        source.release();
        assert!(source.is_released());
    }
}
