use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{annotate, overlay_text, RenderControl, Renderer};
use crate::pipeline::FrameBatch;

/// Writes each annotated batch as `frame_NNNNNN.jpg` into a directory.
pub struct SnapshotRenderer {
    dir: PathBuf,
    written: u64,
}

impl SnapshotRenderer {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
        Ok(Self { dir, written: 0 })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Renderer for SnapshotRenderer {
    fn render(&mut self, batch: &FrameBatch) -> Result<RenderControl> {
        let image = annotate(batch)?;
        let path = self.dir.join(format!("frame_{:06}.jpg", batch.frame_index));
        image
            .save(&path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        self.written += 1;
        log::info!(
            "frame {}: {} -> {}",
            batch.frame_index,
            overlay_text(&batch.summary()),
            path.display()
        );
        Ok(RenderControl::Continue)
    }
}
