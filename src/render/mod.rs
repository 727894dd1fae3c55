//! Render side of the pipeline.
//!
//! The consumer thread hands every dequeued `FrameBatch` to a `Renderer`.
//! A renderer may ask to stop the session (`RenderControl::Quit`), which is
//! how an operator cancels a run. A renderer error ends the session.

mod annotate;
mod snapshot;

use anyhow::Result;

use crate::occupancy::OccupancySummary;
use crate::pipeline::FrameBatch;

pub use annotate::{
    annotate, OVERLAY_TEXT_RGB, STATUS_EMPTY_RGB, STATUS_OCCUPIED_RGB, STATUS_UNKNOWN_RGB,
};
pub use snapshot::SnapshotRenderer;

/// What the consumer should do after a batch was rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderControl {
    Continue,
    /// Operator asked to stop the session.
    Quit,
}

/// Consumes frame batches on the render thread.
pub trait Renderer: Send {
    fn render(&mut self, batch: &FrameBatch) -> Result<RenderControl>;
}

/// Creates one renderer per session.
pub trait RendererFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Renderer>>;
}

impl<F> RendererFactory for F
where
    F: Fn() -> Result<Box<dyn Renderer>> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn Renderer>> {
        self()
    }
}

/// Overlay line shown on every rendered frame.
pub fn overlay_text(summary: &OccupancySummary) -> String {
    format!("Available spots: {} / {}", summary.available, summary.total)
}

/// Headless renderer: logs the overlay line for each batch.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last_line: Option<String>,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, batch: &FrameBatch) -> Result<RenderControl> {
        let line = overlay_text(&batch.summary());
        if self.last_line.as_deref() != Some(line.as_str()) {
            log::info!("frame {}: {}", batch.frame_index, line);
        } else {
            log::debug!("frame {}: {}", batch.frame_index, line);
        }
        self.last_line = Some(line);
        Ok(RenderControl::Continue)
    }
}

/// Wraps a renderer and requests a stop after `limit` batches.
pub struct StopAfter {
    inner: Box<dyn Renderer>,
    limit: u64,
    rendered: u64,
}

impl StopAfter {
    pub fn new(inner: Box<dyn Renderer>, limit: u64) -> Self {
        Self {
            inner,
            limit,
            rendered: 0,
        }
    }
}

impl Renderer for StopAfter {
    fn render(&mut self, batch: &FrameBatch) -> Result<RenderControl> {
        let control = self.inner.render(batch)?;
        self.rendered += 1;
        if self.rendered >= self.limit {
            log::info!("render limit of {} batches reached, stopping", self.limit);
            return Ok(RenderControl::Quit);
        }
        Ok(control)
    }
}
