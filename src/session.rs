//! One end-to-end monitoring run.
//!
//! `SessionController::run` validates the request, extracts spot regions from
//! the mask, opens the video and drives a fresh `FramePipeline` to completion.
//! Every session gets its own registry, occupancy state, scheduler, queue and
//! stop signal; nothing carries over between sessions.

use std::sync::Arc;

use serde::Serialize;

use crate::classify::OccupancyClassifier;
use crate::error::{describe, SessionError};
use crate::ingest::{MediaPayload, VideoOpener};
use crate::mask::RegionExtractor;
use crate::occupancy::{OccupancySummary, SpotStatus};
use crate::pipeline::{FramePipeline, PipelineConfig, PipelineReport, StopSignal};
use crate::render::RendererFactory;
use crate::schedule::{DiffScheduler, SchedulerConfig};
use crate::spots::SpotRegistry;

pub const MESSAGE_COMPLETED: &str = "Video processing completed";
pub const MESSAGE_CANCELLED: &str = "Video processing cancelled";

/// External capabilities a session runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub video: Arc<dyn VideoOpener>,
    pub regions: Arc<dyn RegionExtractor>,
    pub classifier: Arc<dyn OccupancyClassifier>,
    pub renderer: Arc<dyn RendererFactory>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SessionConfig {
    pub scheduler: SchedulerConfig,
    pub pipeline: PipelineConfig,
}

/// Inputs for one session. Either payload may be missing; the controller
/// rejects that before touching any collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionRequest {
    pub video: Option<MediaPayload>,
    pub mask: Option<MediaPayload>,
}

impl SessionRequest {
    pub fn new(video: MediaPayload, mask: MediaPayload) -> Self {
        Self {
            video: Some(video),
            mask: Some(mask),
        }
    }
}

/// Completion summary returned to the caller.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionResult {
    pub message: String,
    pub total_spots: usize,
    pub cancelled: bool,
    pub frames_processed: u64,
    pub sampling_steps: u64,
    pub batches_rendered: u64,
    pub batches_dropped: u64,
    pub occupancy: OccupancySummary,
    pub spots: Vec<SpotStatus>,
}

impl SessionResult {
    fn from_report(total_spots: usize, report: PipelineReport) -> Self {
        let message = if report.cancelled {
            MESSAGE_CANCELLED
        } else {
            MESSAGE_COMPLETED
        };
        Self {
            message: message.to_string(),
            total_spots,
            cancelled: report.cancelled,
            frames_processed: report.frames_read,
            sampling_steps: report.sampling_steps,
            batches_rendered: report.batches_rendered,
            batches_dropped: report.batches_dropped,
            occupancy: report.summary,
            spots: report.occupancy,
        }
    }
}

pub struct SessionController {
    config: SessionConfig,
    collaborators: Collaborators,
}

impl SessionController {
    pub fn new(config: SessionConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run a session with its own, unreachable stop signal.
    pub fn run(&self, request: SessionRequest) -> Result<SessionResult, SessionError> {
        self.run_with_stop(request, StopSignal::new())
    }

    /// Run a session the caller can cancel through `stop`.
    pub fn run_with_stop(
        &self,
        request: SessionRequest,
        stop: StopSignal,
    ) -> Result<SessionResult, SessionError> {
        let video = request.video.filter(|v| !v.is_empty());
        let mask = request.mask.filter(|m| !m.is_empty());
        let (video, mask) = match (video, mask) {
            (Some(video), Some(mask)) => (video, mask),
            (None, None) => return Err(SessionError::InvalidInput("video and mask missing".into())),
            (None, Some(_)) => return Err(SessionError::InvalidInput("video missing".into())),
            (Some(_), None) => return Err(SessionError::InvalidInput("mask missing".into())),
        };

        let mask_bytes = mask
            .read_bytes()
            .map_err(|e| SessionError::InvalidMask(describe(&e)))?;
        let regions = self
            .collaborators
            .regions
            .extract(&mask_bytes)
            .map_err(|e| SessionError::InvalidMask(describe(&e)))?;
        let registry = Arc::new(SpotRegistry::build(regions)?);
        log::info!("session: {} parking spots", registry.len());

        let mut source = self
            .collaborators
            .video
            .open(&video)
            .map_err(|e| SessionError::VideoOpen(describe(&e)))?;

        let renderer = match self.collaborators.renderer.create() {
            Ok(renderer) => renderer,
            Err(e) => {
                source.release();
                return Err(SessionError::RenderFailure(describe(&e)));
            }
        };

        let scheduler = DiffScheduler::new(self.config.scheduler);
        log::info!(
            "session: step={} threshold={} classifier={}",
            scheduler.config().step,
            scheduler.config().threshold,
            self.collaborators.classifier.name()
        );

        let pipeline = FramePipeline::new(self.config.pipeline, stop);
        let outcome = pipeline.run(
            source.as_mut(),
            registry.clone(),
            scheduler,
            self.collaborators.classifier.as_ref(),
            renderer,
        );
        let stats = source.stats();
        source.release();

        let report = outcome?;
        log::info!(
            "session finished: {} frames from {}, {} sampling steps, {} rendered, {} dropped{}",
            stats.frames_decoded,
            stats.locator,
            report.sampling_steps,
            report.batches_rendered,
            report.batches_dropped,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(SessionResult::from_report(registry.len(), report))
    }
}
