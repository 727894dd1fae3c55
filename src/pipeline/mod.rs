//! Producer/consumer frame pipeline.
//!
//! The producer (calling thread) decodes frames, runs the scheduler on
//! sampling frames and enqueues a `FrameBatch` snapshot. The consumer (a
//! spawned render thread) dequeues batches in order and renders them. The
//! two sides share only the bounded channel and the session's `StopSignal`.
//!
//! Enqueue policy: block with timeout. The producer waits for queue space in
//! poll-interval slices, re-checking the stop signal, and drops the new batch
//! once `enqueue_timeout` has elapsed. A slow renderer therefore costs
//! batches, never analysis progress.

mod consumer;
mod producer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::bounded;

use crate::classify::OccupancyClassifier;
use crate::error::SessionError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::occupancy::{OccupancySummary, SpotStatus};
use crate::render::Renderer;
use crate::schedule::DiffScheduler;
use crate::spots::SpotRegistry;

use consumer::Consumer;
use producer::Producer;

pub const DEFAULT_QUEUE_CAPACITY: usize = 8;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(2);

// ----------------------------------------------------------------------------
// StopSignal
// ----------------------------------------------------------------------------

/// Cooperative cancellation flag for one session.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// FrameBatch
// ----------------------------------------------------------------------------

/// Snapshot handed from the producer to the renderer. Never mutated after it
/// is enqueued.
#[derive(Clone, Debug)]
pub struct FrameBatch {
    pub frame_index: u64,
    pub frame: Arc<Frame>,
    pub registry: Arc<SpotRegistry>,
    /// Occupancy at the time the batch was produced, indexed like `registry`.
    pub occupancy: Vec<SpotStatus>,
}

impl FrameBatch {
    pub fn summary(&self) -> OccupancySummary {
        OccupancySummary::from_statuses(&self.occupancy)
    }
}

// ----------------------------------------------------------------------------
// Pipeline
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    /// Dequeue poll interval; also the slice the producer waits in.
    pub poll_interval: Duration,
    /// Longest the producer waits for queue space before dropping a batch.
    pub enqueue_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }
}

/// Counters and final state of one pipeline run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineReport {
    pub frames_read: u64,
    pub sampling_steps: u64,
    pub classifications: u64,
    pub batches_enqueued: u64,
    pub batches_dropped: u64,
    pub batches_rendered: u64,
    pub occupancy: Vec<SpotStatus>,
    pub summary: OccupancySummary,
    /// The stop signal ended the run before end of stream. A stop raised
    /// after the last frame was read does not count.
    pub cancelled: bool,
}

/// One-shot pipeline for a single session.
pub struct FramePipeline {
    config: PipelineConfig,
    stop: StopSignal,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig, stop: StopSignal) -> Self {
        Self { config, stop }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run the producer on this thread and the renderer on a spawned thread,
    /// until end of stream, cancellation or failure. The render thread is
    /// always joined before returning.
    pub fn run(
        self,
        source: &mut dyn FrameSource,
        registry: Arc<SpotRegistry>,
        scheduler: DiffScheduler,
        classifier: &dyn OccupancyClassifier,
        renderer: Box<dyn Renderer>,
    ) -> Result<PipelineReport, SessionError> {
        let (tx, rx) = bounded::<FrameBatch>(self.config.queue_capacity.max(1));

        let consumer = Consumer::new(rx, renderer, self.stop.clone(), self.config.poll_interval);
        let render_thread = std::thread::Builder::new()
            .name("parkwatch-render".to_string())
            .spawn(move || consumer.run())
            .map_err(|e| SessionError::RenderFailure(format!("failed to spawn render thread: {e}")))?;

        let producer = Producer::new(
            source,
            registry,
            scheduler,
            classifier,
            tx,
            self.stop.clone(),
            self.config,
        );
        let produced = producer.run();

        let rendered = render_thread
            .join()
            .map_err(|_| SessionError::RenderFailure("render thread panicked".to_string()))?;

        if let Some(failure) = rendered.failure {
            return Err(SessionError::RenderFailure(failure));
        }
        if let Some(failure) = produced.stream_error {
            return Err(SessionError::StreamFailure(failure));
        }
        if rendered.quit {
            log::info!(
                "session stopped by renderer after {} batches",
                rendered.rendered
            );
        }

        let summary = OccupancySummary::from_statuses(&produced.occupancy);
        Ok(PipelineReport {
            frames_read: produced.frames_read,
            sampling_steps: produced.sampling_steps,
            classifications: produced.classifications,
            batches_enqueued: produced.enqueued,
            batches_dropped: produced.dropped,
            batches_rendered: rendered.rendered,
            occupancy: produced.occupancy,
            summary,
            cancelled: !produced.end_of_stream,
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
