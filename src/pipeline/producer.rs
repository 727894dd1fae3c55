use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};

use super::{FrameBatch, PipelineConfig, StopSignal};
use crate::classify::OccupancyClassifier;
use crate::error::describe;
use crate::ingest::FrameSource;
use crate::occupancy::{OccupancyState, SpotStatus};
use crate::schedule::DiffScheduler;
use crate::spots::SpotRegistry;

#[derive(Debug, Default)]
pub(super) struct ProducerReport {
    pub frames_read: u64,
    pub sampling_steps: u64,
    pub classifications: u64,
    pub enqueued: u64,
    pub dropped: u64,
    pub occupancy: Vec<SpotStatus>,
    pub stream_error: Option<String>,
    /// The source ran dry; false when the loop ended on the stop signal.
    pub end_of_stream: bool,
}

enum Enqueue {
    Sent,
    Dropped,
    Stopped,
    Disconnected,
}

/// Reads frames, runs the scheduler on sampling frames and feeds the queue.
/// Owns the sender; dropping it on return lets the consumer drain and exit.
pub(super) struct Producer<'a> {
    source: &'a mut dyn FrameSource,
    registry: Arc<SpotRegistry>,
    scheduler: DiffScheduler,
    classifier: &'a dyn OccupancyClassifier,
    state: OccupancyState,
    tx: Sender<FrameBatch>,
    stop: StopSignal,
    config: PipelineConfig,
}

impl<'a> Producer<'a> {
    pub fn new(
        source: &'a mut dyn FrameSource,
        registry: Arc<SpotRegistry>,
        scheduler: DiffScheduler,
        classifier: &'a dyn OccupancyClassifier,
        tx: Sender<FrameBatch>,
        stop: StopSignal,
        config: PipelineConfig,
    ) -> Self {
        let state = OccupancyState::new(registry.len());
        Self {
            source,
            registry,
            scheduler,
            classifier,
            state,
            tx,
            stop,
            config,
        }
    }

    pub fn run(mut self) -> ProducerReport {
        let mut report = ProducerReport::default();
        let mut frame_index: u64 = 0;

        while !self.stop.is_set() {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::debug!("end of stream after {} frames", report.frames_read);
                    report.end_of_stream = true;
                    break;
                }
                Err(err) => {
                    let detail = describe(&err);
                    log::error!("frame {}: decode failed: {}", frame_index, detail);
                    report.stream_error = Some(detail);
                    self.stop.trigger();
                    break;
                }
            };
            let index = frame_index;
            frame_index += 1;
            report.frames_read += 1;

            if !self.scheduler.is_sampling_frame(index) {
                continue;
            }

            let frame = Arc::new(frame);
            let step = self.scheduler.sample(
                index,
                frame.clone(),
                &self.registry,
                &mut self.state,
                self.classifier,
            );
            report.sampling_steps += 1;
            report.classifications += step.classified as u64;

            if self.stop.is_set() {
                break;
            }

            let batch = FrameBatch {
                frame_index: index,
                frame,
                registry: self.registry.clone(),
                occupancy: self.state.snapshot(),
            };
            match self.enqueue(batch) {
                Enqueue::Sent => report.enqueued += 1,
                Enqueue::Dropped => {
                    report.dropped += 1;
                    log::warn!(
                        "frame {}: render queue full for {:?}, batch dropped",
                        index,
                        self.config.enqueue_timeout
                    );
                }
                Enqueue::Stopped => break,
                Enqueue::Disconnected => {
                    log::debug!("render side gone, producer exiting");
                    break;
                }
            }
        }

        report.occupancy = self.state.snapshot();
        report
    }

    /// Block for queue space in poll-interval slices until the enqueue
    /// timeout runs out or the stop signal is set.
    fn enqueue(&self, batch: FrameBatch) -> Enqueue {
        let deadline = Instant::now() + self.config.enqueue_timeout;
        let mut pending = batch;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let result = if remaining.is_zero() {
                self.tx.try_send(pending).map_err(|err| match err {
                    TrySendError::Full(b) => SendTimeoutError::Timeout(b),
                    TrySendError::Disconnected(b) => SendTimeoutError::Disconnected(b),
                })
            } else {
                self.tx
                    .send_timeout(pending, remaining.min(self.config.poll_interval))
            };
            match result {
                Ok(()) => return Enqueue::Sent,
                Err(SendTimeoutError::Disconnected(_)) => return Enqueue::Disconnected,
                Err(SendTimeoutError::Timeout(b)) => {
                    if self.stop.is_set() {
                        return Enqueue::Stopped;
                    }
                    if remaining.is_zero() {
                        return Enqueue::Dropped;
                    }
                    pending = b;
                }
            }
        }
    }
}
