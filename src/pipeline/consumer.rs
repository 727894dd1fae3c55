use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use super::{FrameBatch, StopSignal};
use crate::error::describe;
use crate::render::{RenderControl, Renderer};

#[derive(Debug, Default)]
pub(super) struct ConsumerReport {
    pub rendered: u64,
    pub quit: bool,
    pub failure: Option<String>,
}

/// Render-thread side. Exits when the stop signal is set (after the batch in
/// hand), or when the producer hung up and the queue is drained.
pub(super) struct Consumer {
    rx: Receiver<FrameBatch>,
    renderer: Box<dyn Renderer>,
    stop: StopSignal,
    poll_interval: Duration,
}

impl Consumer {
    pub fn new(
        rx: Receiver<FrameBatch>,
        renderer: Box<dyn Renderer>,
        stop: StopSignal,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rx,
            renderer,
            stop,
            poll_interval,
        }
    }

    pub fn run(mut self) -> ConsumerReport {
        let mut report = ConsumerReport::default();
        while !self.stop.is_set() {
            let batch = match self.rx.recv_timeout(self.poll_interval) {
                Ok(batch) => batch,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            match self.renderer.render(&batch) {
                Ok(RenderControl::Continue) => report.rendered += 1,
                Ok(RenderControl::Quit) => {
                    report.rendered += 1;
                    report.quit = true;
                    log::info!("renderer requested stop at frame {}", batch.frame_index);
                    self.stop.trigger();
                }
                Err(err) => {
                    let detail = describe(&err);
                    log::error!("frame {}: render failed: {}", batch.frame_index, detail);
                    report.failure = Some(detail);
                    self.stop.trigger();
                }
            }
        }
        report
    }
}
