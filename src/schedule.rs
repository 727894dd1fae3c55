//! Diff-driven classification scheduling.
//!
//! Running the occupancy classifier on every spot of every frame is the
//! expensive path. The scheduler samples every `step`-th frame and, once a
//! previous sample exists, only re-classifies spots whose mean-intensity change
//! is large relative to the largest change seen across the lot in that step:
//!
//! ```text
//! diff_i = |mean(crop_i(current)) - mean(crop_i(previous))|
//! candidate  <=>  diff_i / max(diff) > threshold
//! ```
//!
//! Spots without a defined diff (crop out of bounds or empty in either frame)
//! are never candidates. When the largest diff is zero nothing is selected.

use std::sync::Arc;

use crate::classify::OccupancyClassifier;
use crate::frame::Frame;
use crate::occupancy::{OccupancyState, SpotStatus};
use crate::spots::SpotRegistry;

pub const DEFAULT_STEP: u64 = 30;
pub const DEFAULT_THRESHOLD: f64 = 0.4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Sampling stride in frames. Must be at least 1.
    pub step: u64,
    /// Ratio threshold in `[0, 1)`.
    pub threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Candidate selection for one sampling step.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    /// Spot indices to classify, ascending.
    pub candidates: Vec<usize>,
    /// Per-spot diff score; empty on the first sample.
    pub diffs: Vec<Option<f64>>,
    pub max_diff: Option<f64>,
    pub first_sample: bool,
}

/// Outcome of one sampling step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    pub frame_index: u64,
    pub candidates: Vec<usize>,
    /// Classifier invocations that produced a verdict.
    pub classified: usize,
    /// Candidates without a valid crop in the current frame.
    pub skipped: usize,
    /// Classifier invocations that returned an error.
    pub failed: usize,
    /// Statuses that changed value.
    pub changed: usize,
}

/// Per-session scheduler. Owns the previous sampled frame.
pub struct DiffScheduler {
    config: SchedulerConfig,
    previous: Option<Arc<Frame>>,
}

impl DiffScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config: SchedulerConfig {
                step: config.step.max(1),
                ..config
            },
            previous: None,
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// Frame 0 is never sampled; afterwards every `step`-th frame is.
    pub fn is_sampling_frame(&self, frame_index: u64) -> bool {
        frame_index > 0 && frame_index % self.config.step == 0
    }

    /// Diff score per spot against the previous sampled frame. Empty when no
    /// previous frame exists.
    pub fn diff_scores(&self, current: &Frame, registry: &SpotRegistry) -> Vec<Option<f64>> {
        let Some(previous) = self.previous.as_deref() else {
            return Vec::new();
        };
        registry
            .iter()
            .map(|spot| {
                let now = current.crop(spot)?;
                let before = previous.crop(spot)?;
                Some((now.mean_intensity() - before.mean_intensity()).abs())
            })
            .collect()
    }

    /// Choose the spots to classify for `current`.
    pub fn select(&self, current: &Frame, registry: &SpotRegistry) -> Selection {
        if self.previous.is_none() {
            return Selection {
                candidates: (0..registry.len()).collect(),
                diffs: Vec::new(),
                max_diff: None,
                first_sample: true,
            };
        }
        let diffs = self.diff_scores(current, registry);
        let max_diff = max_defined(&diffs);
        Selection {
            candidates: select_by_ratio(&diffs, self.config.threshold),
            diffs,
            max_diff,
            first_sample: false,
        }
    }

    /// Run one sampling step: select, classify candidates into `state`, then
    /// keep `frame` as the previous sample.
    pub fn sample(
        &mut self,
        frame_index: u64,
        frame: Arc<Frame>,
        registry: &SpotRegistry,
        state: &mut OccupancyState,
        classifier: &dyn OccupancyClassifier,
    ) -> StepReport {
        let selection = self.select(&frame, registry);
        let mut report = StepReport {
            frame_index,
            ..StepReport::default()
        };

        for &index in &selection.candidates {
            let Some(crop) = registry.get(index).and_then(|spot| frame.crop(spot)) else {
                report.skipped += 1;
                continue;
            };
            match classifier.classify(&crop) {
                Ok(occupied) => {
                    report.classified += 1;
                    if state.set(index, SpotStatus::from_verdict(occupied)) {
                        report.changed += 1;
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    log::warn!(
                        "classifier {} failed on spot {} at frame {}: {:#}",
                        classifier.name(),
                        index,
                        frame_index,
                        err
                    );
                }
            }
        }

        log::debug!(
            "frame {}: {} candidates (first={}, max_diff={:?}), {} classified, {} changed",
            frame_index,
            selection.candidates.len(),
            selection.first_sample,
            selection.max_diff,
            report.classified,
            report.changed
        );

        report.candidates = selection.candidates;
        self.previous = Some(frame);
        report
    }
}

fn max_defined(diffs: &[Option<f64>]) -> Option<f64> {
    diffs.iter().flatten().copied().reduce(f64::max)
}

/// Indices whose diff exceeds `threshold` times the largest defined diff.
///
/// Returns nothing when no diff is defined or the largest diff is zero.
pub fn select_by_ratio(diffs: &[Option<f64>], threshold: f64) -> Vec<usize> {
    let Some(max_diff) = max_defined(diffs) else {
        return Vec::new();
    };
    if max_diff <= 0.0 {
        return Vec::new();
    }
    diffs
        .iter()
        .enumerate()
        .filter_map(|(index, diff)| match diff {
            Some(d) if d / max_diff > threshold => Some(index),
            _ => None,
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Crop, PixelLayout};
    use crate::spots::ParkingSpot;
    use anyhow::{anyhow, Result};
    use std::sync::Mutex;

    /// Records which spots it saw; verdict is "mean above 128".
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<ParkingSpot>>,
    }

    impl OccupancyClassifier for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn classify(&self, crop: &Crop<'_>) -> Result<bool> {
            self.seen.lock().unwrap().push(*crop.spot());
            Ok(crop.mean_intensity() > 128.0)
        }
    }

    impl Recording {
        fn take(&self) -> Vec<ParkingSpot> {
            std::mem::take(&mut *self.seen.lock().unwrap())
        }
    }

    struct Failing;

    impl OccupancyClassifier for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn classify(&self, _crop: &Crop<'_>) -> Result<bool> {
            Err(anyhow!("model unavailable"))
        }
    }

    /// Three 10x10 spots side by side in a 30x10 gray frame.
    fn registry() -> SpotRegistry {
        SpotRegistry::build(vec![
            ParkingSpot::new(0, 0, 10, 10),
            ParkingSpot::new(10, 0, 10, 10),
            ParkingSpot::new(20, 0, 10, 10),
        ])
        .unwrap()
    }

    fn frame(values: [u8; 3]) -> Arc<Frame> {
        let mut frame = Frame::filled(30, 10, PixelLayout::Gray8, 0);
        for (i, px) in frame.pixels_mut().iter_mut().enumerate() {
            *px = values[(i % 30) / 10];
        }
        Arc::new(frame)
    }

    #[test]
    fn sampling_frames_skip_zero_and_follow_step() {
        let scheduler = DiffScheduler::new(SchedulerConfig::default());
        let sampled: Vec<u64> = (0..=90).filter(|&i| scheduler.is_sampling_frame(i)).collect();
        assert_eq!(sampled, vec![30, 60, 90]);
    }

    #[test]
    fn zero_step_is_clamped() {
        let scheduler = DiffScheduler::new(SchedulerConfig {
            step: 0,
            threshold: 0.4,
        });
        assert!(scheduler.is_sampling_frame(1));
        assert!(!scheduler.is_sampling_frame(0));
    }

    #[test]
    fn first_sample_selects_every_spot() {
        let scheduler = DiffScheduler::new(SchedulerConfig::default());
        let selection = scheduler.select(&frame([10, 20, 30]), &registry());
        assert!(selection.first_sample);
        assert_eq!(selection.candidates, vec![0, 1, 2]);
        assert!(selection.diffs.is_empty());
    }

    #[test]
    fn ratio_selection_matches_reference_example() {
        let diffs = [Some(0.1), Some(0.5), Some(0.05)];
        assert_eq!(select_by_ratio(&diffs, 0.4), vec![1]);
    }

    #[test]
    fn ratio_exactly_at_threshold_is_not_selected() {
        let diffs = [Some(0.4), Some(1.0)];
        assert_eq!(select_by_ratio(&diffs, 0.4), vec![1]);
    }

    #[test]
    fn zero_max_diff_selects_nothing() {
        assert!(select_by_ratio(&[Some(0.0), Some(0.0)], 0.4).is_empty());
        assert!(select_by_ratio(&[None, None], 0.4).is_empty());
        assert!(select_by_ratio(&[], 0.4).is_empty());
    }

    #[test]
    fn undefined_diffs_are_never_candidates() {
        let diffs = [None, Some(3.0), None, Some(2.0)];
        assert_eq!(select_by_ratio(&diffs, 0.4), vec![1, 3]);
    }

    #[test]
    fn sample_reclassifies_only_large_relative_changes() {
        let registry = registry();
        let mut state = OccupancyState::new(registry.len());
        let classifier = Recording::default();
        let mut scheduler = DiffScheduler::new(SchedulerConfig::default());

        let first = scheduler.sample(30, frame([100, 100, 100]), &registry, &mut state, &classifier);
        assert_eq!(first.candidates, vec![0, 1, 2]);
        assert_eq!(classifier.take().len(), 3);
        assert_eq!(state.snapshot(), vec![SpotStatus::Empty; 3]);

        // diffs 10 / 50 / 5 -> ratios 0.2 / 1.0 / 0.1
        let second = scheduler.sample(60, frame([110, 150, 105]), &registry, &mut state, &classifier);
        assert_eq!(second.candidates, vec![1]);
        assert_eq!(classifier.take(), vec![*registry.get(1).unwrap()]);
        assert_eq!(
            state.snapshot(),
            vec![SpotStatus::Empty, SpotStatus::Occupied, SpotStatus::Empty]
        );
        assert_eq!(second.changed, 1);
    }

    #[test]
    fn static_scene_selects_nothing_but_advances_previous() {
        let registry = registry();
        let mut state = OccupancyState::new(registry.len());
        let classifier = Recording::default();
        let mut scheduler = DiffScheduler::new(SchedulerConfig::default());

        scheduler.sample(30, frame([200, 50, 200]), &registry, &mut state, &classifier);
        classifier.take();
        let before = state.snapshot();

        let report = scheduler.sample(60, frame([200, 50, 200]), &registry, &mut state, &classifier);
        assert!(report.candidates.is_empty());
        assert!(classifier.take().is_empty());
        assert_eq!(state.snapshot(), before);
        assert!(scheduler.has_previous());
    }

    #[test]
    fn out_of_bounds_spot_is_skipped_and_keeps_unknown() {
        let registry = SpotRegistry::build(vec![
            ParkingSpot::new(0, 0, 10, 10),
            ParkingSpot::new(25, 0, 10, 10),
        ])
        .unwrap();
        let mut state = OccupancyState::new(registry.len());
        let classifier = Recording::default();
        let mut scheduler = DiffScheduler::new(SchedulerConfig::default());

        let first = scheduler.sample(30, frame([0, 0, 0]), &registry, &mut state, &classifier);
        assert_eq!(first.skipped, 1);
        let second = scheduler.sample(60, frame([90, 90, 90]), &registry, &mut state, &classifier);
        assert_eq!(second.candidates, vec![0]);
        assert_eq!(scheduler.diff_scores(&frame([0, 0, 0]), &registry)[1], None);
        assert_eq!(state.get(1), Some(SpotStatus::Unknown));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn classifier_errors_keep_previous_status() {
        let registry = registry();
        let mut state = OccupancyState::new(registry.len());
        let mut scheduler = DiffScheduler::new(SchedulerConfig::default());

        let report = scheduler.sample(30, frame([1, 2, 3]), &registry, &mut state, &Failing);
        assert_eq!(report.failed, 3);
        assert_eq!(report.classified, 0);
        assert_eq!(state.snapshot(), vec![SpotStatus::Unknown; 3]);
    }
}
