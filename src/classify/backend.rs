use anyhow::Result;

use crate::frame::Crop;

/// Binary occupied/empty predicate over a spot crop.
///
/// Implementations are shared across the producer thread and must not keep
/// per-call state that changes later verdicts. The crop borrows frame pixels
/// for the duration of the call only.
pub trait OccupancyClassifier: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the spot in `crop` is occupied.
    fn classify(&self, crop: &Crop<'_>) -> Result<bool>;

    /// Optional warm-up hook, run once before a session streams frames.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}
