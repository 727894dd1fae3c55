//! parkwatch: parking spot occupancy monitor
//!
//! Watches a fixed camera over a parking lot and keeps a per-spot
//! occupied/empty status, annotating frames for display.
//!
//! # Architecture
//!
//! Spot geometry is extracted once per session from a mask image. Frames are
//! sampled every `step` frames; the scheduler re-runs the occupancy classifier
//! only on spots whose mean intensity moved a lot compared to the rest of the
//! lot since the previous sample. A bounded queue decouples analysis (producer,
//! calling thread) from rendering (consumer, spawned thread).
//!
//! # Module Structure
//!
//! - `spots`, `occupancy`, `frame`: session data model
//! - `schedule`: diff-driven candidate selection and classification step
//! - `pipeline`: producer/consumer run with cooperative stop
//! - `session`: end-to-end run over the collaborator traits
//! - `ingest`, `mask`, `classify`, `render`: collaborator traits and backends
//! - `api`, `config`: upload service and its configuration

pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod mask;
pub mod occupancy;
pub mod pipeline;
pub mod render;
pub mod schedule;
pub mod session;
pub mod spots;

pub use classify::{ClassifierRegistry, OccupancyClassifier, TextureClassifier};
pub use error::SessionError;
pub use frame::{Crop, Frame, PixelLayout};
pub use ingest::{FileVideoOpener, FrameSource, MediaPayload, MemorySource, VideoOpener};
pub use mask::{MaskImageExtractor, RegionExtractor, StaticRegions};
pub use occupancy::{OccupancyState, OccupancySummary, SpotStatus};
pub use pipeline::{FrameBatch, FramePipeline, PipelineConfig, PipelineReport, StopSignal};
pub use render::{
    annotate, overlay_text, LogRenderer, RenderControl, Renderer, RendererFactory,
    SnapshotRenderer, StopAfter,
};
pub use schedule::{DiffScheduler, SchedulerConfig, Selection, StepReport};
pub use session::{
    Collaborators, SessionConfig, SessionController, SessionRequest, SessionResult,
};
pub use spots::{ParkingSpot, SpotRegistry};
