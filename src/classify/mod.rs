//! Occupancy classification.
//!
//! The scheduler hands each candidate crop to an `OccupancyClassifier` and
//! stores the verdict verbatim. Backends are selected by name through the
//! `ClassifierRegistry`.

mod backend;
mod backends;
mod registry;

pub use backend::OccupancyClassifier;
#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;
pub use backends::{TextureClassifier, DEFAULT_TEXTURE_THRESHOLD};
pub use registry::ClassifierRegistry;
