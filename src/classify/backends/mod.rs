pub mod texture;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use texture::{TextureClassifier, DEFAULT_TEXTURE_THRESHOLD};

#[cfg(feature = "backend-tract")]
pub use tract::TractClassifier;
