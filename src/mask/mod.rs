//! Spot geometry extraction from mask images.
//!
//! A mask is an image where each parking spot is painted as a separate
//! non-zero blob on a zero background. Each 4-connected blob becomes one
//! spot rectangle (its bounding box).

mod components;

use anyhow::{Context, Result};

use crate::spots::ParkingSpot;

pub use components::component_boxes;

/// Extracts spot rectangles from mask bytes.
pub trait RegionExtractor: Send + Sync {
    /// Ordered spot rectangles. An undecodable mask is an error; a blank
    /// mask yields an empty list.
    fn extract(&self, mask: &[u8]) -> Result<Vec<ParkingSpot>>;
}

/// Decodes PNG/JPEG masks with `image` and labels connected components.
#[derive(Clone, Debug, Default)]
pub struct MaskImageExtractor;

impl MaskImageExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl RegionExtractor for MaskImageExtractor {
    fn extract(&self, mask: &[u8]) -> Result<Vec<ParkingSpot>> {
        let decoded = image::load_from_memory(mask).context("failed to decode mask image")?;
        let luma = decoded.to_luma8();
        let (width, height) = luma.dimensions();
        let boxes = component_boxes(luma.as_raw(), width, height);
        log::debug!(
            "mask {}x{}: {} connected regions",
            width,
            height,
            boxes.len()
        );
        Ok(boxes)
    }
}

/// Fixed region list, ignoring the mask bytes.
#[derive(Clone, Debug, Default)]
pub struct StaticRegions {
    regions: Vec<ParkingSpot>,
}

impl StaticRegions {
    pub fn new(regions: Vec<ParkingSpot>) -> Self {
        Self { regions }
    }
}

impl RegionExtractor for StaticRegions {
    fn extract(&self, _mask: &[u8]) -> Result<Vec<ParkingSpot>> {
        Ok(self.regions.clone())
    }
}
