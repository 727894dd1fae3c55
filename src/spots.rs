//! Parking spot geometry.
//!
//! A session's spots are extracted once from the mask and never change
//! afterwards. A spot's index in the registry is its identity for the whole
//! session: occupancy entries, diff scores and rendered rectangles all line up
//! by index.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Axis-aligned spot rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ParkingSpot {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// True when the rectangle has positive area and lies fully inside a
    /// `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        if self.width <= 0 || self.height <= 0 || self.x < 0 || self.y < 0 {
            return false;
        }
        let right = self.x as i64 + self.width as i64;
        let bottom = self.y as i64 + self.height as i64;
        right <= width as i64 && bottom <= height as i64
    }
}

/// Immutable, ordered set of spots for one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpotRegistry {
    spots: Vec<ParkingSpot>,
}

impl SpotRegistry {
    /// Build the registry from extracted regions.
    ///
    /// Rejects an empty region list and any region with negative extent.
    /// Zero-area regions are kept; the scheduler never selects them.
    pub fn build(regions: Vec<ParkingSpot>) -> Result<Self, SessionError> {
        if regions.is_empty() {
            return Err(SessionError::InvalidMask(
                "mask contains no spot regions".to_string(),
            ));
        }
        if let Some((index, bad)) = regions
            .iter()
            .enumerate()
            .find(|(_, r)| r.width < 0 || r.height < 0)
        {
            return Err(SessionError::InvalidMask(format!(
                "region {} has negative extent ({}x{})",
                index, bad.width, bad.height
            )));
        }
        Ok(Self { spots: regions })
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ParkingSpot> {
        self.spots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParkingSpot> + '_ {
        self.spots.iter()
    }

    pub fn spots(&self) -> &[ParkingSpot] {
        &self.spots
    }
}
