use anyhow::Result;

use crate::classify::backend::OccupancyClassifier;
use crate::frame::Crop;

/// Default standard deviation above which a crop counts as occupied.
pub const DEFAULT_TEXTURE_THRESHOLD: f64 = 18.0;

/// CPU backend: empty asphalt is flat, a parked car is not.
///
/// The verdict is `stddev(crop bytes) > threshold`.
#[derive(Clone, Debug)]
pub struct TextureClassifier {
    threshold: f64,
}

impl TextureClassifier {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_TEXTURE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for TextureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl OccupancyClassifier for TextureClassifier {
    fn name(&self) -> &'static str {
        "texture"
    }

    fn classify(&self, crop: &Crop<'_>) -> Result<bool> {
        let mean = crop.mean_intensity();
        let mut sq_sum = 0.0f64;
        let mut count = 0u64;
        for row in crop.rows() {
            for &v in row {
                let d = v as f64 - mean;
                sq_sum += d * d;
            }
            count += row.len() as u64;
        }
        let stddev = (sq_sum / count as f64).sqrt();
        Ok(stddev > self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, PixelLayout};
    use crate::spots::ParkingSpot;

    #[test]
    fn flat_crop_is_empty() {
        let frame = Frame::filled(8, 8, PixelLayout::Gray8, 120);
        let crop = frame.crop(&ParkingSpot::new(0, 0, 8, 8)).unwrap();
        assert!(!TextureClassifier::new().classify(&crop).unwrap());
    }

    #[test]
    fn high_contrast_crop_is_occupied() {
        let data: Vec<u8> = (0..64).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        let frame = Frame::new(8, 8, PixelLayout::Gray8, data).unwrap();
        let crop = frame.crop(&ParkingSpot::new(0, 0, 8, 8)).unwrap();
        assert!(TextureClassifier::new().classify(&crop).unwrap());
    }

    #[test]
    fn threshold_is_tunable() {
        let data: Vec<u8> = (0..16).map(|i| if i % 2 == 0 { 100 } else { 110 }).collect();
        let frame = Frame::new(4, 4, PixelLayout::Gray8, data).unwrap();
        let crop = frame.crop(&ParkingSpot::new(0, 0, 4, 4)).unwrap();
        // stddev is exactly 5
        assert!(!TextureClassifier::new().classify(&crop).unwrap());
        assert!(TextureClassifier::new()
            .with_threshold(4.0)
            .classify(&crop)
            .unwrap());
    }
}
