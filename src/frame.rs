//! Decoded frames and spot crops.
//!
//! - `Frame`: immutable decoded image. Shared through `Arc` so the previous
//!   sampled frame and queued batches never copy pixels.
//! - `Crop`: borrowed view of one spot inside a frame. A crop only exists when
//!   the spot lies fully inside the frame and has non-zero area.

use anyhow::{anyhow, Result};

use crate::spots::ParkingSpot;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Pixel layout of a decoded frame. Both layouts are 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Gray8,
    Rgb8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray8 => 1,
            PixelLayout::Rgb8 => 3,
        }
    }
}

/// Decoded video frame, row-major and tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(layout.channels()))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} bytes for {}x{} {:?}, received {}",
                expected,
                width,
                height,
                layout,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// Frame with every channel byte set to `value`.
    #[cfg(test)]
    pub(crate) fn filled(width: u32, height: u32, layout: PixelLayout, value: u8) -> Self {
        let len = width as usize * height as usize * layout.channels();
        Self {
            width,
            height,
            layout,
            data: vec![value; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * self.layout.channels()
    }

    /// View of `spot` inside this frame, or `None` when the spot is out of
    /// bounds or has zero area.
    pub fn crop(&self, spot: &ParkingSpot) -> Option<Crop<'_>> {
        if !spot.fits_within(self.width, self.height) {
            return None;
        }
        Some(Crop { frame: self, spot: *spot })
    }

    /// Copy of this frame converted to RGB.
    pub fn to_rgb(&self) -> Frame {
        match self.layout {
            PixelLayout::Rgb8 => self.clone(),
            PixelLayout::Gray8 => {
                let data = self.data.iter().flat_map(|&v| [v, v, v]).collect();
                Frame {
                    width: self.width,
                    height: self.height,
                    layout: PixelLayout::Rgb8,
                    data,
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

// ----------------------------------------------------------------------------
// Crop
// ----------------------------------------------------------------------------

/// In-bounds, non-empty rectangle of a frame.
#[derive(Clone, Copy, Debug)]
pub struct Crop<'a> {
    frame: &'a Frame,
    spot: ParkingSpot,
}

impl<'a> Crop<'a> {
    pub fn width(&self) -> u32 {
        self.spot.width as u32
    }

    pub fn height(&self) -> u32 {
        self.spot.height as u32
    }

    pub fn layout(&self) -> PixelLayout {
        self.frame.layout
    }

    pub fn spot(&self) -> &ParkingSpot {
        &self.spot
    }

    /// Iterator over the crop's rows as byte slices.
    pub fn rows(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let frame = self.frame;
        let channels = frame.layout.channels();
        let stride = frame.row_bytes();
        let start_col = self.spot.x as usize * channels;
        let len = self.spot.width as usize * channels;
        let top = self.spot.y as usize;
        (top..top + self.spot.height as usize).map(move |row| {
            let start = row * stride + start_col;
            &frame.data[start..start + len]
        })
    }

    /// Mean over every channel byte of the crop.
    pub fn mean_intensity(&self) -> f64 {
        let mut sum = 0u64;
        let mut count = 0u64;
        for row in self.rows() {
            sum += row.iter().map(|&v| v as u64).sum::<u64>();
            count += row.len() as u64;
        }
        sum as f64 / count as f64
    }

    /// Packed copy of the crop's pixels, row-major.
    pub fn to_pixels(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.width() as usize * self.height() as usize * self.layout().channels(),
        );
        for row in self.rows() {
            out.extend_from_slice(row);
        }
        out
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame() -> Frame {
        // 4x3 gray frame, value = y * 10 + x
        let mut data = Vec::new();
        for y in 0..3u8 {
            for x in 0..4u8 {
                data.push(y * 10 + x);
            }
        }
        Frame::new(4, 3, PixelLayout::Gray8, data).unwrap()
    }

    #[test]
    fn new_rejects_wrong_buffer_length() {
        assert!(Frame::new(2, 2, PixelLayout::Rgb8, vec![0; 11]).is_err());
        assert!(Frame::new(2, 2, PixelLayout::Rgb8, vec![0; 12]).is_ok());
    }

    #[test]
    fn new_rejects_overflowing_dimensions() {
        let err = Frame::new(u32::MAX, u32::MAX, PixelLayout::Rgb8, Vec::new()).unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn crop_extracts_rows_of_the_spot() {
        let frame = gradient_frame();
        let crop = frame.crop(&ParkingSpot::new(1, 1, 2, 2)).unwrap();
        assert_eq!(crop.to_pixels(), vec![11, 12, 21, 22]);
        assert_eq!(crop.mean_intensity(), 16.5);
    }

    #[test]
    fn crop_is_absent_out_of_bounds_or_empty() {
        let frame = gradient_frame();
        assert!(frame.crop(&ParkingSpot::new(3, 0, 2, 1)).is_none());
        assert!(frame.crop(&ParkingSpot::new(0, 2, 1, 2)).is_none());
        assert!(frame.crop(&ParkingSpot::new(0, 0, 0, 2)).is_none());
        assert!(frame.crop(&ParkingSpot::new(-1, 0, 2, 2)).is_none());
    }

    #[test]
    fn rgb_mean_counts_every_channel() {
        let mut frame = Frame::filled(2, 1, PixelLayout::Rgb8, 0);
        frame.pixels_mut().copy_from_slice(&[30, 60, 90, 0, 0, 0]);
        let crop = frame.crop(&ParkingSpot::new(0, 0, 1, 1)).unwrap();
        assert_eq!(crop.mean_intensity(), 60.0);
    }

    #[test]
    fn gray_to_rgb_replicates_channels() {
        let frame = Frame::new(2, 1, PixelLayout::Gray8, vec![5, 9]).unwrap();
        let rgb = frame.to_rgb();
        assert_eq!(rgb.layout(), PixelLayout::Rgb8);
        assert_eq!(rgb.pixels(), &[5, 5, 5, 9, 9, 9]);
    }
}
