use anyhow::{anyhow, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use super::overlay_text;
use crate::occupancy::SpotStatus;
use crate::pipeline::FrameBatch;
use crate::spots::ParkingSpot;

pub const STATUS_EMPTY_RGB: [u8; 3] = [0, 255, 0];
pub const STATUS_OCCUPIED_RGB: [u8; 3] = [255, 0, 0];
pub const STATUS_UNKNOWN_RGB: [u8; 3] = [128, 128, 128];
pub const OVERLAY_TEXT_RGB: [u8; 3] = [255, 255, 255];

const OUTLINE_THICKNESS: i32 = 2;
// Dark banner behind the overlay text: (80,20)-(550,80).
const BANNER: ParkingSpot = ParkingSpot::new(80, 20, 470, 60);
// Text baseline starts at (100, 60); glyphs are 8x8 cells scaled up.
const TEXT_ORIGIN: (i32, i32) = (100, 60);
const GLYPH_SCALE: i32 = 2;
const GLYPH_CELL: i32 = 8;

/// RGB copy of the batch frame with each spot outlined in its status colour
/// and the "Available spots" line on a dark banner.
pub fn annotate(batch: &FrameBatch) -> Result<RgbImage> {
    let rgb = batch.frame.to_rgb();
    let mut canvas = RgbImage::from_raw(rgb.width(), rgb.height(), rgb.pixels().to_vec())
        .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;

    for (spot, status) in batch.registry.iter().zip(&batch.occupancy) {
        let color = match status {
            SpotStatus::Empty => STATUS_EMPTY_RGB,
            SpotStatus::Occupied => STATUS_OCCUPIED_RGB,
            SpotStatus::Unknown => STATUS_UNKNOWN_RGB,
        };
        outline(&mut canvas, spot, Rgb(color));
    }

    if let Some(banner) = rect(&BANNER) {
        draw_filled_rect_mut(&mut canvas, banner, Rgb([0, 0, 0]));
    }
    draw_text(
        &mut canvas,
        TEXT_ORIGIN,
        &overlay_text(&batch.summary()),
        Rgb(OVERLAY_TEXT_RGB),
    );
    Ok(canvas)
}

/// Concentric hollow rectangles, innermost last. Drawing clips to the canvas.
fn outline(canvas: &mut RgbImage, spot: &ParkingSpot, color: Rgb<u8>) {
    for inset in 0..OUTLINE_THICKNESS {
        let ring = ParkingSpot::new(
            spot.x + inset,
            spot.y + inset,
            spot.width - 2 * inset,
            spot.height - 2 * inset,
        );
        match rect(&ring) {
            Some(r) => draw_hollow_rect_mut(canvas, r, color),
            None => break,
        }
    }
}

fn rect(spot: &ParkingSpot) -> Option<Rect> {
    if spot.width <= 0 || spot.height <= 0 {
        return None;
    }
    Some(Rect::at(spot.x, spot.y).of_size(spot.width as u32, spot.height as u32))
}

/// Draws `text` with its baseline at `origin`. Characters outside the basic
/// Latin range are skipped but still advance the pen.
fn draw_text(canvas: &mut RgbImage, origin: (i32, i32), text: &str, color: Rgb<u8>) {
    let advance = GLYPH_CELL * GLYPH_SCALE;
    let top = origin.1 - advance;
    for (i, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch) else {
            continue;
        };
        let left = origin.0 + i as i32 * advance;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_CELL {
                if bits & (1u8 << col) == 0 {
                    continue;
                }
                let cell = Rect::at(left + col * GLYPH_SCALE, top + row as i32 * GLYPH_SCALE)
                    .of_size(GLYPH_SCALE as u32, GLYPH_SCALE as u32);
                draw_filled_rect_mut(canvas, cell, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, PixelLayout};
    use crate::spots::SpotRegistry;
    use std::sync::Arc;

    fn batch(frame: Frame, spots: Vec<ParkingSpot>, occupancy: Vec<SpotStatus>) -> FrameBatch {
        FrameBatch {
            frame_index: 30,
            frame: Arc::new(frame),
            registry: Arc::new(SpotRegistry::build(spots).unwrap()),
            occupancy,
        }
    }

    #[test]
    fn outlines_spots_by_status() {
        let out = annotate(&batch(
            Frame::filled(640, 200, PixelLayout::Gray8, 50),
            vec![
                ParkingSpot::new(600, 100, 10, 10),
                ParkingSpot::new(620, 100, 10, 10),
                ParkingSpot::new(600, 120, 10, 10),
            ],
            vec![SpotStatus::Empty, SpotStatus::Occupied, SpotStatus::Unknown],
        ))
        .unwrap();
        assert_eq!(out.dimensions(), (640, 200));
        assert_eq!(out.get_pixel(600, 100).0, STATUS_EMPTY_RGB);
        assert_eq!(out.get_pixel(601, 101).0, STATUS_EMPTY_RGB);
        assert_eq!(out.get_pixel(629, 109).0, STATUS_OCCUPIED_RGB);
        assert_eq!(out.get_pixel(601, 125).0, STATUS_UNKNOWN_RGB);
        // interior untouched
        assert_eq!(out.get_pixel(605, 105).0, [50, 50, 50]);
    }

    #[test]
    fn banner_carries_the_available_spots_line() {
        let out = annotate(&batch(
            Frame::filled(640, 200, PixelLayout::Gray8, 50),
            vec![ParkingSpot::new(600, 150, 10, 10)],
            vec![SpotStatus::Empty],
        ))
        .unwrap();

        let mut text_pixels = 0;
        let mut banner_pixels = 0;
        for y in 20..80 {
            for x in 80..550 {
                match out.get_pixel(x, y).0 {
                    OVERLAY_TEXT_RGB => text_pixels += 1,
                    [0, 0, 0] => banner_pixels += 1,
                    other => panic!("unexpected banner pixel {:?} at ({}, {})", other, x, y),
                }
            }
        }
        assert!(text_pixels > 100, "only {} text pixels", text_pixels);
        assert!(banner_pixels > text_pixels);
        // Text sits above the baseline and never leaves the banner.
        assert!((60..80).all(|y| (80..550).all(|x| out.get_pixel(x, y).0 != OVERLAY_TEXT_RGB)));
        assert_eq!(out.get_pixel(79, 30).0, [50, 50, 50]);
    }

    #[test]
    fn clips_to_small_frames() {
        let out = annotate(&batch(
            Frame::filled(8, 8, PixelLayout::Rgb8, 9),
            vec![ParkingSpot::new(-5, -5, 20, 20)],
            vec![SpotStatus::Occupied],
        ))
        .unwrap();
        assert_eq!(out.dimensions(), (8, 8));
        assert_eq!(out.get_pixel(3, 3).0, [9, 9, 9]);
    }
}
