//! 4-connected component labelling over a binary mask.
//!
//! Any non-zero pixel is foreground. Components are labelled in raster-scan
//! order of their first pixel, and each yields its bounding box. Background
//! never produces a region.

use std::collections::VecDeque;

use crate::spots::ParkingSpot;

/// Bounding boxes of the 4-connected foreground components of `luma`.
///
/// `luma` is a `width` x `height` single-channel buffer, row-major.
pub fn component_boxes(luma: &[u8], width: u32, height: u32) -> Vec<ParkingSpot> {
    let (w, h) = (width as usize, height as usize);
    debug_assert_eq!(luma.len(), w * h);
    let mut visited = vec![false; w * h];
    let mut boxes = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..w * h {
        if luma[start] == 0 || visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let (mut min_x, mut min_y) = (start % w, start / w);
        let (mut max_x, mut max_y) = (min_x, min_y);

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % w, idx / w);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            let mut visit = |n: usize| {
                if luma[n] != 0 && !visited[n] {
                    visited[n] = true;
                    queue.push_back(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < w {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - w);
            }
            if y + 1 < h {
                visit(idx + w);
            }
        }

        boxes.push(ParkingSpot::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x + 1) as i32,
            (max_y - min_y + 1) as i32,
        ));
    }
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(rows: &[&str]) -> (Vec<u8>, u32, u32) {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let data = rows
            .iter()
            .flat_map(|row| row.bytes().map(|b| if b == b'#' { 255 } else { 0 }))
            .collect();
        (data, width, height)
    }

    #[test]
    fn finds_boxes_in_raster_order() {
        let (data, w, h) = mask(&[
            "....##",
            "##..##",
            "##....",
            "......",
            "..###.",
        ]);
        let boxes = component_boxes(&data, w, h);
        assert_eq!(
            boxes,
            vec![
                ParkingSpot::new(4, 0, 2, 2),
                ParkingSpot::new(0, 1, 2, 2),
                ParkingSpot::new(2, 4, 3, 1),
            ]
        );
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        let (data, w, h) = mask(&["#.", ".#"]);
        assert_eq!(component_boxes(&data, w, h).len(), 2);
    }

    #[test]
    fn concave_shape_is_one_component() {
        let (data, w, h) = mask(&["#.#", "#.#", "###"]);
        assert_eq!(component_boxes(&data, w, h), vec![ParkingSpot::new(0, 0, 3, 3)]);
    }

    #[test]
    fn blank_mask_has_no_components() {
        let (data, w, h) = mask(&["...", "..."]);
        assert!(component_boxes(&data, w, h).is_empty());
    }
}
