//! Line tiling: one work-group per scanline.
//!
//! Each work item of a group processes a run of `pixels_per_item` adjacent
//! pixels of its line; the last item of a line takes the remainder. For a
//! 1920 wide frame at 16 pixels per item that is 120 items per group and
//! `120 * height` items in total.

use std::ops::Range;

use grain_core::{Error, Result};

/// Dispatch geometry for a line-tiled kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTiling {
    /// Pixels per line.
    pub width: u32,
    /// Lines (one work-group each).
    pub height: u32,
    /// Pixels handled by one work item.
    pub pixels_per_item: u32,
}

impl LineTiling {
    /// Create a tiling. All three values must be non-zero.
    pub fn new(width: u32, height: u32, pixels_per_item: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_argument(format!(
                "empty dispatch {width}x{height}"
            )));
        }
        if pixels_per_item == 0 {
            return Err(Error::invalid_argument("pixels_per_item must be non-zero"));
        }
        Ok(Self {
            width,
            height,
            pixels_per_item,
        })
    }

    /// `ceil(width / pixels_per_item)`.
    #[inline]
    pub fn work_items_per_group(&self) -> u32 {
        self.width.div_ceil(self.pixels_per_item)
    }

    /// Work items across the whole frame.
    #[inline]
    pub fn global_work_items(&self) -> u64 {
        self.work_items_per_group() as u64 * self.height as u64
    }

    /// Pixel columns covered by work item `local_id` of any line.
    #[inline]
    pub fn item_pixels(&self, local_id: u32) -> Range<u32> {
        let start = (local_id * self.pixels_per_item).min(self.width);
        let end = (start + self.pixels_per_item).min(self.width);
        start..end
    }

    /// Pixel runs of one line, in work item order.
    pub fn items(&self) -> impl Iterator<Item = Range<u32>> + '_ {
        (0..self.work_items_per_group()).map(|i| self.item_pixels(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_1080p() {
        let t = LineTiling::new(1920, 1080, 16).unwrap();
        assert_eq!(t.work_items_per_group(), 120);
        assert_eq!(t.global_work_items(), 120 * 1080);
    }

    #[test]
    fn test_remainder_goes_to_last_item() {
        let t = LineTiling::new(100, 1, 16).unwrap();
        assert_eq!(t.work_items_per_group(), 7);
        assert_eq!(t.item_pixels(5), 80..96);
        assert_eq!(t.item_pixels(6), 96..100);
    }

    #[test]
    fn test_items_cover_line_once() {
        for width in [1, 15, 16, 17, 47, 48, 49, 1921] {
            let t = LineTiling::new(width, 2, 48).unwrap();
            let mut next = 0;
            for run in t.items() {
                assert_eq!(run.start, next);
                assert!(run.end > run.start);
                next = run.end;
            }
            assert_eq!(next, width);
        }
    }

    #[test]
    fn test_rejects_empty() {
        assert!(LineTiling::new(0, 10, 16).is_err());
        assert!(LineTiling::new(10, 0, 16).is_err());
        assert!(LineTiling::new(10, 10, 0).is_err());
    }
}
