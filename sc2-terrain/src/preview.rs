//! Grayscale rendering of a height grid for quick visual inspection.

use image::{imageops, GrayImage, Luma};

use crate::grid::HeightGrid;

/// Renders smaller than this are upscaled with nearest-neighbour sampling.
pub const MIN_PREVIEW_SIDE: u32 = 200;

/// Normalize raw heights to 0-255 and upscale small maps.
pub fn height_preview(grid: &HeightGrid) -> GrayImage {
    let (min, max) = grid.range();
    let span = (max - min) as f64;
    let width = grid.width();

    let mut img = GrayImage::from_fn(width, grid.height(), |x, y| {
        let raw = grid.samples()[(y * width + x) as usize];
        let level = if span > 0.0 {
            ((raw - min) as f64 / span * 255.0) as u8
        } else {
            0
        };
        Luma([level])
    });

    if img.width() < MIN_PREVIEW_SIDE || img.height() < MIN_PREVIEW_SIDE {
        let factor = (MIN_PREVIEW_SIDE / img.width())
            .max(MIN_PREVIEW_SIDE / img.height())
            .max(1);
        img = imageops::resize(
            &img,
            img.width() * factor,
            img.height() * factor,
            imageops::FilterType::Nearest,
        );
    }
    img
}
