//! Composite output and its presentation-side encoding.

use image::{Rgb, RgbImage};
use ndarray::Array3;

/// Final RGB composite: shape (height, width, 3), values in [0, 1].
///
/// Read-only once produced; the pipeline hands it to the presentation
/// layer, which encodes it for display or export.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    pub pixels: Array3<f32>,
}

impl CompositeImage {
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    /// Convert to an 8-bit RGB image for export.
    ///
    /// Array indices [y, x] map to pixel coordinates (x, y); note that
    /// array dimensions are (height, width) while image dimensions are
    /// (width, height).
    pub fn to_image(&self) -> RgbImage {
        let (height, width, _) = self.pixels.dim();
        let mut img = RgbImage::new(width as u32, height as u32);
        for y in 0..height {
            for x in 0..width {
                let channel = |c: usize| (self.pixels[[y, x, c]] * 255.0).round() as u8;
                img.put_pixel(x as u32, y as u32, Rgb([channel(0), channel(1), channel(2)]));
            }
        }
        img
    }
}
