//! Drawing surface
//!
//! Wraps an RGBA image so it can be drawn on with `embedded-graphics`
//! primitives and have charset tiles composited onto it.

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use image::{imageops, Rgba, RgbaImage};

/// Mutable view of an RGBA image
pub struct Raster<'a> {
    image: &'a mut RgbaImage,
}

impl<'a> Raster<'a> {
    /// Wrap an image
    pub fn new(image: &'a mut RgbaImage) -> Self {
        Self { image }
    }

    /// Alpha-composite `tile` with its top-left corner at `(x, y)`
    ///
    /// Transparent tile pixels leave the existing content alone. Parts that
    /// fall outside the image are clipped.
    pub fn blit(&mut self, tile: &RgbaImage, x: u32, y: u32) {
        imageops::overlay(&mut *self.image, tile, i64::from(x), i64::from(y));
    }
}

impl DrawTarget for Raster<'_> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.image.dimensions();
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x < width && y < height {
                self.image
                    .put_pixel(x, y, Rgba([color.r(), color.g(), color.b(), 0xFF]));
            }
        }
        Ok(())
    }
}

impl OriginDimensions for Raster<'_> {
    fn size(&self) -> Size {
        let (width, height) = self.image.dimensions();
        Size::new(width, height)
    }
}
