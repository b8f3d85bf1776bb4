//! Canvas rendering
//!
//! Maps every grid cell onto a uniform pixel box of the output image. The
//! image size is independent of the grid size; when it does not divide
//! evenly the leftover pixels on the right and bottom stay transparent.

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_5X8, FONT_6X10, FONT_8X13};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::renderer::TextRenderer;
use embedded_graphics::text::{Baseline, Text};
use image::{imageops, imageops::FilterType, RgbaImage};
use osd_display::Canvas;
use tracing::debug;

use crate::atlas::TileAtlas;
use crate::glyph::{resolve_glyph, Glyph};
use crate::raster::Raster;

/// Default overlay width (PAL video)
pub const DEFAULT_WIDTH: u32 = 720;

/// Default overlay height (PAL video)
pub const DEFAULT_HEIGHT: u32 = 576;

/// Fallback fonts, largest first
const FALLBACK_FONTS: [&MonoFont<'static>; 3] = [&FONT_10X20, &FONT_8X13, &FONT_6X10];

/// Pixel box of one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMetrics {
    pub width: u32,
    pub height: u32,
}

impl CellMetrics {
    /// Uniform cell size for a grid stretched over an image
    ///
    /// Never smaller than one pixel.
    pub fn fit(image_width: u32, image_height: u32, columns: usize, rows: usize) -> Self {
        let per = |pixels: u32, cells: usize| {
            let cells = u32::try_from(cells.max(1)).unwrap_or(u32::MAX);
            (pixels / cells).max(1)
        };
        Self {
            width: per(image_width, columns),
            height: per(image_height, rows),
        }
    }
}

/// Renders canvases into RGBA images
pub struct OsdRenderer {
    width: u32,
    height: u32,
    /// Grid the cached state was computed for
    grid: (usize, usize),
    metrics: CellMetrics,
    atlas: Option<TileAtlas>,
    /// Atlas tiles pre-scaled to the cell size, indexed by byte code
    tiles: Vec<Option<RgbaImage>>,
    font: &'static MonoFont<'static>,
}

impl OsdRenderer {
    /// Create a renderer for a `columns` x `rows` grid on a `width` x `height` image
    pub fn new(
        width: u32,
        height: u32,
        columns: usize,
        rows: usize,
        atlas: Option<TileAtlas>,
    ) -> Self {
        let mut renderer = Self {
            width: width.max(1),
            height: height.max(1),
            grid: (0, 0),
            metrics: CellMetrics {
                width: 1,
                height: 1,
            },
            atlas,
            tiles: Vec::new(),
            font: &FONT_5X8,
        };
        renderer.fit_grid(columns, rows);
        renderer
    }

    /// Output image size
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Current cell size
    pub fn metrics(&self) -> CellMetrics {
        self.metrics
    }

    /// Whether a charset is loaded
    pub fn has_atlas(&self) -> bool {
        self.atlas.is_some()
    }

    /// Render a canvas to a fresh transparent image
    pub fn render(&mut self, canvas: &Canvas) -> RgbaImage {
        self.fit_grid(canvas.columns(), canvas.rows());

        let mut image = RgbaImage::new(self.width, self.height);
        let mut raster = Raster::new(&mut image);
        let CellMetrics { width, height } = self.metrics;

        for (row, col, cell) in canvas.iter() {
            let x = col as u32 * width;
            let y = row as u32 * height;

            match resolve_glyph(cell, self.atlas.as_ref()) {
                Glyph::Skip => {}
                Glyph::Tile(code) => match &self.tiles[usize::from(code)] {
                    Some(tile) => raster.blit(tile, x, y),
                    None => {
                        if let Some(ch) = cell.ascii() {
                            self.draw_char(&mut raster, ch, x, y);
                        }
                    }
                },
                Glyph::Text(ch) => self.draw_char(&mut raster, ch, x, y),
            }
        }

        image
    }

    /// Draw one character centered in the cell at `(x, y)`
    fn draw_char(&self, raster: &mut Raster<'_>, ch: char, x: u32, y: u32) {
        let style = MonoTextStyle::new(self.font, Rgb888::WHITE);
        let mut buf = [0u8; 4];
        let text = ch.encode_utf8(&mut buf);

        let size = style
            .measure_string(text, Point::zero(), Baseline::Top)
            .bounding_box
            .size;
        let text_x = x + self.metrics.width.saturating_sub(size.width) / 2;
        let text_y = y + self.metrics.height.saturating_sub(size.height) / 2;

        Text::with_baseline(
            text,
            Point::new(text_x as i32, text_y as i32),
            style,
            Baseline::Top,
        )
        .draw(raster)
        .ok();
    }

    /// Recompute cell size, font and scaled tiles when the grid changes
    fn fit_grid(&mut self, columns: usize, rows: usize) {
        if self.grid == (columns, rows) {
            return;
        }

        self.grid = (columns, rows);
        self.metrics = CellMetrics::fit(self.width, self.height, columns, rows);
        self.font = pick_font(self.metrics);
        self.tiles = match &self.atlas {
            Some(atlas) => (0..=u8::MAX)
                .map(|code| atlas.tile(code).map(|tile| scale_tile(tile, self.metrics)))
                .collect(),
            None => vec![None; 256],
        };

        debug!(
            columns,
            rows,
            cell_width = self.metrics.width,
            cell_height = self.metrics.height,
            "renderer grid fitted"
        );
    }
}

/// Largest fallback font whose glyphs fit the cell
fn pick_font(metrics: CellMetrics) -> &'static MonoFont<'static> {
    FALLBACK_FONTS
        .into_iter()
        .find(|font| {
            font.character_size.width <= metrics.width
                && font.character_size.height <= metrics.height
        })
        .unwrap_or(&FONT_5X8)
}

/// Nearest-neighbour resize so pixel-art edges stay sharp
fn scale_tile(tile: RgbaImage, metrics: CellMetrics) -> RgbaImage {
    if tile.dimensions() == (metrics.width, metrics.height) {
        tile
    } else {
        imageops::resize(&tile, metrics.width, metrics.height, FilterType::Nearest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::IndexMode;
    use image::Rgba;

    fn has_mark(image: &RgbaImage, metrics: CellMetrics, row: u32, col: u32) -> bool {
        let x0 = col * metrics.width;
        let y0 = row * metrics.height;
        (y0..y0 + metrics.height)
            .flat_map(|y| (x0..x0 + metrics.width).map(move |x| (x, y)))
            .any(|(x, y)| image.get_pixel(x, y).0[3] != 0)
    }

    #[test]
    fn test_cell_metrics() {
        assert_eq!(
            CellMetrics::fit(720, 576, 60, 22),
            CellMetrics {
                width: 12,
                height: 26
            }
        );
        assert_eq!(
            CellMetrics::fit(10, 10, 60, 22),
            CellMetrics {
                width: 1,
                height: 1
            }
        );
    }

    #[test]
    fn test_pick_font() {
        let font = pick_font(CellMetrics {
            width: 12,
            height: 26,
        });
        assert_eq!(font.character_size, FONT_10X20.character_size);

        let font = pick_font(CellMetrics {
            width: 3,
            height: 3,
        });
        assert_eq!(font.character_size, FONT_5X8.character_size);
    }

    #[test]
    fn test_blank_canvas_renders_transparent() {
        let mut renderer = OsdRenderer::new(120, 44, 10, 2, None);
        let image = renderer.render(&Canvas::new(10, 2));
        assert_eq!(image.dimensions(), (120, 44));
        assert!(image.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_text_fallback_marks_only_its_cell() {
        let mut canvas = Canvas::new(60, 22);
        canvas.write(5, 2, b"\x00A");

        let mut renderer = OsdRenderer::new(720, 576, 60, 22, None);
        let image = renderer.render(&canvas);
        let metrics = renderer.metrics();

        assert!(has_mark(&image, metrics, 5, 2));
        for col in (0..60).filter(|&c| c != 2) {
            assert!(!has_mark(&image, metrics, 5, col));
        }
    }

    #[test]
    fn test_non_printable_codes_render_blank_without_atlas() {
        let mut canvas = Canvas::new(4, 1);
        canvas.write(0, 0, &[0x00, 0x01, 0x7F, 0xC8, b' ']);

        let mut renderer = OsdRenderer::new(48, 26, 4, 1, None);
        let image = renderer.render(&canvas);
        assert!(image.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_atlas_tiles_scaled_into_cells() {
        // 16x16 sheet of 2x2 tiles, tile N is red = N
        let sheet = RgbaImage::from_fn(32, 32, |x, y| {
            Rgba([((y / 2) * 16 + x / 2) as u8, 0, 0, 255])
        });
        let atlas = TileAtlas::from_image(sheet, IndexMode::Strict, None).unwrap();

        let mut canvas = Canvas::new(2, 1);
        canvas.write(0, 1, &[0x00, 0x9A]);

        let mut renderer = OsdRenderer::new(20, 10, 2, 1, Some(atlas));
        let image = renderer.render(&canvas);

        // Cell (0, 1) covers x 10..20, fully painted with tile 0x9A
        for y in 0..10 {
            for x in 10..20 {
                assert_eq!(image.get_pixel(x, y), &Rgba([0x9A, 0, 0, 255]));
            }
        }
        // Blank cell untouched
        assert_eq!(image.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_transparent_tile_regions_do_not_overwrite() {
        // Every tile is transparent except its top-left pixel
        let sheet = RgbaImage::from_fn(32, 32, |x, y| {
            if x % 2 == 0 && y % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let atlas = TileAtlas::from_image(sheet, IndexMode::Strict, None).unwrap();

        let mut canvas = Canvas::new(1, 1);
        canvas.write(0, 0, &[0x00, 0x05]);

        let mut renderer = OsdRenderer::new(2, 2, 1, 1, Some(atlas));
        let image = renderer.render(&canvas);
        assert_eq!(image.get_pixel(0, 0).0[3], 255);
        assert_eq!(image.get_pixel(1, 1).0[3], 0);
    }

    #[test]
    fn test_grid_change_refits() {
        let mut renderer = OsdRenderer::new(720, 576, 60, 22, None);
        renderer.render(&Canvas::new(30, 16));
        assert_eq!(
            renderer.metrics(),
            CellMetrics {
                width: 24,
                height: 36
            }
        );
    }
}
