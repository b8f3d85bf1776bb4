//! Glyph tile atlas
//!
//! OSD fonts ship as a single image holding one tile per byte code. Two
//! layouts are detected automatically:
//!  - 16x16 tiles (256 glyphs in a square sheet)
//!  - 256x1 tiles (single row)
//!
//! Other layouts need an explicit [`TileSize`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::{imageops, RgbaImage};
use serde::Deserialize;
use tracing::debug;

use crate::error::RenderError;

/// How byte codes map to tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Codes beyond the last tile row have no tile and fall back to text
    #[default]
    Strict,
    /// Codes wrap around with `code % tile_count`, so every code has a tile
    Wrapping,
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexMode::Strict => f.write_str("strict"),
            IndexMode::Wrapping => f.write_str("wrapping"),
        }
    }
}

impl FromStr for IndexMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(IndexMode::Strict),
            "wrapping" | "wrap" => Ok(IndexMode::Wrapping),
            other => Err(format!("unknown index mode '{other}' (expected strict or wrapping)")),
        }
    }
}

/// Tile dimensions in atlas pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

/// A loaded charset image cut into tiles
#[derive(Debug, Clone)]
pub struct TileAtlas {
    image: RgbaImage,
    tile_width: u32,
    tile_height: u32,
    tiles_per_row: u32,
    tiles_per_col: u32,
    mode: IndexMode,
}

impl TileAtlas {
    /// Load a charset from disk
    pub fn open(
        path: &Path,
        mode: IndexMode,
        tile_size: Option<TileSize>,
    ) -> Result<Self, RenderError> {
        let image = image::open(path)?.into_rgba8();
        let atlas = Self::from_image(image, mode, tile_size)?;
        debug!(
            path = %path.display(),
            tiles = atlas.tile_count(),
            tile_width = atlas.tile_width,
            tile_height = atlas.tile_height,
            %mode,
            "charset loaded"
        );
        Ok(atlas)
    }

    /// Cut an in-memory charset into tiles
    pub fn from_image(
        image: RgbaImage,
        mode: IndexMode,
        tile_size: Option<TileSize>,
    ) -> Result<Self, RenderError> {
        let (width, height) = image.dimensions();

        let (tiles_per_row, tiles_per_col, tile_width, tile_height) = match tile_size {
            Some(TileSize {
                width: tile_width,
                height: tile_height,
            }) => {
                if tile_width == 0 || tile_height == 0 || tile_width > width || tile_height > height
                {
                    return Err(RenderError::TileSizeMismatch {
                        tile_width,
                        tile_height,
                        width,
                        height,
                    });
                }
                (width / tile_width, height / tile_height, tile_width, tile_height)
            }
            None => detect_layout(width, height)?,
        };

        Ok(Self {
            image,
            tile_width,
            tile_height,
            tiles_per_row,
            tiles_per_col,
            mode,
        })
    }

    /// Number of tiles in the atlas
    pub fn tile_count(&self) -> u32 {
        self.tiles_per_row * self.tiles_per_col
    }

    /// Tile dimensions in atlas pixels
    pub fn tile_size(&self) -> TileSize {
        TileSize {
            width: self.tile_width,
            height: self.tile_height,
        }
    }

    /// Index resolution mode
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Top-left pixel of the tile for `code`, if it has one
    pub fn tile_origin(&self, code: u8) -> Option<(u32, u32)> {
        let index = match self.mode {
            IndexMode::Strict => u32::from(code),
            IndexMode::Wrapping => u32::from(code) % self.tile_count(),
        };

        let col = index % self.tiles_per_row;
        let row = index / self.tiles_per_row;
        if row >= self.tiles_per_col {
            return None;
        }

        Some((col * self.tile_width, row * self.tile_height))
    }

    /// Copy out the tile for `code`
    pub fn tile(&self, code: u8) -> Option<RgbaImage> {
        let (x, y) = self.tile_origin(code)?;
        Some(imageops::crop_imm(&self.image, x, y, self.tile_width, self.tile_height).to_image())
    }
}

/// Work out `(tiles_per_row, tiles_per_col, tile_width, tile_height)`
fn detect_layout(width: u32, height: u32) -> Result<(u32, u32, u32, u32), RenderError> {
    if width >= 16 && height >= 16 && width % 16 == 0 && height % 16 == 0 {
        Ok((16, 16, width / 16, height / 16))
    } else if width >= 256 && width % 256 == 0 && height > 0 {
        Ok((256, 1, width / 256, height))
    } else {
        Err(RenderError::UnsupportedLayout { width, height })
    }
}
