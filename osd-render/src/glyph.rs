//! Cell to glyph resolution
//!
//! A cell holds a raw byte code. With a charset loaded the code is a font
//! index; without one, only printable ASCII has something to show.

use osd_display::Cell;

use crate::atlas::TileAtlas;

/// What to draw for one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    /// Nothing visible; no draw call
    Skip,
    /// Blit the charset tile for this code
    Tile(u8),
    /// Draw this character with the fallback font
    Text(char),
}

/// Decide how a cell is drawn
///
/// The byte-code interpretation wins whenever the atlas has a tile for it.
/// Otherwise printable ASCII (32-126, except space) falls back to text and
/// everything else is left blank rather than drawn as a placeholder.
pub fn resolve_glyph(cell: Cell, atlas: Option<&TileAtlas>) -> Glyph {
    let Some(code) = cell.code() else {
        return Glyph::Skip;
    };

    if atlas.is_some_and(|atlas| atlas.tile_origin(code).is_some()) {
        return Glyph::Tile(code);
    }

    match cell.ascii() {
        Some(' ') | None => Glyph::Skip,
        Some(ch) => Glyph::Text(ch),
    }
}
