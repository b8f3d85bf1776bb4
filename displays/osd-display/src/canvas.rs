//! OSD canvas
//!
//! A fixed-size grid of cells driven by DisplayPort subcommands.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use osd_protocol::DisplayPortCommand;

/// Default grid width (HD DisplayPort)
pub const DEFAULT_COLUMNS: usize = 60;

/// Default grid height (HD DisplayPort)
pub const DEFAULT_ROWS: usize = 22;

/// String terminator inside write-string payloads
const STRING_TERMINATOR: u8 = 0x00;

/// Placeholder used by [`Canvas::row_text`] for non-printable codes
const NON_PRINTABLE: char = '·';

/// One grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    /// Nothing written since the last clear
    #[default]
    Blank,
    /// Raw byte code as sent by the flight controller
    ///
    /// This is a font index, not necessarily ASCII.
    Code(u8),
}

impl Cell {
    /// Returns true if nothing has been written here
    pub fn is_blank(&self) -> bool {
        matches!(self, Cell::Blank)
    }

    /// Byte code, if any
    pub fn code(&self) -> Option<u8> {
        match self {
            Cell::Blank => None,
            Cell::Code(code) => Some(*code),
        }
    }

    /// Printable ASCII interpretation of the code
    ///
    /// Codes outside 32-126 have no text form.
    pub fn ascii(&self) -> Option<char> {
        self.code()
            .filter(|code| (0x20..=0x7E).contains(code))
            .map(char::from)
    }
}

/// Character grid for one DisplayPort session
///
/// Dimensions are fixed at construction. Every coordinate-taking operation
/// silently ignores positions outside the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    columns: usize,
    rows: usize,
    /// Row-major cells, `rows * columns` long
    cells: Vec<Cell>,
    /// Number of draw-screen commits seen
    frame_counter: u64,
    /// Changes not yet rendered
    dirty: bool,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(DEFAULT_COLUMNS, DEFAULT_ROWS)
    }
}

impl Canvas {
    /// Create a blank canvas
    ///
    /// Zero dimensions are raised to 1 so the grid is never empty.
    pub fn new(columns: usize, rows: usize) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        Self {
            columns,
            rows,
            cells: vec![Cell::Blank; columns * rows],
            frame_counter: 0,
            dirty: true,
        }
    }

    /// Grid width in cells
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Grid height in cells
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of draw-screen commits since construction
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Check if the canvas has unrendered changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark canvas as clean (after rendering)
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Get the cell at a position
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.index(row, col).map(|i| self.cells[i])
    }

    /// Get all cells of a row
    pub fn row_cells(&self, row: usize) -> Option<&[Cell]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.columns;
        Some(&self.cells[start..start + self.columns])
    }

    /// Iterate over `(row, col, cell)` in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Cell)> + '_ {
        let columns = self.columns;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (i / columns, i % columns, *cell))
    }

    /// Reset every cell to blank
    pub fn clear(&mut self) {
        self.cells.fill(Cell::Blank);
        self.dirty = true;
    }

    /// Write a DisplayPort string starting at `(row, col)`
    ///
    /// `data` is the attribute byte followed by the string. The attribute is
    /// dropped (blink/font selection is not modelled), the string stops at
    /// the first zero byte, and anything past the right edge is lost.
    pub fn write(&mut self, row: usize, col: usize, data: &[u8]) {
        let Some(start) = self.index(row, col) else {
            return;
        };
        let Some((_attribute, text)) = data.split_first() else {
            return;
        };

        let text = match text.iter().position(|&b| b == STRING_TERMINATOR) {
            Some(end) => &text[..end],
            None => text,
        };

        let room = self.columns - col;
        for (cell, &byte) in self.cells[start..start + room].iter_mut().zip(text) {
            *cell = Cell::Code(byte);
        }

        self.dirty = true;
    }

    /// Commit the current grid as a frame
    ///
    /// Does not render; it only signals that a coherent frame is ready.
    pub fn draw(&mut self) {
        self.frame_counter += 1;
        self.dirty = true;
    }

    /// Apply one DisplayPort subcommand
    pub fn apply(&mut self, command: &DisplayPortCommand<'_>) {
        match *command {
            DisplayPortCommand::Heartbeat => {}
            DisplayPortCommand::Release | DisplayPortCommand::ClearScreen => self.clear(),
            DisplayPortCommand::WriteString { row, col, data } => {
                self.write(row as usize, col as usize, data)
            }
            DisplayPortCommand::DrawScreen => self.draw(),
        }
    }

    /// Diagnostic text for one row
    ///
    /// Printable ASCII shows as itself, other codes as `·`, blanks as spaces.
    pub fn row_text(&self, row: usize) -> Option<String> {
        self.row_cells(row).map(|cells| {
            cells
                .iter()
                .map(|cell| match cell {
                    Cell::Blank => ' ',
                    cell => cell.ascii().unwrap_or(NON_PRINTABLE),
                })
                .collect()
        })
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.columns).then(|| row * self.columns + col)
    }
}
