//! OSD canvas and display abstraction
//!
//! This crate provides:
//! - `Canvas`, the bounded character grid a DisplayPort stream draws into
//! - `Cell`, the value held by each grid position
//! - `DisplayBackend` trait for anything that can show a committed canvas
//!
//! # Architecture
//!
//! The canvas is a pure state machine. It never renders on its own; a
//! draw-screen command only bumps the frame counter and marks the canvas
//! dirty. Whoever owns the canvas decides when to hand it to a backend.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod backend;
pub mod canvas;

// Re-export key types
pub use backend::DisplayBackend;
pub use canvas::{Canvas, Cell, DEFAULT_COLUMNS, DEFAULT_ROWS};
