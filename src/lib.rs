//! Scan and dither engine for 8×8 RGB LED matrices driven through 74HC595
//! shift registers.
//!
//! ## How the Matrix Is Wired
//!
//! The matrix is a grid of common-anode RGB LEDs. Four 74HC595 shift
//! registers are daisy-chained on an SPI bus and latched together by a single
//! chip-select line:
//!
//! - **Red, Blue, Green sinks** – one register per colour, one output per row.
//!   These are **active-low**: a cleared bit lets current flow and lights the LED.
//! - **Column select** – one register sourcing current into one column at a time.
//!   This one is **active-high**: the set bit picks the column being shown.
//!
//! Every write shifts four bytes into the chain in the order
//! `[red, blue, green, select]`; raising chip-select latches them onto the
//! outputs at once.
//!
//! ### Column scanning workflow
//! 1. Chip-select goes low; the controller shifts in the four bytes for one
//!    colour of column N (the other two colour registers are all ones, i.e. off).
//! 2. Chip-select goes high, latching the bytes: that colour of column N lights.
//! 3. Steps 1–2 repeat for green and blue, then for every other column.
//! 4. A final all-off packet blanks the matrix so the last column does not sit
//!    lit until the next scan and look brighter than the rest.
//!
//! Only one colour drives the shared row lines at any moment. Mixing happens
//! in the eye, not on the wire.
//!
//! ### Brightness by dithering
//! The registers only switch LEDs fully on or off. Each cell stores a 2-bit
//! level per channel and every scan compares it against a threshold taken
//! from a [`DitherTable`] slot. A rolling [`FrameCounter`] picks the slot, so
//! over one full cycle a level is lit in as many scans as there are slots
//! whose threshold it reaches. The default table follows the CIE 1931
//! lightness curve over 16 slots:
//!
//! | Level | Lit scans |
//! |-------|-----------|
//! | 0     | 0 / 16    |
//! | 1     | 1 / 16    |
//! | 2     | 6 / 16    |
//! | 3     | 16 / 16   |
//!
//! ## Driving It
//!
//! A [`Driver`] owns a [`TimerPool`], binds a bus, a chip-select pin and a
//! pixel buffer, and arms a periodic timer interrupt. The interrupt handler
//! of that timer calls [`Driver::on_interrupt`], which performs one scan
//! ("tick"). Foreground code keeps drawing into the [`SharedBuffer`] (for
//! example through a [`Canvas`]) while the interrupt reads it. There is no
//! lock between the two; see [`pixel`] for what that means.
//!
//! ## Available Feature Flags
//!
//! ### `samd21` Feature (disabled by default)
//! Selects [`TimerConfig::SAMD21`] as [`TimerConfig::DEFAULT`]. Without it the
//! SAMD51 preset is used.
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the crate's value types and emits `defmt`
//! log messages when the driver binds, rebinds, resets, or fails.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

use embedded_graphics::pixelcolor::Rgb888;

pub mod canvas;
pub mod device;
pub mod dither;
mod error;
pub mod packet;
pub mod pixel;
pub mod scan;
pub mod timer;

#[cfg(test)]
mod fakes;

pub use canvas::Canvas;
pub use device::{Deinit, Driver, Parts, State};
pub use dither::{DitherTable, FrameCounter};
pub use error::{Error, Resource, Result, ScanError};
pub use packet::Packet;
pub use pixel::{Channel, DoubleBuffer, Pixel, PixelSource, SharedBuffer};
pub use timer::{PeriodicTimer, TimerConfig, TimerPool, TimerSlots};

/// Number of rows in the matrix
pub const ROWS: usize = 8;

/// Number of columns in the matrix
pub const COLS: usize = 8;

/// Number of cells, and therefore bytes, in a pixel buffer
pub const PIXEL_COUNT: usize = ROWS * COLS;

/// Highest brightness level a channel can hold
pub const MAX_LEVEL: u8 = 3;

/// Color type accepted by the drawing surface
pub type Color = Rgb888;

/// Returns the buffer index of the cell at `row`, `col`.
///
/// The buffer is row-major: row 0 occupies the first [`COLS`] bytes.
#[must_use]
pub const fn cell_index(row: usize, col: usize) -> usize {
    row * COLS + col
}
