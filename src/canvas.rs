//! `embedded-graphics` drawing onto a [`SharedBuffer`].
//!
//! Colours are quantized to two bits per channel (see [`Pixel`]). Points
//! outside the 8×8 grid are dropped.
//!
//! ```rust
//! use embedded_graphics::pixelcolor::Rgb888;
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
//! use spi595_matrix::{Canvas, Pixel, SharedBuffer};
//!
//! static BUFFER: SharedBuffer = SharedBuffer::new();
//!
//! let mut canvas = Canvas::new(&BUFFER);
//! Rectangle::new(Point::new(2, 2), Size::new(4, 4))
//!     .into_styled(PrimitiveStyle::with_fill(Rgb888::GREEN))
//!     .draw(&mut canvas)
//!     .unwrap();
//! assert_eq!(BUFFER.get(3, 3), Pixel::from_levels(0, 3, 0));
//! ```

use core::convert::Infallible;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::prelude::{OriginDimensions, Point, Size};

use crate::pixel::{Pixel, SharedBuffer};
use crate::{Color, COLS, ROWS};

/// A drawing surface over a pixel buffer.
///
/// Writes go straight to the buffer, so a running scan picks them up on its
/// next pass over the affected column.
#[derive(Debug, Clone, Copy)]
pub struct Canvas<'a> {
    buffer: &'a SharedBuffer,
}

impl<'a> Canvas<'a> {
    /// A canvas drawing into `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a SharedBuffer) -> Self {
        Self { buffer }
    }

    /// The buffer being drawn into.
    #[must_use]
    pub const fn buffer(&self) -> &'a SharedBuffer {
        self.buffer
    }

    /// Sets the cell at `point` (x is the column, y the row). Out of range
    /// points are ignored.
    pub fn set_pixel(&mut self, point: Point, color: Color) {
        let (Ok(col), Ok(row)) = (usize::try_from(point.x), usize::try_from(point.y)) else {
            return;
        };
        if row < ROWS && col < COLS {
            self.buffer.set(row, col, Pixel::from(color));
        }
    }
}

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(COLS as u32, ROWS as u32)
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for embedded_graphics::Pixel(point, color) in pixels {
            self.set_pixel(point, color);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buffer.fill(Pixel::from(color));
        Ok(())
    }
}
