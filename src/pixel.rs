//! Pixel encoding and the buffer shared between foreground code and the scan
//! interrupt.
//!
//! # Cell Layout
//! Each cell is one byte holding three 2-bit brightness levels:
//!
//! | Bits | Field |
//! |------|-------|
//! | 7-6  | unused |
//! | 5-4  | red   |
//! | 3-2  | green |
//! | 1-0  | blue  |
//!
//! Any byte value is legal. The unused bits are carried along but never
//! consulted by the scan.
//!
//! # Sharing
//! [`SharedBuffer`] is read by the scan interrupt while foreground code keeps
//! writing it. There is no lock:
//! - every cell is an [`AtomicU8`] accessed with relaxed ordering, so each
//!   byte is always read whole;
//! - the last writer wins;
//! - a scan that races an update may show part of the old and part of the new
//!   image for one tick. This is cosmetic and lasts at most one frame.
//!
//! When that tearing matters, draw into a [`DoubleBuffer`] instead and
//! [`present`](DoubleBuffer::present) finished frames; the swap is applied
//! only between scans.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use bitfield::bitfield;
use embedded_graphics::pixelcolor::RgbColor;

use crate::{cell_index, Color, PIXEL_COUNT};

bitfield! {
    /// One matrix cell.
    ///
    /// The bit layout is as follows:
    /// - Bits 5-4: Red level
    /// - Bits 3-2: Green level
    /// - Bits 1-0: Blue level
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Pixel(u8);
    impl Debug;
    /// Red level, 0 to 3
    pub red, set_red: 5, 4;
    /// Green level, 0 to 3
    pub green, set_green: 3, 2;
    /// Blue level, 0 to 3
    pub blue, set_blue: 1, 0;
}

impl Pixel {
    /// All channels off.
    pub const OFF: Self = Self(0);

    /// All channels at full level.
    pub const WHITE: Self = Self::from_levels(3, 3, 3);

    /// Builds a pixel from three levels. Only the low two bits of each level
    /// are kept.
    #[must_use]
    pub const fn from_levels(red: u8, green: u8, blue: u8) -> Self {
        Self(((red & 0b11) << 4) | ((green & 0b11) << 2) | (blue & 0b11))
    }

    /// Wraps a raw buffer byte.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw byte as stored in the buffer.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Level of one channel.
    #[must_use]
    pub const fn level(self, channel: Channel) -> u8 {
        (self.0 >> channel.shift()) & 0b11
    }
}

impl From<Color> for Pixel {
    /// Keeps the two most significant bits of each component.
    fn from(color: Color) -> Self {
        Self::from_levels(color.r() >> 6, color.g() >> 6, color.b() >> 6)
    }
}

impl From<Pixel> for Color {
    fn from(pixel: Pixel) -> Self {
        // 0, 85, 170, 255
        let expand = |level: u8| level * 85;
        Color::new(
            expand(pixel.level(Channel::Red)),
            expand(pixel.level(Channel::Green)),
            expand(pixel.level(Channel::Blue)),
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Pixel {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Pixel(r={}, g={}, b={})",
            self.level(Channel::Red),
            self.level(Channel::Green),
            self.level(Channel::Blue)
        );
    }
}

/// A colour channel, listed in the order a column is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Red
    Red,
    /// Green
    Green,
    /// Blue
    Blue,
}

impl Channel {
    /// Channels in scan order.
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Position of this channel's field inside a [`Pixel`].
    #[must_use]
    pub const fn shift(self) -> u8 {
        match self {
            Channel::Red => 4,
            Channel::Green => 2,
            Channel::Blue => 0,
        }
    }
}

/// Read access to a pixel buffer as seen by the scan.
///
/// Implementations must tolerate being read from interrupt context while the
/// foreground writes; see the [module documentation](self).
pub trait PixelSource {
    /// Number of bytes in the buffer.
    fn len(&self) -> usize;

    /// Whether the buffer holds no bytes at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw byte at `index`.
    ///
    /// # Panics
    ///
    /// May panic if `index >= self.len()`.
    fn byte(&self, index: usize) -> u8;

    /// Called once at the start of every scan, before any byte is read.
    fn begin_scan(&self) {}

    /// Cell at `row`, `col`.
    fn pixel(&self, row: usize, col: usize) -> Pixel {
        Pixel(self.byte(cell_index(row, col)))
    }
}

impl PixelSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn byte(&self, index: usize) -> u8 {
        self[index]
    }
}

impl<const N: usize> PixelSource for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn byte(&self, index: usize) -> u8 {
        self[index]
    }
}

impl PixelSource for [AtomicU8] {
    fn len(&self) -> usize {
        <[AtomicU8]>::len(self)
    }

    fn byte(&self, index: usize) -> u8 {
        self[index].load(Ordering::Relaxed)
    }
}

impl<T: PixelSource + ?Sized> PixelSource for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn byte(&self, index: usize) -> u8 {
        (**self).byte(index)
    }

    fn begin_scan(&self) {
        (**self).begin_scan();
    }
}

/// Pixel buffer shared between foreground code and the scan interrupt.
///
/// Usually placed in a `static` so the driver can borrow it for `'static`:
///
/// ```rust
/// use spi595_matrix::{Pixel, SharedBuffer};
///
/// static PIXELS: SharedBuffer = SharedBuffer::new();
///
/// PIXELS.set(0, 0, Pixel::from_levels(3, 0, 0));
/// assert_eq!(PIXELS.get(0, 0).red(), 3);
/// ```
#[repr(transparent)]
pub struct SharedBuffer {
    cells: [AtomicU8; PIXEL_COUNT],
}

impl SharedBuffer {
    /// A buffer with every cell off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cells: [const { AtomicU8::new(0) }; PIXEL_COUNT],
        }
    }

    /// Reads the cell at `row`, `col`.
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside the matrix.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Pixel {
        Pixel(self.cells[cell_index(row, col)].load(Ordering::Relaxed))
    }

    /// Writes the cell at `row`, `col`.
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside the matrix.
    pub fn set(&self, row: usize, col: usize, pixel: Pixel) {
        self.cells[cell_index(row, col)].store(pixel.0, Ordering::Relaxed);
    }

    /// Sets every cell to `pixel`.
    pub fn fill(&self, pixel: Pixel) {
        for cell in &self.cells {
            cell.store(pixel.0, Ordering::Relaxed);
        }
    }

    /// Turns every cell off.
    pub fn clear(&self) {
        self.fill(Pixel::OFF);
    }

    /// Copies a whole image in, cell by cell.
    pub fn load(&self, image: &[u8; PIXEL_COUNT]) {
        for (cell, &bits) in self.cells.iter().zip(image) {
            cell.store(bits, Ordering::Relaxed);
        }
    }

    /// Copies the current contents out.
    #[must_use]
    pub fn snapshot(&self) -> [u8; PIXEL_COUNT] {
        core::array::from_fn(|i| self.cells[i].load(Ordering::Relaxed))
    }

    /// The cells as a slice, e.g. to hand to [`crate::Driver::init`].
    #[must_use]
    pub fn as_slice(&self) -> &[AtomicU8] {
        &self.cells
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelSource for SharedBuffer {
    fn len(&self) -> usize {
        PIXEL_COUNT
    }

    fn byte(&self, index: usize) -> u8 {
        self.cells[index].load(Ordering::Relaxed)
    }
}

impl core::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("cells", &self.snapshot())
            .finish()
    }
}

/// Two buffers that trade places between scans.
///
/// Foreground code draws into [`back`](Self::back) and calls
/// [`present`](Self::present). The scan interrupt applies the swap at the
/// start of its next tick, so no tick ever reads a frame that is still being
/// drawn. Until [`is_present_pending`](Self::is_present_pending) turns false
/// the old front is still on screen and must not be drawn into.
pub struct DoubleBuffer {
    buffers: [SharedBuffer; 2],
    front: AtomicUsize,
    pending: AtomicBool,
}

impl DoubleBuffer {
    /// Both buffers off, buffer 0 in front.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffers: [SharedBuffer::new(), SharedBuffer::new()],
            front: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
        }
    }

    /// The buffer currently being scanned.
    #[must_use]
    pub fn front(&self) -> &SharedBuffer {
        &self.buffers[self.front.load(Ordering::Acquire)]
    }

    /// The buffer to draw the next frame into.
    #[must_use]
    pub fn back(&self) -> &SharedBuffer {
        &self.buffers[self.front.load(Ordering::Acquire) ^ 1]
    }

    /// Requests that the back buffer be shown from the next scan on.
    pub fn present(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Whether a [`present`](Self::present) has not been picked up by a scan yet.
    #[must_use]
    pub fn is_present_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for DoubleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelSource for DoubleBuffer {
    fn len(&self) -> usize {
        PIXEL_COUNT
    }

    fn byte(&self, index: usize) -> u8 {
        self.front().byte(index)
    }

    fn begin_scan(&self) {
        if self.pending.swap(false, Ordering::AcqRel) {
            self.front.fetch_xor(1, Ordering::AcqRel);
        }
    }
}

impl core::fmt::Debug for DoubleBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DoubleBuffer")
            .field("front", &self.front.load(Ordering::Relaxed))
            .field("pending", &self.is_present_pending())
            .finish_non_exhaustive()
    }
}
