//! Wire packets and the pure encoder that produces them.
//!
//! # Packet Layout
//! Every write to the shift-register chain is four bytes:
//!
//! | Byte | Register | Polarity |
//! |------|----------|----------|
//! | 0    | Red rows   | active-low (0 = lit) |
//! | 1    | Blue rows  | active-low (0 = lit) |
//! | 2    | Green rows | active-low (0 = lit) |
//! | 3    | Column select | active-high (1 = selected) |
//!
//! Within a colour byte, row `r` is bit `0x80 >> r`, putting the origin in
//! the upper left corner.
//!
//! # Packet Sequence
//! One scan ("tick") emits, for each column in ascending order, a red, a
//! green and a blue packet. Each of them carries one colour mask and forces
//! the other two to `0xFF`, so two colours never share the row lines at the
//! same time. A [`Packet::BLANK`] closes the tick.
//!
//! That is `3 * COLS + 1` = 25 packets, 100 bytes, per tick.

use crate::dither::DitherTable;
use crate::pixel::{Channel, PixelSource};
use crate::{COLS, ROWS};

/// Bytes per packet.
pub const PACKET_LEN: usize = 4;

/// Offset of the red mask.
pub const RED_OFFSET: usize = 0;
/// Offset of the blue mask.
pub const BLUE_OFFSET: usize = 1;
/// Offset of the green mask.
pub const GREEN_OFFSET: usize = 2;
/// Offset of the column select mask.
pub const SELECT_OFFSET: usize = 3;

/// Colour mask with every row dark.
pub const MASK_OFF: u8 = 0xff;

/// Packets emitted by one tick.
pub const PACKETS_PER_TICK: usize = 3 * COLS + 1;

/// One four-byte write to the shift-register chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Packet([u8; PACKET_LEN]);

impl Packet {
    /// Every channel dark and no column selected.
    pub const BLANK: Self = Self::new(MASK_OFF, MASK_OFF, MASK_OFF, 0x00);

    /// Builds a packet from its masks.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8, select: u8) -> Self {
        let mut bytes = [0; PACKET_LEN];
        bytes[RED_OFFSET] = red;
        bytes[BLUE_OFFSET] = blue;
        bytes[GREEN_OFFSET] = green;
        bytes[SELECT_OFFSET] = select;
        Self(bytes)
    }

    /// A packet that drives only `channel` with `mask` on the selected column.
    #[must_use]
    pub const fn for_channel(channel: Channel, mask: u8, select: u8) -> Self {
        match channel {
            Channel::Red => Self::new(mask, MASK_OFF, MASK_OFF, select),
            Channel::Green => Self::new(MASK_OFF, mask, MASK_OFF, select),
            Channel::Blue => Self::new(MASK_OFF, MASK_OFF, mask, select),
        }
    }

    /// Wraps raw bytes as they appear on the wire.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PACKET_LEN]) -> Self {
        Self(bytes)
    }

    /// The bytes in wire order.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    /// Red mask, active-low.
    #[must_use]
    pub const fn red(&self) -> u8 {
        self.0[RED_OFFSET]
    }

    /// Green mask, active-low.
    #[must_use]
    pub const fn green(&self) -> u8 {
        self.0[GREEN_OFFSET]
    }

    /// Blue mask, active-low.
    #[must_use]
    pub const fn blue(&self) -> u8 {
        self.0[BLUE_OFFSET]
    }

    /// Mask of one channel.
    #[must_use]
    pub const fn mask(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.red(),
            Channel::Green => self.green(),
            Channel::Blue => self.blue(),
        }
    }

    /// Column select mask, active-high.
    #[must_use]
    pub const fn select(&self) -> u8 {
        self.0[SELECT_OFFSET]
    }

    /// The channel whose mask is not all dark, if exactly one is.
    ///
    /// Returns `None` for a dark packet and for a packet that drives more
    /// than one channel.
    #[must_use]
    pub fn active_channel(&self) -> Option<Channel> {
        let mut active = Channel::ALL
            .into_iter()
            .filter(|&channel| self.mask(channel) != MASK_OFF);
        match (active.next(), active.next()) {
            (Some(channel), None) => Some(channel),
            _ => None,
        }
    }

    /// Whether no LED is lit by this packet.
    #[must_use]
    pub const fn is_dark(&self) -> bool {
        self.select() == 0
            || (self.red() == MASK_OFF && self.green() == MASK_OFF && self.blue() == MASK_OFF)
    }
}

impl core::fmt::Debug for Packet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Packet(r={:#04x}, b={:#04x}, g={:#04x}, sel={:#010b})",
            self.red(),
            self.blue(),
            self.green(),
            self.select()
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Packet {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Packet(r={=u8:#x}, b={=u8:#x}, g={=u8:#x}, sel={=u8:#b})",
            self.red(),
            self.blue(),
            self.green(),
            self.select()
        );
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Active-low row masks of one column, one per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMasks {
    /// Red rows
    pub red: u8,
    /// Green rows
    pub green: u8,
    /// Blue rows
    pub blue: u8,
}

impl ChannelMasks {
    /// Every row dark on every channel.
    pub const OFF: Self = Self {
        red: MASK_OFF,
        green: MASK_OFF,
        blue: MASK_OFF,
    };

    /// Mask of one channel.
    #[must_use]
    pub const fn get(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }
}

/// Bit that stands for `row` in a colour mask.
#[must_use]
pub const fn row_bit(row: usize) -> u8 {
    0x80 >> row
}

/// Bit that stands for `col` in the select mask.
#[must_use]
pub const fn column_bit(col: usize) -> u8 {
    1 << col
}

/// Computes the row masks of column `col` for a scan in which channels are
/// lit from level `threshold` up.
///
/// All rows of the column are read before anything is returned, so the
/// column's three packets agree on one snapshot of each cell.
///
/// # Panics
///
/// Panics if `col >= COLS` or `pixels` holds fewer than [`crate::PIXEL_COUNT`]
/// bytes.
#[must_use]
pub fn column_masks<P: PixelSource + ?Sized>(
    pixels: &P,
    col: usize,
    threshold: u8,
) -> ChannelMasks {
    assert!(col < COLS, "column {col} out of range");
    let mut masks = ChannelMasks::OFF;
    for row in 0..ROWS {
        let pixel = pixels.pixel(row, col);
        let bit = row_bit(row);
        if pixel.level(Channel::Red) >= threshold {
            masks.red &= !bit;
        }
        if pixel.level(Channel::Green) >= threshold {
            masks.green &= !bit;
        }
        if pixel.level(Channel::Blue) >= threshold {
            masks.blue &= !bit;
        }
    }
    masks
}

/// Encodes the red, green and blue packets of column `col` for frame slot
/// `frame`.
///
/// # Panics
///
/// Same conditions as [`column_masks`].
#[must_use]
pub fn encode_column<P: PixelSource + ?Sized, const SLOTS: usize>(
    pixels: &P,
    table: &DitherTable<SLOTS>,
    col: usize,
    frame: u8,
) -> [Packet; 3] {
    let masks = column_masks(pixels, col, table.threshold(frame));
    let select = column_bit(col);
    Channel::ALL.map(|channel| Packet::for_channel(channel, masks.get(channel), select))
}

/// Encodes a whole tick: [`PACKETS_PER_TICK`] packets in wire order.
///
/// The returned iterator reads each column from `pixels` when it reaches
/// that column, just like a live scan does.
///
/// # Example
/// ```rust
/// use spi595_matrix::packet::{encode_tick, PACKETS_PER_TICK};
/// use spi595_matrix::{DitherTable, Packet, PIXEL_COUNT};
///
/// let mut pixels = [0u8; PIXEL_COUNT];
/// pixels[0] = 0b11_0000; // row 0, col 0: full red
///
/// let packets: Vec<Packet> = encode_tick(&pixels, &DitherTable::LINEAR, 0).collect();
/// assert_eq!(packets.len(), PACKETS_PER_TICK);
/// assert_eq!(packets[0], Packet::new(0x7f, 0xff, 0xff, 0x01));
/// assert_eq!(packets[PACKETS_PER_TICK - 1], Packet::BLANK);
/// ```
#[must_use]
pub fn encode_tick<'a, P: PixelSource + ?Sized, const SLOTS: usize>(
    pixels: &'a P,
    table: &'a DitherTable<SLOTS>,
    frame: u8,
) -> TickPackets<'a, P, SLOTS> {
    TickPackets {
        pixels,
        table,
        frame,
        col: 0,
        column: [Packet::BLANK; 3],
        next: 0,
        done: false,
    }
}

/// Iterator returned by [`encode_tick`].
pub struct TickPackets<'a, P: ?Sized, const SLOTS: usize> {
    pixels: &'a P,
    table: &'a DitherTable<SLOTS>,
    frame: u8,
    col: usize,
    column: [Packet; 3],
    // index into `column`; 0 means the next column has to be encoded first
    next: usize,
    done: bool,
}

impl<P: PixelSource + ?Sized, const SLOTS: usize> Iterator for TickPackets<'_, P, SLOTS> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.done {
            return None;
        }
        if self.col == COLS {
            self.done = true;
            return Some(Packet::BLANK);
        }
        if self.next == 0 {
            self.column = encode_column(self.pixels, self.table, self.col, self.frame);
        }
        let packet = self.column[self.next];
        self.next += 1;
        if self.next == self.column.len() {
            self.next = 0;
            self.col += 1;
        }
        Some(packet)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else {
            (COLS - self.col) * 3 - self.next + 1
        };
        (remaining, Some(remaining))
    }
}

impl<P: PixelSource + ?Sized, const SLOTS: usize> ExactSizeIterator for TickPackets<'_, P, SLOTS> {}

impl<P: PixelSource + ?Sized, const SLOTS: usize> core::iter::FusedIterator
    for TickPackets<'_, P, SLOTS>
{
}
