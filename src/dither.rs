//! Dither thresholds and the frame counter that walks them.
//!
//! A [`DitherTable`] has one threshold per frame slot. During a scan in slot
//! `i`, a channel is lit when its level is at least `thresholds[i]`. Over a
//! full cycle of `SLOTS` scans a level is therefore lit
//! [`lit_slots(level)`](DitherTable::lit_slots) times.
//!
//! The slot count must be a power of two so the [`FrameCounter`] can wrap
//! with a mask.

/// Thresholds for the 16-slot table.
///
/// Derived from the CIE 1931 lightness curve for a 2-bit input and a 16-step
/// output (see <https://jared.geek.nz/2013/feb/linear-led-pwm>):
/// - Level 3: 16 frames on, 0 frames off
/// - Level 2: 6 frames on, 10 frames off
/// - Level 1: 1 frame on, 15 frames off
/// - Level 0: never on
pub const CIE_16: [u8; 16] = [1, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3];

/// Thresholds for the shorter 8-slot table.
///
/// Level 1 is lit 1/8, level 2 3/8 and level 3 every scan. Flickers less at
/// low tick rates at the cost of a coarser level 2.
pub const LINEAR_8: [u8; 8] = [1, 2, 2, 3, 3, 3, 3, 3];

/// Per-slot brightness thresholds.
///
/// # Type Parameters
///
/// * `SLOTS` - Number of frame slots in one dither cycle (power of two)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DitherTable<const SLOTS: usize> {
    thresholds: [u8; SLOTS],
}

impl<const SLOTS: usize> DitherTable<SLOTS> {
    /// Mask applied to the frame counter.
    pub const FRAME_MASK: u8 = {
        assert!(
            SLOTS.is_power_of_two() && SLOTS <= 256,
            "dither slot count must be a power of two no larger than 256"
        );
        (SLOTS - 1) as u8
    };

    /// Wraps a threshold array.
    ///
    /// # Panics
    ///
    /// Panics if any threshold is 0, since level 0 must never light. In a
    /// `const` context this is a compile error.
    ///
    /// # Example
    /// ```rust
    /// use spi595_matrix::DitherTable;
    ///
    /// let table = DitherTable::new([1, 2, 2, 3, 3, 3, 3, 3]);
    /// assert_eq!(table.threshold(3), 3);
    /// assert_eq!(table.lit_slots(2), 3);
    /// ```
    #[must_use]
    pub const fn new(thresholds: [u8; SLOTS]) -> Self {
        // Force the slot count check at compile time
        let _ = Self::FRAME_MASK;
        let mut slot = 0;
        while slot < SLOTS {
            assert!(thresholds[slot] >= 1, "dither threshold must be at least 1");
            slot += 1;
        }
        Self { thresholds }
    }

    /// Threshold for frame slot `frame`. The index is masked, so any counter
    /// value is accepted.
    #[must_use]
    pub const fn threshold(&self, frame: u8) -> u8 {
        self.thresholds[(frame & Self::FRAME_MASK) as usize]
    }

    /// Whether a channel at `level` is lit during frame slot `frame`.
    #[must_use]
    pub const fn is_lit(&self, level: u8, frame: u8) -> bool {
        level >= self.threshold(frame)
    }

    /// Number of slots per cycle in which a channel at `level` is lit.
    #[must_use]
    pub fn lit_slots(&self, level: u8) -> usize {
        self.thresholds.iter().filter(|&&t| level >= t).count()
    }

    /// The raw thresholds.
    #[must_use]
    pub const fn thresholds(&self) -> &[u8; SLOTS] {
        &self.thresholds
    }

    /// Number of frame slots.
    #[must_use]
    pub const fn slots(&self) -> usize {
        SLOTS
    }
}

impl DitherTable<16> {
    /// The default 16-slot table, see [`CIE_16`].
    pub const CIE: Self = Self::new(CIE_16);
}

impl DitherTable<8> {
    /// The 8-slot table, see [`LINEAR_8`].
    pub const LINEAR: Self = Self::new(LINEAR_8);
}

impl Default for DitherTable<16> {
    fn default() -> Self {
        Self::CIE
    }
}

#[cfg(feature = "defmt")]
impl<const SLOTS: usize> defmt::Format for DitherTable<SLOTS> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DitherTable<{}> {=[u8]}", SLOTS, &self.thresholds[..]);
    }
}

/// Cyclic index of the current frame slot.
///
/// Starts at 0 and advances once per completed scan, wrapping at `SLOTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameCounter<const SLOTS: usize> {
    frame: u8,
}

impl<const SLOTS: usize> FrameCounter<SLOTS> {
    /// A counter at slot 0.
    #[must_use]
    pub const fn new() -> Self {
        Self { frame: 0 }
    }

    /// Current slot.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.frame
    }

    /// Moves to the next slot, wrapping to 0 after the last.
    pub fn advance(&mut self) {
        self.frame = self.frame.wrapping_add(1) & DitherTable::<SLOTS>::FRAME_MASK;
    }

    /// Back to slot 0.
    pub fn reset(&mut self) {
        self.frame = 0;
    }
}
