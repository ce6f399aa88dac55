use derive_more::derive::{Display, Error};

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Peripheral handle named by [`Error::Deinitialized`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resource {
    /// The SPI bus
    #[display("spi bus")]
    Bus,
    /// The chip-select output
    #[display("chip select")]
    ChipSelect,
}

/// Errors reported while setting up the driver.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The pixel buffer is not exactly [`crate::PIXEL_COUNT`] bytes long.
    #[display("Incorrect buffer size: expected {expected} bytes, got {actual}")]
    WrongBufferSize {
        /// Required length
        expected: usize,
        /// Length of the buffer that was offered
        actual: usize,
    },

    /// A peripheral handle was torn down by its owner.
    #[display("{_0} has been deinitialized")]
    Deinitialized(#[error(not(source))] Resource),

    /// Every hardware timer is already claimed.
    #[display("All timers in use")]
    NoFreeTimer,

    /// No compare value gives the requested tick rate with this clock and
    /// prescaler.
    #[display("Tick rate of {rate_hz} Hz cannot be reached")]
    UnreachableRate {
        /// Requested rate
        rate_hz: u32,
    },
}

/// Failure inside a scan, carrying the error of the peripheral that failed.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ScanError<B, P> {
    /// Writing or flushing the SPI bus failed.
    #[display("spi write failed: {_0:?}")]
    Bus(B),
    /// Driving the chip-select line failed.
    #[display("chip select failed: {_0:?}")]
    Select(P),
}

impl<B: core::fmt::Debug, P: core::fmt::Debug> core::error::Error for ScanError<B, P> {}
