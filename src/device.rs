//! The device handle: binds a bus, a chip-select pin and a pixel buffer to a
//! periodic timer.
//!
//! # Lifecycle
//! ```text
//! Uninitialized --init--> Bound --init--> Bound (new parts) ...
//!       ^                   |
//!       +------reset--------+
//! ```
//!
//! A [`Driver`] holds at most one bound device. The first successful
//! [`init`](Driver::init) claims a timer from the pool; later calls reuse it
//! and only swap the parts. [`reset`](Driver::reset) stops the timer, gives
//! it back and drops the binding.
//!
//! # Interrupt Wiring
//! The driver is shared between foreground code, which calls `init` and
//! `reset`, and the interrupt handler of the claimed timer, which calls
//! [`on_interrupt`](Driver::on_interrupt). Keep it in a
//! `critical_section::Mutex<RefCell<_>>` or similar, so the two never run at
//! once:
//!
//! ```rust,ignore
//! static DRIVER: Mutex<RefCell<Option<Matrix>>> = Mutex::new(RefCell::new(None));
//!
//! #[interrupt]
//! fn TC3() {
//!     critical_section::with(|cs| {
//!         if let Some(driver) = DRIVER.borrow_ref_mut(cs).as_mut() {
//!             if let Err(err) = driver.on_interrupt() {
//!                 panic!("matrix scan failed: {err}");
//!             }
//!         }
//!     });
//! }
//! ```
//!
//! The pixel buffer is not behind that lock: foreground code writes it at any
//! time.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::dither::{DitherTable, FrameCounter};
use crate::error::{Error, Resource, Result, ScanError};
use crate::pixel::PixelSource;
use crate::scan;
use crate::timer::{TimerBinding, TimerConfig, TimerPool};
use crate::PIXEL_COUNT;

/// Peripheral handles whose owner can tear them down.
///
/// The driver refuses handles that report themselves deinitialized. Handles
/// that cannot be torn down need nothing more than an empty impl:
///
/// ```rust,ignore
/// impl Deinit for MySpi {}
/// ```
pub trait Deinit {
    /// Whether the handle has been deinitialized.
    fn is_deinited(&self) -> bool {
        false
    }
}

impl<T: Deinit + ?Sized> Deinit for &mut T {
    fn is_deinited(&self) -> bool {
        (**self).is_deinited()
    }
}

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No device bound and no timer claimed
    Uninitialized,
    /// A device is bound and the timer is running
    Bound,
}

/// The parts of a bound device.
#[derive(Debug)]
pub struct Parts<SPI, CS, B> {
    /// SPI bus the shift registers hang off
    pub bus: SPI,
    /// Latch line of the shift registers, active low
    pub select: CS,
    /// Pixels to show
    pub buffer: B,
}

/// The matrix driver.
///
/// # Type Parameters
///
/// * `P` - Pool the scan timer is claimed from
/// * `SPI` - SPI bus
/// * `CS` - Chip-select output
/// * `B` - Pixel buffer, typically `&'static SharedBuffer`
/// * `SLOTS` - Frame slots in the dither table
pub struct Driver<P: TimerPool, SPI, CS, B, const SLOTS: usize = 16> {
    pool: P,
    config: TimerConfig,
    table: DitherTable<SLOTS>,
    timer: Option<TimerBinding<P::Timer>>,
    device: Option<Parts<SPI, CS, B>>,
    frame: FrameCounter<SLOTS>,
}

impl<P, SPI, CS, B> Driver<P, SPI, CS, B>
where
    P: TimerPool,
    SPI: SpiBus<u8> + Deinit,
    CS: OutputPin + Deinit,
    B: PixelSource,
{
    /// A driver using [`TimerConfig::DEFAULT`] and the 16-slot
    /// [`DitherTable::CIE`] table.
    #[must_use]
    pub fn with_pool(pool: P) -> Self {
        Self::new(pool, TimerConfig::DEFAULT, DitherTable::CIE)
    }
}

impl<P, SPI, CS, B, const SLOTS: usize> Driver<P, SPI, CS, B, SLOTS>
where
    P: TimerPool,
    SPI: SpiBus<u8> + Deinit,
    CS: OutputPin + Deinit,
    B: PixelSource,
{
    /// A driver with nothing bound. No timer is claimed until the first
    /// [`init`](Self::init).
    #[must_use]
    pub fn new(pool: P, config: TimerConfig, table: DitherTable<SLOTS>) -> Self {
        Self {
            pool,
            config,
            table,
            timer: None,
            device: None,
            frame: FrameCounter::new(),
        }
    }

    /// Binds a device and makes sure the scan timer runs.
    ///
    /// If a device is already bound its parts are replaced and handed back;
    /// the timer keeps running unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::Deinitialized`] if `bus` or `select` has been torn down
    /// - [`Error::WrongBufferSize`] if `buffer` is not [`PIXEL_COUNT`] bytes
    /// - [`Error::NoFreeTimer`] if no timer could be claimed
    ///
    /// On error the driver is left exactly as it was.
    pub fn init(&mut self, bus: SPI, select: CS, buffer: B) -> Result<Option<Parts<SPI, CS, B>>> {
        if bus.is_deinited() {
            return Err(Error::Deinitialized(Resource::Bus));
        }
        if select.is_deinited() {
            return Err(Error::Deinitialized(Resource::ChipSelect));
        }
        if buffer.len() != PIXEL_COUNT {
            return Err(Error::WrongBufferSize {
                expected: PIXEL_COUNT,
                actual: buffer.len(),
            });
        }

        if self.timer.is_none() {
            self.timer = Some(TimerBinding::arm(&mut self.pool, &self.config)?);
        } else {
            #[cfg(feature = "defmt")]
            defmt::debug!("spi595: rebinding device");
        }

        Ok(self.device.replace(Parts { bus, select, buffer }))
    }

    /// Stops the scan timer, returns it to the pool and unbinds the device.
    ///
    /// Safe to call at any time, any number of times. Returns the parts that
    /// were bound, if any.
    pub fn reset(&mut self) -> Option<Parts<SPI, CS, B>> {
        // Timer first, so no tick can run against a half-cleared driver
        if let Some(binding) = self.timer.take() {
            binding.disarm(&mut self.pool);
        }
        self.frame.reset();
        #[cfg(feature = "defmt")]
        defmt::debug!("spi595: reset");
        self.device.take()
    }

    /// Runs one scan of the bound device and advances the frame counter.
    ///
    /// Does nothing when no device is bound.
    ///
    /// # Errors
    ///
    /// Returns the bus or pin failure that stopped the scan. The matrix has
    /// been blanked on a best-effort basis and the frame counter is left
    /// where it was.
    pub fn tick(&mut self) -> core::result::Result<(), ScanError<SPI::Error, CS::Error>> {
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        let result = scan::scan(
            &mut device.bus,
            &mut device.select,
            &device.buffer,
            &self.table,
            self.frame.get(),
        );
        match result {
            Ok(()) => {
                self.frame.advance();
                Ok(())
            }
            Err(err) => {
                #[cfg(feature = "defmt")]
                defmt::error!("spi595: scan failed in frame {}", self.frame.get());
                Err(err)
            }
        }
    }

    /// Entry point for the bound timer's interrupt handler.
    ///
    /// Runs a [`tick`](Self::tick) if the timer's match flag is set, then
    /// clears the flag. Does nothing when no timer is bound or the flag is
    /// not set.
    ///
    /// # Errors
    ///
    /// Same as [`tick`](Self::tick). The caller should treat a failure as
    /// fatal: a bus that fails mid-scan leaves the display in an unknown
    /// state.
    pub fn on_interrupt(&mut self) -> core::result::Result<(), ScanError<SPI::Error, CS::Error>> {
        let Some(mut binding) = self.timer.take() else {
            return Ok(());
        };
        let result = binding.service(|| self.tick());
        self.timer = Some(binding);
        result.unwrap_or(Ok(()))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        if self.device.is_some() {
            State::Bound
        } else {
            State::Uninitialized
        }
    }

    /// Whether a device is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.device.is_some()
    }

    /// Hardware index of the claimed timer.
    #[must_use]
    pub fn timer_index(&self) -> Option<u8> {
        self.timer.as_ref().map(TimerBinding::index)
    }

    /// The claimed timer.
    #[must_use]
    pub fn timer(&self) -> Option<&P::Timer> {
        self.timer.as_ref().map(TimerBinding::timer)
    }

    /// Frame slot the next tick will use.
    #[must_use]
    pub fn frame(&self) -> u8 {
        self.frame.get()
    }

    /// The dither table.
    #[must_use]
    pub fn table(&self) -> &DitherTable<SLOTS> {
        &self.table
    }

    /// The timer configuration applied on the first `init`.
    #[must_use]
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// The bound parts.
    #[must_use]
    pub fn parts(&self) -> Option<&Parts<SPI, CS, B>> {
        self.device.as_ref()
    }

    /// The timer pool.
    #[must_use]
    pub fn pool(&self) -> &P {
        &self.pool
    }
}

impl<P, SPI, CS, B, const SLOTS: usize> core::fmt::Debug for Driver<P, SPI, CS, B, SLOTS>
where
    P: TimerPool,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Driver")
            .field("bound", &self.device.is_some())
            .field("timer", &self.timer.as_ref().map(TimerBinding::index))
            .field("frame", &self.frame.get())
            .field("slots", &SLOTS)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
