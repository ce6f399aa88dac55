//! Hardware timer binding.
//!
//! The scan runs from the match interrupt of a periodic timer. This module
//! describes the timer the driver needs ([`PeriodicTimer`]), where it comes
//! from ([`TimerPool`]), how fast it ticks ([`TimerConfig`]), and owns the
//! claimed timer for as long as a device is bound ([`TimerBinding`]).
//!
//! # Cadence
//! Both presets clock the timer from a 48 MHz generator and match at 188:
//!
//! | Preset | Prescaler | Tick rate | Refresh with 16 slots |
//! |--------|-----------|-----------|-----------------------|
//! | [`TimerConfig::SAMD51`] | 256 | 992 Hz | 62 Hz |
//! | [`TimerConfig::SAMD21`] | 64  | 3968 Hz | 248 Hz |
//!
//! The tick rate bounds how much CPU the scan takes: one tick writes 100
//! bytes and toggles chip-select 25 times.

use crate::{Error, Result};

/// Timer input clock divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// No division
    Div1,
    /// Divide by 2
    Div2,
    /// Divide by 4
    Div4,
    /// Divide by 8
    Div8,
    /// Divide by 16
    Div16,
    /// Divide by 64
    Div64,
    /// Divide by 256
    Div256,
    /// Divide by 1024
    Div1024,
}

impl Prescaler {
    /// The division factor.
    #[must_use]
    pub const fn divisor(self) -> u32 {
        match self {
            Prescaler::Div1 => 1,
            Prescaler::Div2 => 2,
            Prescaler::Div4 => 4,
            Prescaler::Div8 => 8,
            Prescaler::Div16 => 16,
            Prescaler::Div64 => 64,
            Prescaler::Div256 => 256,
            Prescaler::Div1024 => 1024,
        }
    }
}

/// How a claimed timer is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    /// Clock generator feeding the timer
    pub generator: u8,
    /// Frequency of that generator
    pub source_hz: u32,
    /// Input divider
    pub prescaler: Prescaler,
    /// Match value; the timer wraps and interrupts after `compare + 1` counts
    pub compare: u16,
}

impl TimerConfig {
    /// SAMD51: generator 1 at 48 MHz, divide by 256, match at 188.
    pub const SAMD51: Self = Self {
        generator: 1,
        source_hz: 48_000_000,
        prescaler: Prescaler::Div256,
        compare: 188,
    };

    /// SAMD21: generator 0 at 48 MHz, divide by 64, match at 188.
    pub const SAMD21: Self = Self {
        generator: 0,
        source_hz: 48_000_000,
        prescaler: Prescaler::Div64,
        compare: 188,
    };

    /// The preset selected by the `samd21` feature.
    #[cfg(feature = "samd21")]
    pub const DEFAULT: Self = Self::SAMD21;

    /// The preset selected by the `samd21` feature.
    #[cfg(not(feature = "samd21"))]
    pub const DEFAULT: Self = Self::SAMD51;

    /// Derives the match value for `rate_hz` ticks per second.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnreachableRate`] when the rate is zero, faster than
    /// the prescaled clock, or so slow that the match value does not fit in
    /// 16 bits.
    ///
    /// # Example
    /// ```rust
    /// use spi595_matrix::timer::{Prescaler, TimerConfig};
    ///
    /// let config = TimerConfig::for_rate(1, 48_000_000, Prescaler::Div256, 1000).unwrap();
    /// assert_eq!(config.compare, 186);
    /// assert_eq!(config.tick_hz(), 1002);
    /// ```
    pub fn for_rate(
        generator: u8,
        source_hz: u32,
        prescaler: Prescaler,
        rate_hz: u32,
    ) -> Result<Self> {
        let counts = (source_hz / prescaler.divisor())
            .checked_div(rate_hz)
            .ok_or(Error::UnreachableRate { rate_hz })?;
        let compare = counts
            .checked_sub(1)
            .and_then(|c| u16::try_from(c).ok())
            .ok_or(Error::UnreachableRate { rate_hz })?;
        Ok(Self {
            generator,
            source_hz,
            prescaler,
            compare,
        })
    }

    /// Ticks per second.
    #[must_use]
    pub const fn tick_hz(&self) -> u32 {
        self.source_hz / self.prescaler.divisor() / (self.compare as u32 + 1)
    }

    /// Complete dither cycles per second for a table of `slots` slots, or
    /// `None` when `slots` is 0.
    #[must_use]
    pub const fn refresh_hz(&self, slots: usize) -> Option<u32> {
        self.tick_hz().checked_div(slots as u32)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A hardware timer able to raise a periodic match interrupt.
///
/// Implemented by the board support code on top of its HAL.
pub trait PeriodicTimer {
    /// Hardware index of this timer.
    fn index(&self) -> u8;

    /// Returns the timer to its power-on state: stopped, interrupt masked.
    fn reset(&mut self);

    /// Routes the clock and programs prescaler and match value. Called on a
    /// stopped timer.
    fn configure(&mut self, config: &TimerConfig);

    /// Starts counting.
    fn start(&mut self);

    /// Unmasks the match interrupt.
    fn enable_interrupt(&mut self);

    /// Whether the match flag is set.
    fn is_interrupt_pending(&self) -> bool;

    /// Clears the match flag.
    fn clear_interrupt(&mut self);
}

/// Hands out timers that nothing else is using.
pub trait TimerPool {
    /// The timer type handed out.
    type Timer: PeriodicTimer;

    /// Takes a free timer, or `None` if all are in use.
    fn claim(&mut self) -> Option<Self::Timer>;

    /// Gives a timer back.
    fn release(&mut self, timer: Self::Timer);
}

/// A fixed set of timers handed out first-free.
///
/// # Type Parameters
///
/// * `N` - Number of timers in the pool
#[derive(Debug)]
pub struct TimerSlots<T, const N: usize> {
    slots: [Option<T>; N],
}

impl<T, const N: usize> TimerSlots<T, N> {
    /// A pool holding all of `timers`.
    pub fn new(timers: [T; N]) -> Self {
        Self {
            slots: timers.map(Some),
        }
    }

    /// A pool with nothing in it.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Number of timers that can still be claimed.
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl<T: PeriodicTimer, const N: usize> TimerPool for TimerSlots<T, N> {
    type Timer = T;

    fn claim(&mut self) -> Option<T> {
        self.slots.iter_mut().find_map(Option::take)
    }

    fn release(&mut self, timer: T) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(timer);
        }
    }
}

/// A claimed timer wired up to the scan.
#[derive(Debug)]
pub struct TimerBinding<T> {
    timer: T,
}

impl<T: PeriodicTimer> TimerBinding<T> {
    /// Claims a free timer from `pool` and starts it with `config`.
    ///
    /// The timer is reset, configured, has any stale match flag cleared, is
    /// started, and finally has its interrupt unmasked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFreeTimer`] if the pool is exhausted. Nothing is
    /// configured in that case.
    pub fn arm<P>(pool: &mut P, config: &TimerConfig) -> Result<Self>
    where
        P: TimerPool<Timer = T>,
    {
        let Some(mut timer) = pool.claim() else {
            #[cfg(feature = "defmt")]
            defmt::warn!("spi595: no free timer");
            return Err(Error::NoFreeTimer);
        };
        timer.reset();
        timer.configure(config);
        timer.clear_interrupt();
        timer.start();
        timer.enable_interrupt();
        #[cfg(feature = "defmt")]
        defmt::debug!("spi595: armed timer {} at {} Hz", timer.index(), config.tick_hz());
        Ok(Self { timer })
    }

    /// Runs `on_match` if the match flag is set, then clears the flag.
    ///
    /// Returns whatever `on_match` returned, or `None` for a spurious call.
    pub fn service<R>(&mut self, on_match: impl FnOnce() -> R) -> Option<R> {
        if !self.timer.is_interrupt_pending() {
            return None;
        }
        let result = on_match();
        self.timer.clear_interrupt();
        Some(result)
    }

    /// Hardware index of the bound timer.
    #[must_use]
    pub fn index(&self) -> u8 {
        self.timer.index()
    }

    /// The bound timer.
    #[must_use]
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Stops the timer and gives it back to `pool`.
    pub fn disarm<P>(mut self, pool: &mut P)
    where
        P: TimerPool<Timer = T>,
    {
        self.timer.reset();
        #[cfg(feature = "defmt")]
        defmt::debug!("spi595: released timer {}", self.timer.index());
        pool.release(self.timer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeTimer;

    #[test]
    fn test_prescaler_divisors() {
        let expected = [
            (Prescaler::Div1, 1),
            (Prescaler::Div2, 2),
            (Prescaler::Div4, 4),
            (Prescaler::Div8, 8),
            (Prescaler::Div16, 16),
            (Prescaler::Div64, 64),
            (Prescaler::Div256, 256),
            (Prescaler::Div1024, 1024),
        ];
        for (prescaler, divisor) in expected {
            assert_eq!(prescaler.divisor(), divisor);
        }
    }

    #[test]
    fn test_preset_rates() {
        assert_eq!(TimerConfig::SAMD51.tick_hz(), 992);
        assert_eq!(TimerConfig::SAMD21.tick_hz(), 3968);
        assert_eq!(TimerConfig::SAMD51.refresh_hz(16), Some(62));
        assert_eq!(TimerConfig::SAMD21.refresh_hz(16), Some(248));
        assert_eq!(TimerConfig::SAMD51.generator, 1);
        assert_eq!(TimerConfig::SAMD21.generator, 0);
    }

    #[test]
    fn test_default_preset() {
        #[cfg(feature = "samd21")]
        assert_eq!(TimerConfig::default(), TimerConfig::SAMD21);
        #[cfg(not(feature = "samd21"))]
        assert_eq!(TimerConfig::default(), TimerConfig::SAMD51);
    }

    #[test]
    fn test_refresh_without_slots() {
        assert_eq!(TimerConfig::SAMD51.refresh_hz(0), None);
        assert_eq!(TimerConfig::SAMD21.refresh_hz(1), Some(3968));
    }

    #[test]
    fn test_for_rate_matches_presets() {
        let config = TimerConfig::for_rate(1, 48_000_000, Prescaler::Div256, 992).unwrap();
        assert_eq!(config.compare, 188);
        assert_eq!(config.tick_hz(), 992);
    }

    #[test]
    fn test_for_rate_rejects_unreachable() {
        // Zero
        assert_eq!(
            TimerConfig::for_rate(0, 48_000_000, Prescaler::Div64, 0),
            Err(Error::UnreachableRate { rate_hz: 0 })
        );
        // Faster than the prescaled clock
        assert_eq!(
            TimerConfig::for_rate(0, 48_000_000, Prescaler::Div1024, 100_000),
            Err(Error::UnreachableRate { rate_hz: 100_000 })
        );
        // Match value beyond 16 bits
        assert_eq!(
            TimerConfig::for_rate(0, 48_000_000, Prescaler::Div1, 100),
            Err(Error::UnreachableRate { rate_hz: 100 })
        );
    }

    #[test]
    fn test_pool_claims_first_free() {
        let mut pool = TimerSlots::new([FakeTimer::new(3), FakeTimer::new(4)]);
        assert_eq!(pool.available(), 2);

        let first = pool.claim().unwrap();
        assert_eq!(first.index(), 3);
        let second = pool.claim().unwrap();
        assert_eq!(second.index(), 4);
        assert!(pool.claim().is_none());
        assert_eq!(pool.available(), 0);

        pool.release(first);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.claim().unwrap().index(), 3);
    }

    #[test]
    fn test_empty_pool() {
        let mut pool = TimerSlots::<FakeTimer, 2>::empty();
        assert_eq!(pool.available(), 0);
        assert!(pool.claim().is_none());
    }

    #[test]
    fn test_arm_sets_up_timer() {
        let mut pool = TimerSlots::new([FakeTimer::new(2)]);
        let stale = pool.slots[0].as_ref().unwrap();
        stale.raise();

        let binding = TimerBinding::arm(&mut pool, &TimerConfig::SAMD51).unwrap();
        let timer = binding.timer();
        assert_eq!(binding.index(), 2);
        assert_eq!(timer.resets(), 1);
        assert_eq!(timer.config(), Some(TimerConfig::SAMD51));
        assert!(timer.is_running());
        assert!(timer.is_listening());
        // The stale flag was cleared before the interrupt was unmasked
        assert!(!timer.is_interrupt_pending());
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_arm_exhausted_pool() {
        let mut pool = TimerSlots::<FakeTimer, 1>::empty();
        let result = TimerBinding::arm(&mut pool, &TimerConfig::SAMD51);
        assert_eq!(result.err(), Some(Error::NoFreeTimer));
    }

    #[test]
    fn test_service_only_on_match() {
        let mut pool = TimerSlots::new([FakeTimer::new(0)]);
        let mut binding = TimerBinding::arm(&mut pool, &TimerConfig::SAMD21).unwrap();

        let mut calls = 0;
        assert_eq!(binding.service(|| calls += 1), None);
        assert_eq!(calls, 0);

        binding.timer().raise();
        assert_eq!(binding.service(|| { calls += 1; calls }), Some(1));
        assert!(!binding.timer().is_interrupt_pending());
    }

    #[test]
    fn test_disarm_returns_timer() {
        let mut pool = TimerSlots::new([FakeTimer::new(5)]);
        let binding = TimerBinding::arm(&mut pool, &TimerConfig::SAMD51).unwrap();
        binding.disarm(&mut pool);

        assert_eq!(pool.available(), 1);
        let timer = pool.claim().unwrap();
        assert_eq!(timer.index(), 5);
        assert!(!timer.is_running());
        assert!(!timer.is_listening());
        assert_eq!(timer.resets(), 2);
    }
}
