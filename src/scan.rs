//! The scan: one pass over the matrix, run from the timer interrupt.
//!
//! [`scan`] writes every packet of [`encode_tick`] to the bus, each one
//! framed by chip-select:
//!
//! 1. chip-select low
//! 2. write the four packet bytes
//! 3. flush the bus
//! 4. chip-select high, latching the bytes onto the register outputs
//!
//! Nothing is buffered between packets. The pixel buffer is read one column
//! at a time as the scan reaches it.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::dither::DitherTable;
use crate::error::ScanError;
use crate::packet::{encode_tick, Packet, PACKETS_PER_TICK, PACKET_LEN};
use crate::pixel::PixelSource;

/// Bytes written to the bus per tick.
pub const BYTES_PER_TICK: usize = PACKETS_PER_TICK * PACKET_LEN;

/// Chip-select pulses per tick.
pub const SELECTS_PER_TICK: usize = PACKETS_PER_TICK;

/// Writes one packet framed by chip-select.
///
/// Chip-select is released even when the bus write fails.
///
/// # Errors
///
/// Returns the first error reported by the bus or the pin.
pub fn send<SPI, CS>(
    bus: &mut SPI,
    select: &mut CS,
    packet: &Packet,
) -> Result<(), ScanError<SPI::Error, CS::Error>>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    select.set_low().map_err(ScanError::Select)?;
    let written = bus.write(packet.as_bytes()).and_then(|()| bus.flush());
    let released = select.set_high();
    written.map_err(ScanError::Bus)?;
    released.map_err(ScanError::Select)
}

/// Runs one complete scan of `pixels` for frame slot `frame`.
///
/// # Errors
///
/// Stops at the first bus or pin failure. Before returning the error it makes
/// one attempt to send [`Packet::BLANK`] so the matrix is not left with a
/// column lit.
pub fn scan<SPI, CS, P, const SLOTS: usize>(
    bus: &mut SPI,
    select: &mut CS,
    pixels: &P,
    table: &DitherTable<SLOTS>,
    frame: u8,
) -> Result<(), ScanError<SPI::Error, CS::Error>>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    P: PixelSource + ?Sized,
{
    pixels.begin_scan();
    for packet in encode_tick(pixels, table, frame) {
        if let Err(err) = send(bus, select, &packet) {
            if packet != Packet::BLANK {
                let _ = send(bus, select, &Packet::BLANK);
            }
            return Err(err);
        }
    }
    Ok(())
}
