//! Implementations for different JTAG hardware adapters live here.  Hardware adapters should
//! implement the `Cable` trait.
use alloc::vec::Vec;

use crate::error::TransportError;

pub mod gpio;
#[cfg(feature = "std")]
pub mod jlink;
#[cfg(feature = "std")]
pub mod mpsse;

pub trait Cable {
    /// Clock out a series of TMS values to change the state of the JTAG chain.  Each element of
    /// `tms` determines the value of the TMS line, zero for low and any other value for high.
    /// `tdo` controls the state of the TDI line during mode changes.
    fn change_mode(&mut self, tms: &[usize], tdo: bool) -> Result<(), TransportError>;
    /// Shift in bits from the TDO line.  `bits` is the total number of bits to read.  Should be
    /// called with state = ShiftIR or ShiftDR, and will remain in that state.  Should clock out
    /// all ones.
    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>, TransportError>;
    /// Shift out bits on the TDI line.  `bits` is the number of bits to send from the last byte.
    /// Should be called with state = ShiftIR or ShiftDR.  State won't change unless `pause_after`
    /// is true, in which case it will be PauseIR or PauseDR on exit.
    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError>;

    /// Like `write_data`, but returns the bits shifted out of TDO while writing.
    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError>;

    /// Push any buffered commands out to the hardware.
    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Open a cable by name.  `clock` is the TCK frequency in hertz.
#[cfg(feature = "std")]
pub fn new_from_string(name: &str, clock: u32) -> Result<alloc::boxed::Box<dyn Cable>, TransportError> {
    use alloc::boxed::Box;
    use alloc::string::ToString;

    log::debug!("opening {} cable at {} Hz", name, clock);
    match name {
        "jtagkey" => Ok(Box::new(mpsse::JtagKey::new(clock, true)?)),
        "jtagkey-b" => Ok(Box::new(mpsse::JtagKey::new(clock, false)?)),
        "jlink" => Ok(Box::new(jlink::JLink::new(clock)?)),
        _ => Err(TransportError::UnknownCable(name.to_string())),
    }
}
