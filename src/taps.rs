//! A convenience wrapper for JTAG scan chains with multiple TAPs present.  `Taps` allows the
//! client to interact with one selected TAP as if it were the only TAP in the chain, so that the
//! client doesn't have to deal with putting the other TAPs into bypass and shifting data through
//! the bypass registers.
//!
//! TAP 0 is the one nearest TDI.  `Taps` also implements `ScanTransport`, so a `DebugLink` can
//! run its scan queues straight against the selected TAP.
use alloc::vec;
use alloc::vec::Vec;

use crate::bits;
use crate::cable::Cable;
use crate::error::TransportError;
use crate::scan::{ScanRequest, ScanTransport};
use crate::statemachine::{JtagSM, JtagState, Register};

// Longest IR chain `detect` will walk before giving up
const MAX_CHAIN_BITS: usize = 1024;

// A piece of a scan: either real data, or `bits` ones for TAPs in BYPASS
enum Field<'a> {
    Data(&'a [u8], usize),
    Ones(usize),
}

// Concatenate fields into one LSB-first buffer; the first field is shifted first
fn pack(fields: &[Field]) -> (Vec<u8>, usize) {
    let total: usize = fields.iter()
        .map(|f| match f {
            Field::Data(_, bits) | Field::Ones(bits) => *bits,
        })
        .sum();
    let mut out = vec![0; bits::bytes_for(total)];
    let mut pos = 0;
    for f in fields {
        match f {
            Field::Data(data, len) => {
                for i in 0..*len {
                    let bit = bits::get_u32(data, i, 1);
                    bits::set_u32(&mut out, pos + i, 1, bit);
                }
                pos += len;
            }
            Field::Ones(len) => {
                for i in 0..*len {
                    bits::set_u32(&mut out, pos + i, 1, 1);
                }
                pos += len;
            }
        }
    }
    (out, total)
}

struct Tap {
    irlen: usize,
}

pub struct Taps<T> {
    pub sm: JtagSM<T>,
    taps: Vec<Tap>,
    active: usize,
}

impl<T, U> Taps<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    /// Create an object using an existing `JtagSM` object
    pub fn new(sm: JtagSM<T>) -> Self {
        Self {
            sm,
            taps: Vec::new(),
            active: 0,
        }
    }

    /// Add a TAP to the scan chain with the given instruction register length
    pub fn add_tap(&mut self, irlen: usize) {
        let tap = Tap {
            irlen
        };
        self.taps.push(tap);
    }

    /// Number of TAPs known on the chain
    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Attempt to autodetect the number of TAPs on the scan chain and the instruction register
    /// length for each.  Returns the IDCODE of each TAP (0 for TAPs without one), in chain order.
    pub fn detect(&mut self) -> Result<Vec<u32>, TransportError> {
        self.taps = Vec::new();
        self.sm.mode_reset()?;

        // Each IR captures ...01 in Capture-IR; walk the chain one bit at a time until two ones
        // in a row show the TDI ones coming through.
        let mut count: i32 = -1;
        let mut irlen = vec![];
        for _ in 0..MAX_CHAIN_BITS {
            let bit = self.sm.read_reg(Register::Instruction, 1)?;
            if bit[0] & 1 != 0 {
                if count > 0 {
                    irlen.push((count + 1) as usize);
                }
                if count == 0 {
                    break;
                }
                count = 0;
            } else {
                count += 1;
            }
        }
        if irlen.is_empty() {
            log::error!("no TAPs found on the scan chain");
            return Err(TransportError::NoTap);
        }

        self.sm.mode_reset()?;
        let mut ids = vec![];
        for _ in 0..irlen.len() {
            let bit = self.sm.read_reg(Register::Data, 1)?;
            if bit[0] & 1 == 0 {
                // BYPASS register after reset
                ids.push(0);
            } else {
                let bits = self.sm.read_reg(Register::Data, 31)?;
                // Add back the one we read
                ids.push((bits::get_u32(&bits, 0, 31) << 1) | 1);
            }
        }
        self.sm.mode_reset()?;

        irlen.reverse();
        ids.reverse();

        for (i, (len, id)) in irlen.iter().zip(&ids).enumerate() {
            log::info!("found TAP {} irlen {} idcode {:#010x}", i, len, id);
            self.add_tap(*len);
        }
        Ok(ids)
    }

    /// Select which TAP in the scan chain to operate upon.  The chain is reset, which leaves
    /// every TAP with its default instruction.
    pub fn select_tap(&mut self, tap: usize) -> Result<(), TransportError> {
        if tap >= self.taps.len() {
            return Err(TransportError::NoTap);
        }
        self.sm.mode_reset()?;
        self.active = tap;
        Ok(())
    }

    fn active_tap(&self) -> Result<&Tap, TransportError> {
        self.taps.get(self.active).ok_or(TransportError::NoTap)
    }

    /// Shift `ir` into the instruction register of the TAP selected by `select_tap`, with every
    /// other TAP put into BYPASS.  Ends in PauseIR.
    pub fn write_ir(&mut self, ir: &[u8]) -> Result<(), TransportError> {
        let this_irlen = self.active_tap()?.irlen;
        if ir.len() != bits::bytes_for(this_irlen) {
            return Err(TransportError::IrLength { expected: this_irlen, actual: ir.len() * 8 });
        }

        let after: usize = self.taps[self.active+1..].iter().map(|t| t.irlen).sum();
        let before: usize = self.taps[..self.active].iter().map(|t| t.irlen).sum();
        let (buf, total) = pack(&[Field::Ones(after), Field::Data(ir, this_irlen), Field::Ones(before)]);
        self.sm.write_reg(Register::Instruction, &buf, bits::last_byte_bits(total), true)
    }

    /// Shift the first `bits` bits of `dr` into the data register of the TAP selected by
    /// `select_tap`.  Ends in PauseDR.
    pub fn write_dr(&mut self, dr: &[u8], bits: usize) -> Result<(), TransportError> {
        self.active_tap()?;
        // TAPs nearer TDI each hold one BYPASS bit after the data
        let (buf, total) = pack(&[Field::Data(dr, bits), Field::Ones(self.active)]);
        self.sm.write_reg(Register::Data, &buf, bits::last_byte_bits(total), true)
    }

    /// Read the data register of the TAP selected by `select_tap`.  `bits` indicates the length
    /// of the data register for the current instruction.  Ones are shifted in; ends in PauseDR.
    pub fn read_dr(&mut self, bits: usize) -> Result<Vec<u8>, TransportError> {
        self.active_tap()?;
        // BYPASS bits of the TAPs nearer TDO come out first
        let pad_bits = self.taps.len() - self.active - 1;
        let total = pad_bits + bits;
        let ones = vec![0xff; bits::bytes_for(total)];
        let raw = self.sm.read_write_reg(Register::Data, &ones, bits::last_byte_bits(total), true)?;
        Ok(bits::extract(&raw, pad_bits, bits))
    }
}

impl<T, U> ScanTransport for Taps<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    fn ir_length(&self) -> usize {
        self.taps.get(self.active).map(|t| t.irlen).unwrap_or(0)
    }

    fn execute(&mut self, scans: &[ScanRequest], capture: &mut [u8]) -> Result<(), TransportError> {
        for scan in scans {
            match *scan {
                ScanRequest::Instruction { bits, value, end } => {
                    let expected = self.active_tap()?.irlen;
                    if bits != expected {
                        return Err(TransportError::IrLength { expected, actual: bits });
                    }
                    let mut ir = vec![0; bits::bytes_for(bits)];
                    bits::set_u32(&mut ir, 0, bits, value);
                    self.write_ir(&ir)?;
                    self.settle(end)?;
                }
                ScanRequest::DataOut { bits, value, end } => {
                    let mut dr = vec![0; bits::bytes_for(bits)];
                    bits::set_u32(&mut dr, 0, bits, value);
                    self.write_dr(&dr, bits)?;
                    self.settle(end)?;
                }
                ScanRequest::DataCapture { bits, offset, end } => {
                    let data = self.read_dr(bits)?;
                    capture[offset..offset + data.len()].copy_from_slice(&data);
                    self.settle(end)?;
                }
            }
        }
        self.sm.flush()
    }
}

impl<T, U> Taps<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    fn settle(&mut self, end: JtagState) -> Result<(), TransportError> {
        self.sm.change_mode(end)
    }
}
