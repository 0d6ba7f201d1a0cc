//! This provides a higher-level interface than the `Cable` trait.  Specifically, it keeps track of
//! the state of the JTAG state machine, and allows setting the state to any desired state.
//! `JtagSM` will get to that state by the most efficient path, based on the current state.
//!
//! `JtagState` is also how callers name the state a scan should settle in once it is done
//! (`Idle`, `PauseIR` or `PauseDR`).
use alloc::vec::Vec;
use alloc::vec;

use crate::cable::Cable;
use crate::error::TransportError;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Register {
    Data,
    Instruction
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum JtagState {
    Reset = 0,
    Idle = 1,
    SelectDR = 2,
    CaptureDR = 3,
    ShiftDR = 4,
    Exit1DR = 5,
    PauseDR = 6,
    Exit2DR = 7,
    UpdateDR = 8,
    SelectIR = 9,
    CaptureIR = 10,
    ShiftIR = 11,
    Exit1IR = 12,
    PauseIR = 13,
    Exit2IR = 14,
    UpdateIR = 15,
}

// Next state for TMS low and TMS high, indexed by `JtagState`
const EDGES: [[usize; 2]; 16] = [
    [JtagState::Idle as usize, JtagState::Reset as usize],
    [JtagState::Idle as usize, JtagState::SelectDR as usize],
    [JtagState::CaptureDR as usize, JtagState::SelectIR as usize],
    [JtagState::ShiftDR as usize, JtagState::Exit1DR as usize],
    [JtagState::ShiftDR as usize, JtagState::Exit1DR as usize],
    [JtagState::PauseDR as usize, JtagState::UpdateDR as usize],
    [JtagState::PauseDR as usize, JtagState::Exit2DR as usize],
    [JtagState::ShiftDR as usize, JtagState::UpdateDR as usize],
    [JtagState::Idle as usize, JtagState::SelectDR as usize],
    [JtagState::CaptureIR as usize, JtagState::Reset as usize],
    [JtagState::ShiftIR as usize, JtagState::Exit1IR as usize],
    [JtagState::ShiftIR as usize, JtagState::Exit1IR as usize],
    [JtagState::PauseIR as usize, JtagState::UpdateIR as usize],
    [JtagState::PauseIR as usize, JtagState::Exit2IR as usize],
    [JtagState::ShiftIR as usize, JtagState::UpdateIR as usize],
    [JtagState::Idle as usize, JtagState::SelectDR as usize],
];

const RESET_TMS: [usize; 6] = [1, 1, 1, 1, 1, 0];

#[derive(Clone)]
struct Path {
    path: Vec<usize>,
    state: usize,
}

/// Shortest TMS sequence leading from `from` to `to`.  Empty when they are the same state.
pub fn tms_path(from: JtagState, to: JtagState) -> Vec<usize> {
    if from == to {
        return vec![];
    }

    let mut paths = vec![Path { path: vec![], state: from as usize }];
    loop {
        let mut newpaths = Vec::new();

        for p in paths {
            for (tms, next) in EDGES[p.state].iter().enumerate() {
                let mut np = p.clone();
                np.state = *next;
                np.path.push(tms);

                if np.state == to as usize {
                    return np.path;
                }
                newpaths.push(np);
            }
        }

        paths = newpaths;
    }
}

pub struct JtagSM<T> {
    pub cable: T,
    state: JtagState,
}

impl<T, U> JtagSM<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    /// Create a JTAG state machine using an existing `Cable`.  The chain is reset and left in
    /// Run-Test/Idle.
    pub fn new(mut cable: T) -> Result<Self, TransportError> {
        cable.change_mode(&RESET_TMS, true)?;

        Ok(Self {
            cable,
            state: JtagState::Idle,
        })
    }

    /// The state the TAP controllers are in, as far as this object knows
    pub fn state(&self) -> JtagState {
        self.state
    }

    /// Reset the scan chain by driving TMS high for 5 clocks, then move to Run-Test/Idle
    pub fn mode_reset(&mut self) -> Result<(), TransportError>
    {
        self.cable.change_mode(&RESET_TMS, true)?;
        self.state = JtagState::Idle;
        Ok(())
    }

    /// Use TMS to get into `state` by the most efficient path
    pub fn change_mode(&mut self, state: JtagState) -> Result<(), TransportError> {
        if self.state == state {
            return Ok(());
        }

        let path = tms_path(self.state, state);
        log::trace!("TAP {:?} -> {:?} via {:?}", self.state, state, path);
        self.cable.change_mode(&path, true)?;
        self.state = state;
        Ok(())
    }

    fn enter_shift(&mut self, reg: Register) -> Result<(), TransportError> {
        if reg == Register::Data {
            self.change_mode(JtagState::ShiftDR)
        } else {
            self.change_mode(JtagState::ShiftIR)
        }
    }

    fn settle(&mut self, reg: Register, pause_after: bool) {
        if pause_after {
            if reg == Register::Data {
                self.state = JtagState::PauseDR;
            } else {
                self.state = JtagState::PauseIR;
            }
        }
    }

    /// Read `bits` from either the instruction or data register
    pub fn read_reg(&mut self, reg: Register, bits: usize) -> Result<Vec<u8>, TransportError> {
        self.enter_shift(reg)?;
        self.cable.read_data(bits)
    }

    /// Write `data` into either the instruction or data register.  `bits` indicates how many bits
    /// of the last byte should be written (8 indicates that the entire byte should be written).
    /// The mode will either be ShiftIR / ShiftDR if `pause_after` is false, or PauseIR / PauseDR
    /// if `pause_after` is true.  This allows for setting the register with multiple calls to
    /// `write_reg`, which may be more convenient than manual bit-shifting.
    pub fn write_reg(&mut self, reg: Register, data: &[u8], bits: u8, pause_after: bool) -> Result<(), TransportError> {
        self.enter_shift(reg)?;
        self.cable.write_data(data, bits, pause_after)?;
        self.settle(reg, pause_after);
        Ok(())
    }

    /// Similar to `write_reg` except it returns the bits that were shifted out during writing.
    pub fn read_write_reg(&mut self, reg: Register, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>, TransportError> {
        self.enter_shift(reg)?;
        let data = self.cable.read_write_data(data, bits, pause_after)?;
        self.settle(reg, pause_after);
        Ok(data)
    }

    /// Push anything the cable has buffered out to the hardware
    pub fn flush(&mut self) -> Result<(), TransportError> {
        self.cable.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_to_shift_dr() {
        assert_eq!(tms_path(JtagState::Idle, JtagState::ShiftDR), vec![1, 0, 0]);
    }

    #[test]
    fn idle_to_shift_ir() {
        assert_eq!(tms_path(JtagState::Idle, JtagState::ShiftIR), vec![1, 1, 0, 0]);
    }

    #[test]
    fn pause_ir_to_shift_dr() {
        // PauseIR -> Exit2IR -> UpdateIR -> SelectDR -> CaptureDR -> ShiftDR
        assert_eq!(tms_path(JtagState::PauseIR, JtagState::ShiftDR), vec![1, 1, 1, 0, 0]);
    }

    #[test]
    fn pause_dr_to_idle() {
        assert_eq!(tms_path(JtagState::PauseDR, JtagState::Idle), vec![1, 1, 0]);
    }

    #[test]
    fn same_state_needs_no_clocks() {
        assert!(tms_path(JtagState::PauseDR, JtagState::PauseDR).is_empty());
    }
}
