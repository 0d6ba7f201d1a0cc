//! Core and auxiliary register access.
//!
//! Addresses may come in any order, but runs of consecutive addresses are sent with a single
//! address register write: the debug unit advances its address after every data transfer.
//! Only the immediately preceding address is compared, so callers wanting the shorter scan
//! sequence should sort their addresses first.
use alloc::vec::Vec;

use crate::error::Error;
use crate::link::{instruction, DebugLink, TransactionMode};
use crate::scan::ScanTransport;
use crate::statemachine::JtagState;

/// Auxiliary register number of the DEBUG register
pub const AUX_DEBUG: u32 = 0x5;

/// DEBUG.ED, the "enable debug" bit.  Always set on writes to DEBUG: the debug unit needs it
/// set for actionpoints to work, whatever the caller asked for.
pub const AUX_DEBUG_ED: u32 = 1 << 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterKind {
    Core,
    Aux,
}

impl RegisterKind {
    fn write_transaction(self) -> TransactionMode {
        match self {
            RegisterKind::Core => TransactionMode::WriteCoreReg,
            RegisterKind::Aux => TransactionMode::WriteAuxReg,
        }
    }

    fn read_transaction(self) -> TransactionMode {
        match self {
            RegisterKind::Core => TransactionMode::ReadCoreReg,
            RegisterKind::Aux => TransactionMode::ReadAuxReg,
        }
    }

    fn name(self) -> &'static str {
        match self {
            RegisterKind::Core => "core",
            RegisterKind::Aux => "aux",
        }
    }
}

// Does `addresses[i]` need its own address register write?
fn starts_run(addresses: &[u32], i: usize) -> bool {
    i == 0 || addresses[i] != addresses[i - 1].wrapping_add(1)
}

impl<T: ScanTransport> DebugLink<T> {
    /// Write `values[i]` to register `addresses[i]` of the given kind, as one batch.
    ///
    /// Writes to the aux DEBUG register always have `AUX_DEBUG_ED` set.
    pub fn write_registers(&mut self, kind: RegisterKind, addresses: &[u32], values: &[u32]) -> Result<(), Error> {
        if addresses.len() != values.len() {
            return Err(Error::InvalidArgument("register addresses and values differ in length"));
        }
        if addresses.is_empty() {
            return Ok(());
        }
        log::debug!("writing {} {} registers: addr[0]={:#x} value[0]={:#010x}",
            addresses.len(), kind.name(), addresses[0], values[0]);

        self.reset_transaction();
        self.set_transaction(kind.write_transaction(), JtagState::PauseDR);

        for (i, (&addr, &value)) in addresses.iter().zip(values).enumerate() {
            if starts_run(addresses, i) {
                self.select_instruction(instruction::ADDRESS);
                self.write_data(addr, JtagState::PauseDR);
                self.select_instruction(instruction::DATA);
            }

            let value = if kind == RegisterKind::Aux && addr == AUX_DEBUG {
                log::debug!("forcing ED bit in DEBUG aux register");
                value | AUX_DEBUG_ED
            } else {
                value
            };
            self.write_data(value, JtagState::Idle);
        }

        self.reset_transaction();

        if let Err(err) = self.execute() {
            log::error!("writing to {} registers failed: {}", kind.name(), err);
            return Err(err);
        }
        Ok(())
    }

    /// Read register `addresses[i]` of the given kind into `values[i]`, as one batch.  `values`
    /// is only written if the whole batch succeeds.
    pub fn read_registers(&mut self, kind: RegisterKind, addresses: &[u32], values: &mut [u32]) -> Result<(), Error> {
        if addresses.len() != values.len() {
            return Err(Error::InvalidArgument("register addresses and values differ in length"));
        }
        if addresses.is_empty() {
            return Ok(());
        }
        log::debug!("reading {} {} registers: addr[0]={:#x}", addresses.len(), kind.name(), addresses[0]);

        self.reset_transaction();
        self.set_transaction(kind.read_transaction(), JtagState::PauseDR);

        let mut captures = Vec::with_capacity(addresses.len());
        for (i, &addr) in addresses.iter().enumerate() {
            if starts_run(addresses, i) {
                self.select_instruction(instruction::ADDRESS);
                // Reads settle in Idle after the address, unlike writes.  Unverified against
                // hardware whether PauseDR would be more correct.
                self.write_data(addr, JtagState::Idle);
                self.select_instruction(instruction::DATA);
            }
            captures.push(self.read_data(JtagState::Idle));
        }

        self.reset_transaction();

        let result = match self.execute() {
            Ok(result) => result,
            Err(err) => {
                log::error!("reading from {} registers failed: {}", kind.name(), err);
                return Err(err);
            }
        };

        for (value, capture) in values.iter_mut().zip(captures) {
            *value = result.word(capture);
        }
        log::trace!("read from register: value[0]={:#010x}", values[0]);
        Ok(())
    }

    pub fn write_core_registers(&mut self, addresses: &[u32], values: &[u32]) -> Result<(), Error> {
        self.write_registers(RegisterKind::Core, addresses, values)
    }

    pub fn read_core_registers(&mut self, addresses: &[u32], values: &mut [u32]) -> Result<(), Error> {
        self.read_registers(RegisterKind::Core, addresses, values)
    }

    pub fn write_aux_registers(&mut self, addresses: &[u32], values: &[u32]) -> Result<(), Error> {
        self.write_registers(RegisterKind::Aux, addresses, values)
    }

    pub fn read_aux_registers(&mut self, addresses: &[u32], values: &mut [u32]) -> Result<(), Error> {
        self.read_registers(RegisterKind::Aux, addresses, values)
    }

    pub fn write_core_reg_one(&mut self, address: u32, value: u32) -> Result<(), Error> {
        self.write_core_registers(&[address], &[value])
    }

    pub fn read_core_reg_one(&mut self, address: u32) -> Result<u32, Error> {
        let mut value = [0];
        self.read_core_registers(&[address], &mut value)?;
        Ok(value[0])
    }

    pub fn write_aux_reg_one(&mut self, address: u32, value: u32) -> Result<(), Error> {
        self.write_aux_registers(&[address], &[value])
    }

    pub fn read_aux_reg_one(&mut self, address: u32) -> Result<u32, Error> {
        let mut value = [0];
        self.read_aux_registers(&[address], &mut value)?;
        Ok(value[0])
    }
}
