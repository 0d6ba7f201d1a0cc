//! A model of an ARC JTAG debug unit, driven by the scans a `DebugLink` queues.
#![allow(dead_code)]

use std::collections::HashMap;

use arc_jtag::link::{instruction, TransactionMode};
use arc_jtag::{ScanRequest, ScanTransport, TransportError};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
pub struct SimTarget {
    pub ir: u32,
    pub command: u32,
    pub address: u32,
    pub core: HashMap<u32, u32>,
    pub aux: HashMap<u32, u32>,
    pub memory: HashMap<u32, u32>,
    pub status: u32,
    pub idcode: u32,
    /// Every batch handed to `execute`
    pub batches: Vec<Vec<ScanRequest>>,
    /// Fail the next batch, after shifting nothing
    pub fail_next: bool,
}

impl SimTarget {
    pub fn new() -> Self {
        Self {
            idcode: 0x2000_04b1,
            status: 0x4,
            command: TransactionMode::NoOp.code(),
            ..Default::default()
        }
    }

    /// All scans of the last batch
    pub fn last_batch(&self) -> &[ScanRequest] {
        self.batches.last().map(|b| b.as_slice()).unwrap_or(&[])
    }

    /// Total scans across every batch
    pub fn scan_count(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }

    /// Values shifted into the address register during the last batch
    pub fn addresses_written(&self) -> Vec<u32> {
        let mut ir = None;
        let mut out = vec![];
        for scan in self.last_batch() {
            match *scan {
                ScanRequest::Instruction { value, .. } => ir = Some(value),
                ScanRequest::DataOut { value, .. } if ir == Some(instruction::ADDRESS) => out.push(value),
                _ => {}
            }
        }
        out
    }

    /// Values shifted into the data register during the last batch
    pub fn data_written(&self) -> Vec<u32> {
        let mut ir = None;
        let mut out = vec![];
        for scan in self.last_batch() {
            match *scan {
                ScanRequest::Instruction { value, .. } => ir = Some(value),
                ScanRequest::DataOut { value, .. } if ir == Some(instruction::DATA) => out.push(value),
                _ => {}
            }
        }
        out
    }

    fn data_write(&mut self, value: u32) {
        let code = self.command;
        if code == TransactionMode::WriteMemory.code() {
            self.memory.insert(self.address, value);
            self.address = self.address.wrapping_add(4);
        } else if code == TransactionMode::WriteCoreReg.code() {
            self.core.insert(self.address, value);
            self.address = self.address.wrapping_add(1);
        } else if code == TransactionMode::WriteAuxReg.code() {
            self.aux.insert(self.address, value);
            self.address = self.address.wrapping_add(1);
        }
    }

    fn data_read(&mut self) -> u32 {
        let code = self.command;
        let (value, step) = if code == TransactionMode::ReadMemory.code() {
            (self.memory.get(&self.address).copied().unwrap_or(0), 4)
        } else if code == TransactionMode::ReadCoreReg.code() {
            (self.core.get(&self.address).copied().unwrap_or(0), 1)
        } else if code == TransactionMode::ReadAuxReg.code() {
            (self.aux.get(&self.address).copied().unwrap_or(0), 1)
        } else {
            (0, 0)
        };
        self.address = self.address.wrapping_add(step);
        value
    }
}

impl ScanTransport for SimTarget {
    fn ir_length(&self) -> usize {
        4
    }

    fn execute(&mut self, scans: &[ScanRequest], capture: &mut [u8]) -> Result<(), TransportError> {
        self.batches.push(scans.to_vec());
        if self.fail_next {
            self.fail_next = false;
            return Err(TransportError::Cable {
                operation: "run scan queue",
                message: "adapter timed out".into(),
            });
        }

        for scan in scans {
            match *scan {
                ScanRequest::Instruction { value, .. } => self.ir = value,
                ScanRequest::DataOut { value, .. } => match self.ir {
                    instruction::TRANSACTION_CMD => self.command = value,
                    instruction::ADDRESS => self.address = value,
                    instruction::DATA => self.data_write(value),
                    _ => {}
                },
                ScanRequest::DataCapture { offset, .. } => {
                    let value = match self.ir {
                        instruction::DATA => self.data_read(),
                        instruction::STATUS => self.status,
                        instruction::IDCODE => self.idcode,
                        instruction::ADDRESS => self.address,
                        _ => 0,
                    };
                    capture[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
        Ok(())
    }
}
