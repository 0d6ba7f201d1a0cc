//! Target memory access, in whole 32-bit words at word-aligned byte addresses.
//!
//! The address is sent once per batch; the debug unit advances it by one word after every data
//! transfer.  Accesses go straight to memory: callers must flush the data cache before reading
//! memory the core may have cached, and invalidate caches after writing code or data the core
//! will fetch.  Sub-word accesses need a read-modify-write at a higher level.
use alloc::vec::Vec;

use crate::error::Error;
use crate::link::{instruction, DebugLink, TransactionMode};
use crate::scan::ScanTransport;
use crate::statemachine::JtagState;

impl<T: ScanTransport> DebugLink<T> {
    /// Write `words` to consecutive words of memory starting at `address`, as one batch.
    pub fn write_memory(&mut self, address: u32, words: &[u32]) -> Result<(), Error> {
        if words.is_empty() {
            return Ok(());
        }
        log::debug!("writing memory: addr={:#010x} count={} words[0]={:#010x}", address, words.len(), words[0]);

        self.reset_transaction();
        self.set_transaction(TransactionMode::WriteMemory, JtagState::PauseDR);

        self.select_instruction(instruction::ADDRESS);
        self.write_data(address, JtagState::PauseDR);

        self.select_instruction(instruction::DATA);
        for &word in words {
            self.write_data(word, JtagState::Idle);
        }

        self.reset_transaction();

        if let Err(err) = self.execute() {
            log::error!("writing to memory failed: {}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Fill `words` from consecutive words of memory starting at `address`, as one batch.
    /// `words` is only written if the whole batch succeeds.
    pub fn read_memory(&mut self, address: u32, words: &mut [u32]) -> Result<(), Error> {
        if words.is_empty() {
            return Ok(());
        }
        log::debug!("reading memory: addr={:#010x} count={}", address, words.len());

        self.reset_transaction();
        self.set_transaction(TransactionMode::ReadMemory, JtagState::PauseDR);

        self.select_instruction(instruction::ADDRESS);
        // Settles in Idle where the write path uses PauseDR; kept until checked on hardware
        self.write_data(address, JtagState::Idle);

        self.select_instruction(instruction::DATA);
        let captures: Vec<_> = words.iter().map(|_| self.read_data(JtagState::Idle)).collect();

        self.reset_transaction();

        let result = match self.execute() {
            Ok(result) => result,
            Err(err) => {
                log::error!("reading from memory failed: {}", err);
                return Err(err);
            }
        };

        for (word, capture) in words.iter_mut().zip(captures) {
            *word = result.word(capture);
        }
        Ok(())
    }
}
