//! Debug link to an ARC JTAG debug unit.
//!
//! The debug unit is driven through three data registers reached by instruction-register
//! selections: an address register, a data register, and a transaction command register that
//! says what the next data register access means (read or write of a core register, an
//! auxiliary register, or memory).  `DebugLink` remembers the last instruction and transaction
//! it selected so repeated selections cost no scans, and queues every scan of an operation into
//! one `ScanQueue` that is executed as a single batch.
//!
//! Every operation starts and ends with a transaction reset, so an operation never inherits a
//! transaction left behind by another one.
use crate::error::Error;
use crate::scan::{Capture, Captures, ScanQueue, ScanTransport};
use crate::statemachine::JtagState;

/// Instruction register codes of the debug unit
pub mod instruction {
    pub const STATUS: u32 = 0x8;
    pub const TRANSACTION_CMD: u32 = 0x9;
    pub const ADDRESS: u32 = 0xA;
    pub const DATA: u32 = 0xB;
    pub const IDCODE: u32 = 0xC;
}

/// Width of the transaction command register
pub const TRANSACTION_CMD_BITS: usize = 4;

/// Width of the address, data, status and IDCODE registers
pub const WORD_BITS: usize = 32;

/// Meaning of the next data register access
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum TransactionMode {
    WriteMemory = 0x0,
    WriteCoreReg = 0x1,
    WriteAuxReg = 0x2,
    NoOp = 0x3,
    ReadMemory = 0x4,
    ReadCoreReg = 0x5,
    ReadAuxReg = 0x6,
}

impl TransactionMode {
    /// Value shifted into the transaction command register
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Contents of the debug unit's STATUS register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JtagStatus(pub u32);

impl JtagStatus {
    const STALLED: u32 = 1 << 0;
    const FAILURE: u32 = 1 << 1;
    const READY: u32 = 1 << 2;

    /// The last transaction stalled
    pub fn is_stalled(self) -> bool {
        self.0 & Self::STALLED != 0
    }

    /// The last transaction failed
    pub fn has_failed(self) -> bool {
        self.0 & Self::FAILURE != 0
    }

    /// The debug unit is ready for another transaction
    pub fn is_ready(self) -> bool {
        self.0 & Self::READY != 0
    }
}

/// Session with one ARC debug unit, reached through any `ScanTransport`.
///
/// Scans are queued and run as one batch per operation.  The link remembers which instruction
/// and transaction the debug unit holds and skips selecting them again.
pub struct DebugLink<T> {
    transport: T,
    queue: ScanQueue,
    // None until the first selection, and after a failed batch
    current_instruction: Option<u32>,
    // None after a failed batch, when the debug unit's transaction is unknown
    current_transaction: Option<TransactionMode>,
    end_state: JtagState,
}

impl<T: ScanTransport> DebugLink<T> {
    /// Wrap a transport already addressing the debug unit's TAP.  No scans are issued; the
    /// transaction is assumed to be `NoOp`, and the first instruction selection always goes out.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            queue: ScanQueue::new(),
            current_instruction: None,
            current_transaction: Some(TransactionMode::NoOp),
            end_state: JtagState::Idle,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Direct access to the transport.  Anything done through it (selecting another TAP,
    /// resetting the chain) may change what the debug unit holds, so the latched instruction
    /// and transaction are forgotten and the next operation selects both again.
    pub fn transport_mut(&mut self) -> &mut T {
        self.current_instruction = None;
        self.current_transaction = None;
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Scans queued and not yet executed
    pub fn queue(&self) -> &ScanQueue {
        &self.queue
    }

    /// Instruction most recently selected, if known
    pub fn current_instruction(&self) -> Option<u32> {
        self.current_instruction
    }

    /// Transaction most recently written to the command register, if known
    pub fn current_transaction(&self) -> Option<TransactionMode> {
        self.current_transaction
    }

    /// State the TAP settles in after the last queued scan
    pub fn end_state(&self) -> JtagState {
        self.end_state
    }

    /// Select instruction `instr`, unless it is already selected.  Settles in PauseIR.
    pub fn select_instruction(&mut self, instr: u32) {
        self.end_state = JtagState::PauseIR;
        if self.current_instruction == Some(instr) {
            return;
        }
        log::trace!("IR <- {:#x}", instr);
        let ir_length = self.transport.ir_length();
        self.queue.instruction(ir_length, instr, JtagState::PauseIR);
        self.current_instruction = Some(instr);
    }

    /// Write a 32-bit word to the data register selected by the current instruction
    pub fn write_data(&mut self, value: u32, end: JtagState) {
        self.write_field(WORD_BITS, value, end);
    }

    fn write_field(&mut self, bits: usize, value: u32, end: JtagState) {
        log::trace!("DR <- {:#x} ({} bits)", value, bits);
        self.end_state = end;
        self.queue.data_out(bits, value, end);
    }

    /// Capture a 32-bit word from the data register selected by the current instruction.  The
    /// value is available from the `Captures` returned by `execute`.
    pub fn read_data(&mut self, end: JtagState) -> Capture {
        log::trace!("DR -> capture");
        self.end_state = end;
        self.queue.data_capture(WORD_BITS, end)
    }

    /// Write `mode` into the transaction command register, unless it is already there.
    pub fn set_transaction(&mut self, mode: TransactionMode, end: JtagState) {
        if self.current_transaction == Some(mode) {
            return;
        }
        self.select_instruction(instruction::TRANSACTION_CMD);
        self.write_field(TRANSACTION_CMD_BITS, mode.code(), end);
        self.current_transaction = Some(mode);
    }

    /// Return the debug unit to the `NoOp` transaction
    pub fn reset_transaction(&mut self) {
        self.set_transaction(TransactionMode::NoOp, JtagState::Idle);
    }

    /// Run every queued scan as one batch.  On failure nothing is known about the state the
    /// debug unit was left in, so the latched instruction and transaction are dropped and the
    /// next operation's reset selects both again.
    pub fn execute(&mut self) -> Result<Captures, Error> {
        log::trace!("executing {} scans", self.queue.len());
        match self.queue.execute(&mut self.transport) {
            Ok(captures) => Ok(captures),
            Err(err) => {
                self.current_instruction = None;
                self.current_transaction = None;
                Err(err.into())
            }
        }
    }

    /// Bring the session up: put the debug unit in a known transaction.
    pub fn startup(&mut self) -> Result<(), Error> {
        self.reset_transaction();
        self.execute().map_err(|err| {
            log::error!("starting JTAG failed: {}", err);
            err
        })?;
        Ok(())
    }

    /// Tear the session down.  Nothing needs undoing on the debug unit, so this only logs.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        log::warn!("debug link shutdown has nothing to do");
        Ok(())
    }

    // Read one of the fixed registers that have their own instruction
    fn read_fixed(&mut self, instr: u32, what: &str) -> Result<u32, Error> {
        self.reset_transaction();
        self.select_instruction(instr);
        let capture = self.read_data(JtagState::Idle);
        self.reset_transaction();

        let captures = self.execute().map_err(|err| {
            log::error!("reading {} register failed: {}", what, err);
            err
        })?;
        Ok(captures.word(capture))
    }

    /// Read the STATUS register
    pub fn read_status(&mut self) -> Result<JtagStatus, Error> {
        let status = self.read_fixed(instruction::STATUS, "STATUS")?;
        log::trace!("STATUS register={:#010x}", status);
        Ok(JtagStatus(status))
    }

    /// Read the IDCODE register
    pub fn read_idcode(&mut self) -> Result<u32, Error> {
        log::debug!("reading IDCODE register");
        let idcode = self.read_fixed(instruction::IDCODE, "IDCODE")?;
        log::debug!("IDCODE register={:#010x}", idcode);
        Ok(idcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::scan::ScanRequest;
    use alloc::vec;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct Recorder {
        batches: Vec<Vec<ScanRequest>>,
        fail: bool,
        // Value every capture reads back
        word: u32,
    }

    impl ScanTransport for Recorder {
        fn ir_length(&self) -> usize {
            4
        }

        fn execute(&mut self, scans: &[ScanRequest], capture: &mut [u8]) -> Result<(), TransportError> {
            self.batches.push(scans.to_vec());
            if self.fail {
                return Err(TransportError::QueueFull);
            }
            for scan in scans {
                if let ScanRequest::DataCapture { offset, .. } = *scan {
                    capture[offset..offset + 4].copy_from_slice(&self.word.to_le_bytes());
                }
            }
            Ok(())
        }
    }

    fn ir(value: u32) -> ScanRequest {
        ScanRequest::Instruction { bits: 4, value, end: JtagState::PauseIR }
    }

    fn cmd(mode: TransactionMode, end: JtagState) -> ScanRequest {
        ScanRequest::DataOut { bits: 4, value: mode.code(), end }
    }

    #[test]
    fn first_selection_always_emits() {
        let mut link = DebugLink::new(Recorder::default());
        assert_eq!(link.current_instruction(), None);
        link.select_instruction(instruction::ADDRESS);
        link.select_instruction(instruction::ADDRESS);
        assert_eq!(link.queue().scans(), &[ir(instruction::ADDRESS)]);
        assert_eq!(link.end_state(), JtagState::PauseIR);
    }

    #[test]
    fn repeated_transaction_is_elided() {
        let mut link = DebugLink::new(Recorder::default());
        link.set_transaction(TransactionMode::WriteCoreReg, JtagState::PauseDR);
        let queued = link.queue().len();
        link.set_transaction(TransactionMode::WriteCoreReg, JtagState::PauseDR);
        assert_eq!(link.queue().len(), queued);
        assert_eq!(link.queue().scans(), &[
            ir(instruction::TRANSACTION_CMD),
            cmd(TransactionMode::WriteCoreReg, JtagState::PauseDR),
        ]);
    }

    #[test]
    fn switching_transaction_reselects_command_register() {
        let mut link = DebugLink::new(Recorder::default());
        link.set_transaction(TransactionMode::WriteCoreReg, JtagState::PauseDR);
        link.select_instruction(instruction::DATA);
        link.set_transaction(TransactionMode::ReadAuxReg, JtagState::PauseDR);
        assert_eq!(&link.queue().scans()[3..], &[
            ir(instruction::TRANSACTION_CMD),
            cmd(TransactionMode::ReadAuxReg, JtagState::PauseDR),
        ]);
        assert_eq!(link.current_transaction(), Some(TransactionMode::ReadAuxReg));
    }

    #[test]
    fn reset_from_noop_emits_nothing() {
        let mut link = DebugLink::new(Recorder::default());
        link.reset_transaction();
        assert!(link.queue().is_empty());
    }

    #[test]
    fn failed_batch_forgets_latched_state() {
        let mut link = DebugLink::new(Recorder { fail: true, ..Default::default() });
        link.set_transaction(TransactionMode::ReadMemory, JtagState::PauseDR);
        assert!(matches!(link.execute(), Err(Error::Transport(TransportError::QueueFull))));
        assert_eq!(link.current_instruction(), None);
        assert_eq!(link.current_transaction(), None);

        // The next reset goes out in full
        link.reset_transaction();
        assert_eq!(link.queue().scans(), &[
            ir(instruction::TRANSACTION_CMD),
            cmd(TransactionMode::NoOp, JtagState::Idle),
        ]);
    }

    #[test]
    fn idcode_read_is_one_batch() {
        let mut link = DebugLink::new(Recorder { word: 0x1234_5678, ..Default::default() });
        assert_eq!(link.read_idcode().unwrap(), 0x1234_5678);
        let batches = &link.transport().batches;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec![
            ir(instruction::IDCODE),
            ScanRequest::DataCapture { bits: 32, offset: 0, end: JtagState::Idle },
        ]);
    }

    #[test]
    fn status_flags() {
        let mut link = DebugLink::new(Recorder { word: 0b101, ..Default::default() });
        let status = link.read_status().unwrap();
        assert!(status.is_stalled());
        assert!(!status.has_failed());
        assert!(status.is_ready());
    }

    #[test]
    fn startup_executes_even_when_idle() {
        let mut link = DebugLink::new(Recorder::default());
        link.startup().unwrap();
        assert_eq!(link.transport().batches.len(), 1);
        assert!(link.transport().batches[0].is_empty());
        link.shutdown().unwrap();
    }
}
