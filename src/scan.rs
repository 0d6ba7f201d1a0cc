//! Scan requests and the queue that batches them into one transport submission.
//!
//! Outbound values are copied into the request when it is queued.  Capture destinations are
//! reserved in a buffer owned by the `ScanQueue` and only handed out, as `Captures`, after the
//! transport has run the whole batch successfully.  A `Capture` handle is the only way to look at
//! captured bits, so nothing can read a capture slot before it is filled in.
use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use crate::bits;
use crate::error::TransportError;
use crate::statemachine::JtagState;

/// One instruction or data scan, with the TAP state to settle in once it is shifted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanRequest {
    /// Shift `value` into the instruction register.
    Instruction { bits: usize, value: u32, end: JtagState },
    /// Shift `value` into the data register, discarding what comes out.
    DataOut { bits: usize, value: u32, end: JtagState },
    /// Shift the data register out into the capture buffer at byte `offset`.
    DataCapture { bits: usize, offset: usize, end: JtagState },
}

impl ScanRequest {
    pub fn end_state(&self) -> JtagState {
        match *self {
            ScanRequest::Instruction { end, .. }
            | ScanRequest::DataOut { end, .. }
            | ScanRequest::DataCapture { end, .. } => end,
        }
    }
}

/// Something that can run a batch of scans against the debug TAP.
pub trait ScanTransport {
    /// Width in bits of the addressed TAP's instruction register
    fn ir_length(&self) -> usize;

    /// Shift every request in `scans`, in order.  Each `DataCapture` stores its bits LSB-first
    /// at `capture[offset..]`; `capture` is sized for all of them.  Returns once the whole batch
    /// has run; an error covers the whole batch.
    fn execute(&mut self, scans: &[ScanRequest], capture: &mut [u8]) -> Result<(), TransportError>;
}

impl<T: ScanTransport + ?Sized> ScanTransport for &mut T {
    fn ir_length(&self) -> usize {
        (**self).ir_length()
    }

    fn execute(&mut self, scans: &[ScanRequest], capture: &mut [u8]) -> Result<(), TransportError> {
        (**self).execute(scans, capture)
    }
}

/// Handle to the captured bits of one `DataCapture` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capture {
    offset: usize,
    bits: usize,
}

/// Capture buffer of an executed queue.
#[derive(Debug)]
pub struct Captures {
    buf: Vec<u8>,
}

impl Captures {
    /// Decode a capture of up to 32 bits as an unsigned value
    pub fn word(&self, capture: Capture) -> u32 {
        bits::get_u32(&self.buf, capture.offset * 8, capture.bits)
    }

    /// Raw captured bytes of one capture
    pub fn bytes(&self, capture: Capture) -> &[u8] {
        &self.buf[capture.offset..capture.offset + bits::bytes_for(capture.bits)]
    }
}

#[derive(Debug, Default)]
pub struct ScanQueue {
    scans: Vec<ScanRequest>,
    capture_len: usize,
}

impl ScanQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests queued so far
    pub fn scans(&self) -> &[ScanRequest] {
        &self.scans
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn instruction(&mut self, bits: usize, value: u32, end: JtagState) {
        self.scans.push(ScanRequest::Instruction { bits, value, end });
    }

    pub fn data_out(&mut self, bits: usize, value: u32, end: JtagState) {
        self.scans.push(ScanRequest::DataOut { bits, value, end });
    }

    /// Queue a capture of `bits` bits.  Its value is available from the `Captures` returned by
    /// `execute`.
    pub fn data_capture(&mut self, bits: usize, end: JtagState) -> Capture {
        let offset = self.capture_len;
        self.capture_len += bits::bytes_for(bits);
        self.scans.push(ScanRequest::DataCapture { bits, offset, end });
        Capture { offset, bits }
    }

    /// Forget everything queued so far
    pub fn clear(&mut self) {
        self.scans.clear();
        self.capture_len = 0;
    }

    /// Hand every queued request to `transport` as one batch.  The queue is empty afterwards
    /// whether or not the transport succeeds.
    pub fn execute<T: ScanTransport + ?Sized>(&mut self, transport: &mut T) -> Result<Captures, TransportError> {
        let scans = mem::take(&mut self.scans);
        let mut buf = vec![0; mem::take(&mut self.capture_len)];
        transport.execute(&scans, &mut buf)?;
        Ok(Captures { buf })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        fail: bool,
        seen: usize,
    }

    impl ScanTransport for Echo {
        fn ir_length(&self) -> usize {
            4
        }

        // Captures read back the bit count, so each slot is distinguishable
        fn execute(&mut self, scans: &[ScanRequest], capture: &mut [u8]) -> Result<(), TransportError> {
            self.seen += scans.len();
            if self.fail {
                return Err(TransportError::QueueFull);
            }
            for scan in scans {
                if let ScanRequest::DataCapture { bits, offset, .. } = *scan {
                    bits::set_u32(capture, offset * 8, bits, 0xC0DE_0000 | bits as u32);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn captures_get_separate_slots() {
        let mut queue = ScanQueue::new();
        queue.instruction(4, 0xB, JtagState::PauseIR);
        let a = queue.data_capture(32, JtagState::Idle);
        let b = queue.data_capture(32, JtagState::Idle);
        assert_eq!(queue.len(), 3);

        let mut echo = Echo { fail: false, seen: 0 };
        let captures = queue.execute(&mut echo).unwrap();
        assert_eq!(echo.seen, 3);
        assert_eq!(captures.word(a), 0xC0DE_0020);
        assert_eq!(captures.word(b), 0xC0DE_0020);
        assert_eq!(captures.bytes(b), &[0x20, 0x00, 0xDE, 0xC0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn failed_batch_still_drains_queue() {
        let mut queue = ScanQueue::new();
        queue.data_out(32, 1, JtagState::Idle);
        queue.data_capture(32, JtagState::Idle);

        let mut echo = Echo { fail: true, seen: 0 };
        assert!(queue.execute(&mut echo).is_err());
        assert!(queue.is_empty());

        // A later capture starts from a fresh buffer
        let c = queue.data_capture(8, JtagState::Idle);
        assert_eq!(c, Capture { offset: 0, bits: 8 });
    }

    #[test]
    fn end_state_of_request() {
        let req = ScanRequest::DataOut { bits: 4, value: 3, end: JtagState::PauseDR };
        assert_eq!(req.end_state(), JtagState::PauseDR);
    }
}
