//! This crate reads and writes the core registers, auxiliary registers and memory of an ARC
//! processor through its JTAG debug unit.
//!
//! At the lowest level is the JTAG cable.  The `Cable` trait allows for changing modes and
//! shifting bits in and out of the JTAG chain; drivers exist for FTDI MPSSE adapters such as the
//! "jtagkey" design, for J-Link, and for plain GPIO pins through `embedded-hal`.
//!
//! The `JtagSM` keeps track of the mode of the TAPs.  You tell it which mode you want (e.g.,
//! Reset or Idle) and it gets there with the fewest number of mode changes.  `Taps` sits on top
//! of that, knows how many TAPs are on the chain and their IR lengths, and lets you shift the
//! instruction and data registers of one of them while the others stay in BYPASS.
//!
//! `DebugLink` speaks the debug unit's transaction protocol over anything implementing
//! `ScanTransport`, which `Taps` does.  Each register or memory operation is queued as a batch
//! of scans and executed in one go; redundant instruction and transaction selections are
//! skipped.
//!
//! # Example
//! ```no_run
//! use arc_jtag::cable;
//! use arc_jtag::link::DebugLink;
//! use arc_jtag::statemachine::JtagSM;
//! use arc_jtag::taps::Taps;
//!
//! # fn main() -> Result<(), arc_jtag::error::Error> {
//! let cable = cable::new_from_string("jtagkey", 1 << 20)?;
//! let jtag = JtagSM::new(cable)?;
//! let mut taps = Taps::new(jtag);
//! taps.detect()?;
//! taps.select_tap(0)?;
//!
//! let mut link = DebugLink::new(taps);
//! link.startup()?;
//! println!("idcode {:#010x}", link.read_idcode()?);
//!
//! link.write_memory(0x2000, &[0xAABBCCDD, 0x11223344])?;
//! let mut words = [0; 2];
//! link.read_memory(0x2000, &mut words)?;
//! # Ok(())
//! # }
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod bits;
pub mod cable;
pub mod error;
pub mod link;
pub mod memory;
pub mod registers;
pub mod scan;
pub mod statemachine;
pub mod taps;

pub use error::{Error, TransportError};
pub use link::{DebugLink, JtagStatus, TransactionMode};
pub use registers::RegisterKind;
pub use scan::{ScanQueue, ScanRequest, ScanTransport};
pub use statemachine::JtagState;
