//! Error types shared by the cable drivers, the scan queue and the debug link.
use alloc::format;
use alloc::string::String;

use thiserror::Error;

/// Failure reported by the layer that actually shifts bits: a cable driver, the `Taps` wrapper,
/// or any other `ScanTransport`.  A failed queue execution is reported as one of these for the
/// whole batch.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cable failed to {operation}: {message}")]
    Cable {
        /// What the driver was doing (e.g. `"send MPSSE commands"`).
        operation: &'static str,
        /// Driver-specific detail, usually the `Debug` rendering of the underlying error.
        message: String,
    },

    #[cfg(feature = "std")]
    #[error("USB transfer failed")]
    Usb(#[from] rusb::Error),

    #[error("cable read queue is full")]
    QueueFull,

    #[error("unknown cable type '{0}'")]
    UnknownCable(String),

    #[error("no TAP is available at the selected scan chain position")]
    NoTap,

    #[error("instruction is {actual} bits but the selected TAP's IR is {expected} bits")]
    IrLength { expected: usize, actual: usize },

    #[error("unsupported TCK frequency {0} kHz")]
    InvalidClock(u32),
}

impl TransportError {
    /// Build a mapper turning a driver error into `TransportError::Cable`, for use with
    /// `map_err`.
    pub(crate) fn cable<E: core::fmt::Debug>(operation: &'static str) -> impl FnOnce(E) -> Self {
        move |err| TransportError::Cable {
            operation,
            message: format!("{:?}", err),
        }
    }
}

/// Errors returned by the debug link operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("scan queue execution failed")]
    Transport(#[from] TransportError),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
