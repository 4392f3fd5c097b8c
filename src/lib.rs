/*
Copyright (c) 2026 tinyVision.ai Inc.
LICENSE: BSD3 (see LICENSE file)
*/
#![no_std]

//! Drivers for the tinyVision.ai camera pipeline.
//!
//! A pipeline is built leaf-first out of owned device structs:
//! - an image sensor (IMX219, IMX296, IMX477) programmed over the
//!   two-wire camera control interface (CCI, i2c)
//! - MIPI D-PHY and CSI-2 receiver front ends
//! - in-fabric processing stages: debayer, statistics, frame stacker
//! - the UVC manager that fills caller buffers from the capture FIFO
//!
//! Each stage implements [`VideoDevice`] and forwards format, frame interval
//! and control requests to the stage it wraps. Also included are the
//! register-driven SPI master and the SPI NOR flash that sits on it.

#[cfg(test)]
extern crate std;

use core::fmt;

pub mod cci;
pub mod debayer;
pub mod device;
pub mod flash;
pub mod format;
pub mod imager;
pub mod ipa;
pub mod mipi;
pub mod mmio;
pub mod sensors;
pub mod spi;
pub mod stacker;
pub mod stats;
pub mod uvc;

#[cfg(test)]
mod mock;

pub use cci::{Cci, Endianness, Reg, RegValue};
pub use device::{Control, ControlId, VideoDevice};
pub use format::{Caps, Endpoint, Format, FormatCap, FrameInterval, PixelFormat};

/// Errors in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<CommE> {
    /// Sensor communication error, reported after the retry bound is exhausted
    Comm(CommE),

    /// The hardware did not respond in a timely manner
    Timeout,

    /// Requested format, frame interval or control is not supported
    Unsupported,

    /// An upstream device has not been initialized
    NotReady,

    /// The addressed endpoint does not exist on this device
    InvalidEndpoint,

    /// Index past the end of a list, or value outside an allowed range
    OutOfRange,

    /// Nothing available yet, try again
    WouldBlock,

    /// Register address carries invalid address or data size flags
    InvalidRegister,

    /// Chip identification register returned an unexpected value
    WrongChipId(u32),

    /// Offset or length is not aligned to the erase unit
    Misaligned,
}

impl<CommE> Error<CommE> {
    /// Convert the bus error type, keeping every other variant
    pub fn map_comm<F, E>(self, f: F) -> Error<E>
    where
        F: FnOnce(CommE) -> E,
    {
        match self {
            Error::Comm(e) => Error::Comm(f(e)),
            Error::Timeout => Error::Timeout,
            Error::Unsupported => Error::Unsupported,
            Error::NotReady => Error::NotReady,
            Error::InvalidEndpoint => Error::InvalidEndpoint,
            Error::OutOfRange => Error::OutOfRange,
            Error::WouldBlock => Error::WouldBlock,
            Error::InvalidRegister => Error::InvalidRegister,
            Error::WrongChipId(id) => Error::WrongChipId(id),
            Error::Misaligned => Error::Misaligned,
        }
    }
}

impl<CommE: fmt::Debug> fmt::Display for Error<CommE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Comm(e) => write!(f, "i/o error: {:?}", e),
            Error::Timeout => f.write_str("timeout"),
            Error::Unsupported => f.write_str("unsupported"),
            Error::NotReady => f.write_str("device not ready"),
            Error::InvalidEndpoint => f.write_str("invalid endpoint"),
            Error::OutOfRange => f.write_str("out of range"),
            Error::WouldBlock => f.write_str("would block"),
            Error::InvalidRegister => f.write_str("invalid register encoding"),
            Error::WrongChipId(id) => write!(f, "unexpected chip id 0x{:04x}", id),
            Error::Misaligned => f.write_str("misaligned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn bus_error_type_conversion() {
        let e: Error<u8> = Error::Comm(7);
        assert_eq!(e.map_comm(u32::from), Error::Comm(7u32));
        let e: Error<u8> = Error::WrongChipId(0x77);
        assert_eq!(e.map_comm(|_| ()), Error::WrongChipId(0x77));
    }

    #[test]
    fn display() {
        assert_eq!(Error::<()>::WrongChipId(0x77).to_string(), "unexpected chip id 0x0077");
        assert_eq!(Error::Comm(5).to_string(), "i/o error: 5");
    }
}
