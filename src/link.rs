//! The serial link to the target.
//!
//! The push protocol only talks to the target through the [`Link`] trait,
//! and the session only (re)opens links through the [`Connector`] trait. The
//! production implementation sits on top of a `serialport` device; tests use
//! a scripted in-memory link.

use std::{fmt, io, time::Instant};

use crate::error::Result;

mod serial;

#[cfg(test)]
pub(crate) mod mock;

pub use serial::{SerialConnector, SerialLink};

// =============================================================================
// Public Interface
// =============================================================================

/// A byte-oriented duplex channel to the target.
pub trait Link {
    /// A name identifying the link, usually the device path.
    fn name(&self) -> String;

    /// Block until some bytes are available and return them, at most `max`.
    ///
    /// An empty buffer is only returned when the underlying device reported
    /// a zero-length read. When a `deadline` is given and passes before any
    /// byte arrives, the read fails with [`io::ErrorKind::TimedOut`]. A
    /// shutdown request surfaces as [`io::ErrorKind::Interrupted`].
    fn read_available(&mut self, max: usize, deadline: Option<Instant>) -> io::Result<Vec<u8>>;

    /// Write some of `buf` and return how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Drop any received data not read yet.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Forcibly reset and close the link. Any later operation fails.
    fn reset(&mut self);

    /// Write the whole of `buf`, looping over partial writes.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "link did not accept any byte",
                    ))
                }
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

impl fmt::Debug for dyn Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Link").field(&self.name()).finish()
    }
}

/// Opens links and tells whether the device behind them is present.
pub trait Connector {
    /// Open and configure a new link.
    fn open(&mut self) -> Result<Box<dyn Link>>;

    /// Whether the device is currently present on the system.
    fn is_connected(&self) -> bool;

    /// The device name, for operator messages.
    fn name(&self) -> &str;
}

// =============================================================================
// Unit Tests
// =============================================================================
