//! Size negotiation: the only step the target acknowledges.

use std::io;

use hexplay::HexViewBuilder;
use log::{debug, log_enabled, trace, Level::Debug};

use crate::error::{Error, Result};
use crate::link::Link;

/// Expected answer to the image size.
pub const ACK: [u8; 2] = *b"OK";

/// Send the image size as 4 bytes, lowest order first, and wait for the
/// target to confirm it with `'O'` `'K'`.
///
/// A short answer (end of stream or empty read before two bytes arrived) is
/// a protocol violation, as is any other pair of bytes.
pub fn negotiate_size(link: &mut dyn Link, size: u32) -> Result<()> {
    link.discard_input()?;
    link.write_all(&size.to_le_bytes())?;
    trace!("sent image size {}", size);

    let mut ack: Vec<u8> = Vec::with_capacity(ACK.len());
    while ack.len() < ACK.len() {
        match link.read_available(ACK.len() - ack.len(), None) {
            Ok(received) if received.is_empty() => break,
            Ok(received) => ack.extend_from_slice(&received),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
    }

    // Dump the received data in a hex table for debugging
    if log_enabled!(Debug) {
        let view = HexViewBuilder::new(&ack)
            .address_offset(0)
            .row_width(16)
            .finish();
        debug!("size acknowledgment:\n{}", view);
    }

    if ack != ACK {
        return Err(Error::ProtocolViolation("image size was not confirmed with `OK`"));
    }
    Ok(())
}
