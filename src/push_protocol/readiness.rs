//! Detection of the target's request for the image.

use std::{
    io::Write,
    time::{Duration, Instant},
};

use log::{debug, trace};

use crate::error::{console_error, Error, Result};
use crate::link::Link;

/// Sent by the target, after its boot log, when it is ready to receive.
pub const READINESS_TOKEN: [u8; 3] = [0x03, 0x03, 0x03];

/// Forward the target's output to `console` until it ends with the
/// [`READINESS_TOKEN`].
///
/// The first read may wait forever: the target may not even be powered yet.
/// Once it returns, the whole handshake must complete within `budget`.
///
/// Trailing `0x03` bytes are held back until the next read tells whether
/// they are the start of the token, so the token never reaches the console
/// even when it is split over several reads.
pub fn wait_for_readiness(
    link: &mut dyn Link,
    console: &mut dyn Write,
    budget: Duration,
    max_read: usize,
) -> Result<()> {
    let mut held: Vec<u8> = Vec::with_capacity(READINESS_TOKEN.len());
    let mut deadline: Option<Instant> = None;

    let result = loop {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break Err(Error::HandshakeTimeout(budget));
            }
        }

        let received = match link.read_available(max_read, deadline) {
            Ok(received) => received,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                break Err(Error::HandshakeTimeout(budget))
            }
            Err(e) => break Err(e.into()),
        };
        if received.is_empty() {
            break Err(Error::ProtocolViolation("empty read while waiting for the target"));
        }
        if deadline.is_none() {
            debug!("first bytes from the target, {:?} to request the image", budget);
            deadline = Some(Instant::now() + budget);
        }

        held.extend_from_slice(&received);
        if held.ends_with(&READINESS_TOKEN) {
            held.truncate(held.len() - READINESS_TOKEN.len());
            trace!("readiness token received");
            break Ok(());
        }

        let pending = held
            .iter()
            .rev()
            .take(READINESS_TOKEN.len() - 1)
            .take_while(|b| **b == READINESS_TOKEN[0])
            .count();
        let split = held.len() - pending;
        forward(console, &held[..split])?;
        held.drain(..split);
    };

    forward(console, &held)?;
    result
}

fn forward(console: &mut dyn Write, bytes: &[u8]) -> Result<()> {
    console.write_all(bytes).map_err(console_error)?;
    console.flush().map_err(console_error)
}
