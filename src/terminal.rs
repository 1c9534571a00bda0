//! Interactive pass-through between the local console and the target.
//!
//! Once the image has been pushed, the link becomes a plain serial console:
//! everything the target sends is printed, every key pressed is sent to the
//! target. The console is put in raw mode for the duration of the session,
//! so `Ctrl+C` arrives as a key event and ends the session.

use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use crossterm::{
    event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use log::{debug, info};

use crate::error::{console_error, Result};
use crate::link::Link;
use crate::shutdown::Shutdown;

// =============================================================================
// Public Interface
// =============================================================================

/// Runs the interactive session over a link after the image was pushed.
pub trait Terminal {
    /// Run until the operator exits (`Ok`) or the link fails.
    fn run_interactive_session(&mut self, link: &mut dyn Link) -> Result<()>;
}

/// A [`Terminal`] on the process' own console.
pub struct ConsoleTerminal {
    shutdown: Shutdown,
    max_read: usize,
    poll_period: Duration,
}

impl ConsoleTerminal {
    pub fn new(shutdown: Shutdown, max_read: usize) -> Self {
        ConsoleTerminal {
            shutdown,
            max_read,
            poll_period: Duration::from_millis(10),
        }
    }
}

impl Terminal for ConsoleTerminal {
    fn run_interactive_session(&mut self, link: &mut dyn Link) -> Result<()> {
        info!("=> Terminal session on {:?}", link.name());
        let _raw = RawMode::enable()?;
        let mut stdout = io::stdout();

        loop {
            if self.shutdown.is_requested() {
                return Ok(());
            }

            // It's guaranteed that read() wont block if `poll` returns `Ok(true)`
            if poll(Duration::from_millis(0)).map_err(console_error)? {
                if let Event::Key(key) = read().map_err(console_error)? {
                    if key
                        == (KeyEvent {
                            modifiers: KeyModifiers::CONTROL,
                            code: KeyCode::Char('c'),
                        })
                    {
                        debug!("Ctrl+C in terminal session");
                        return Ok(());
                    }
                    if let Some(bytes) = key_bytes(key) {
                        link.write_all(&bytes)?;
                    }
                }
            }

            match link.read_available(self.max_read, Some(Instant::now() + self.poll_period)) {
                Ok(received) => {
                    stdout.write_all(&received).map_err(console_error)?;
                    stdout.flush().map_err(console_error)?;
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// Raw mode for as long as the value lives.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        enable_raw_mode().map_err(console_error)?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            debug!("could not leave raw mode: {}", e);
        }
    }
}

/// The bytes a key sends on the serial line, if any.
fn key_bytes(key: KeyEvent) -> Option<Vec<u8>> {
    let bytes = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if !c.is_ascii_alphabetic() {
                return None;
            }
            vec![c.to_ascii_lowercase() as u8 & 0x1f]
        }
        KeyCode::Char(c) => {
            let mut buf = [0; 4];
            c.encode_utf8(&mut buf).as_bytes().to_vec()
        }
        KeyCode::Enter => b"\r".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Tab => b"\t".to_vec(),
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        _ => return None,
    };
    Some(bytes)
}

// =============================================================================
// Unit Tests
// =============================================================================
