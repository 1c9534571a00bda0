//! Scripted in-memory link and connector for testing.
//!
//! All state sits behind `Arc<Mutex<_>>` so that a test keeps a handle on
//! the link after it has been boxed and moved into the session.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
    time::Instant,
};

use super::{Connector, Link};
use crate::error::{Error, Result};
use crate::shutdown::Shutdown;
use crate::terminal::Terminal;

enum Reply {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

#[derive(Default)]
struct Wire {
    replies: VecDeque<Reply>,
    writes: Vec<Vec<u8>>,
    write_limit: Option<usize>,
    write_error: Option<(usize, io::ErrorKind)>,
    discards: usize,
    resets: usize,
}

/// Mock link returning scripted reads and capturing writes.
///
/// When the script is exhausted, reads with a deadline time out and reads
/// without one report end of stream.
#[derive(Clone, Default)]
pub(crate) struct MockLink {
    wire: Arc<Mutex<Wire>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by a read.
    pub fn reply(&self, bytes: &[u8]) -> &Self {
        self.wire
            .lock()
            .unwrap()
            .replies
            .push_back(Reply::Data(bytes.to_vec()));
        self
    }

    /// Queue a read failure.
    pub fn fail(&self, kind: io::ErrorKind) -> &Self {
        self.wire.lock().unwrap().replies.push_back(Reply::Fail(kind));
        self
    }

    /// Accept at most `limit` bytes per write.
    pub fn limit_writes(&self, limit: usize) {
        self.wire.lock().unwrap().write_limit = Some(limit);
    }

    /// Fail every write after `after` successful ones.
    pub fn fail_writes(&self, after: usize, kind: io::ErrorKind) {
        self.wire.lock().unwrap().write_error = Some((after, kind));
    }

    /// All captured writes.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.wire.lock().unwrap().writes.clone()
    }

    /// Captured writes, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.writes().concat()
    }

    pub fn discards(&self) -> usize {
        self.wire.lock().unwrap().discards
    }

    pub fn resets(&self) -> usize {
        self.wire.lock().unwrap().resets
    }
}

impl Link for MockLink {
    fn name(&self) -> String {
        "mock".into()
    }

    fn read_available(&mut self, max: usize, deadline: Option<Instant>) -> io::Result<Vec<u8>> {
        let mut wire = self.wire.lock().unwrap();
        match wire.replies.pop_front() {
            Some(Reply::Data(mut data)) => {
                if data.len() > max {
                    let rest = data.split_off(max);
                    wire.replies.push_front(Reply::Data(rest));
                }
                Ok(data)
            }
            Some(Reply::Fail(kind)) => Err(kind.into()),
            None if deadline.is_some() => Err(io::ErrorKind::TimedOut.into()),
            None => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut wire = self.wire.lock().unwrap();
        if let Some((after, kind)) = wire.write_error {
            if wire.writes.len() >= after {
                return Err(kind.into());
            }
        }
        let n = wire.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        if n > 0 {
            wire.writes.push(buf[..n].to_vec());
        }
        Ok(n)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.wire.lock().unwrap().discards += 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.wire.lock().unwrap().resets += 1;
    }
}

#[derive(Default)]
struct Presence {
    script: VecDeque<bool>,
    unscripted: bool,
    polls: usize,
    interrupt_at: Option<usize>,
}

/// Mock connector handing out one scripted link per `open`.
///
/// Once all links have been handed out, `open` fails and requests a
/// shutdown so that a session under test always comes to an end.
///
/// Presence polls follow the script given to `presence`. Past the script,
/// the device is gone on one poll and back on the next, as if the operator
/// reconnected it right away.
#[derive(Clone)]
pub(crate) struct MockConnector {
    links: Arc<Mutex<VecDeque<MockLink>>>,
    opened: Arc<Mutex<usize>>,
    presence: Arc<Mutex<Presence>>,
    shutdown: Shutdown,
}

impl MockConnector {
    pub fn new(shutdown: Shutdown) -> Self {
        MockConnector {
            links: Arc::new(Mutex::new(VecDeque::new())),
            opened: Arc::new(Mutex::new(0)),
            presence: Arc::new(Mutex::new(Presence::default())),
            shutdown,
        }
    }

    /// Queue the answers of the next presence polls.
    pub fn presence(&self, script: &[bool]) {
        self.presence
            .lock()
            .unwrap()
            .script
            .extend(script.iter().copied());
    }

    /// Request a shutdown while answering the `poll`-th presence poll,
    /// counted from 1.
    pub fn interrupt_at_poll(&self, poll: usize) {
        self.presence.lock().unwrap().interrupt_at = Some(poll);
    }

    pub fn polls(&self) -> usize {
        self.presence.lock().unwrap().polls
    }

    /// Queue the link handed out by the next `open`.
    pub fn push(&self, link: MockLink) {
        self.links.lock().unwrap().push_back(link);
    }

    pub fn opened(&self) -> usize {
        *self.opened.lock().unwrap()
    }
}

impl Connector for MockConnector {
    fn open(&mut self) -> Result<Box<dyn Link>> {
        match self.links.lock().unwrap().pop_front() {
            Some(link) => {
                *self.opened.lock().unwrap() += 1;
                Ok(Box::new(link))
            }
            None => {
                self.shutdown.request();
                Err(Error::LinkLost(io::ErrorKind::NotFound.into()))
            }
        }
    }

    fn is_connected(&self) -> bool {
        let mut presence = self.presence.lock().unwrap();
        presence.polls += 1;
        if presence.interrupt_at == Some(presence.polls) {
            self.shutdown.request();
        }
        match presence.script.pop_front() {
            Some(present) => present,
            None => {
                presence.unscripted = !presence.unscripted;
                !presence.unscripted
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock terminal ending each interactive session with a scripted outcome.
///
/// `None` means the operator exited; `Some(kind)` a link failure. With no
/// outcome left, the operator exits.
#[derive(Clone, Default)]
pub(crate) struct MockTerminal {
    outcomes: Arc<Mutex<VecDeque<Option<io::ErrorKind>>>>,
    sessions: Arc<Mutex<usize>>,
}

impl MockTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: Option<io::ErrorKind>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn sessions(&self) -> usize {
        *self.sessions.lock().unwrap()
    }
}

impl Terminal for MockTerminal {
    fn run_interactive_session(&mut self, _link: &mut dyn Link) -> Result<()> {
        *self.sessions.lock().unwrap() += 1;
        match self.outcomes.lock().unwrap().pop_front().flatten() {
            Some(kind) => Err(io::Error::from(kind).into()),
            None => Ok(()),
        }
    }
}
