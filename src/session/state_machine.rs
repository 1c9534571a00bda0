//! `bootpush` session state machine.
//!
//! A session pushes the image and then hands the link over to the
//! interactive terminal. Any link, timeout or protocol error on the way
//! restarts the whole sequence from scratch once the target is back; any
//! other error ends the session. Every way out goes through `Terminated`,
//! which resets the link.
//!
//! The following state diagram summarizes the different states and transitions
//! a session goes through:
//!
//! ```text
//!                        START
//!                          |
//!                          v
//!                  .--------------.
//!        .-------->|  Connecting  |------------------------.
//!        |         '--------------'                        |
//!        |                 |                               |
//!        |                 v                               |
//!        |       .-------------------.                     |
//!        |       | AwaitingReadiness |------------------.  |
//!        |       '-------------------'                  |  |
//!        |                 |                            |  |
//!        |                 v                            |  |
//!   reconnected   .-----------------.                   |  |
//!        |        | NegotiatingSize |----------------.  |  |
//!        |        '-----------------'                |  |  |
//!        |                 |                         |  |  |
//!        |                 v                         |  |  |
//!        |         .--------------.    recoverable   |  |  |
//!        |         | Transmitting |-------error----. |  |  |
//!        |         '--------------'                | |  |  |
//!        |                 |                       v v  v  v
//!        |                 v                     .------------.
//!        |   .------------------------.          | Recovering |
//!        |   | InteractivePassthrough |--------->'------------'
//!        |   '------------------------'                |
//!        |                 |                           |
//!        '-----------------+---------------------------'
//!                          |   exit, interrupt or fatal error
//!                          v   (from any state)
//!                   .------------.
//!                   | Terminated |
//!                   '------------'
//!                          |
//!                          v
//!                         END
//! ```

use std::io::{self, Write};

use super::events::*;
use super::states::*;
use crate::link::{Connector, SerialConnector};
use crate::settings::Settings;
use crate::shutdown::Shutdown;
use crate::terminal::{ConsoleTerminal, Terminal};

// =============================================================================
// Public Interface
// =============================================================================

/// Represents the `bootpush` session state machine. Use the `factory()`
/// function to get an instance over the serial port, or `PushSession::new()`
/// to provide the collaborators, then run it by calling its `run()` method.
pub struct PushSession {
    ctx: SessionContext,
}
impl PushSession {
    pub fn new(
        settings: Settings,
        connector: Box<dyn Connector>,
        terminal: Box<dyn Terminal>,
        shutdown: Shutdown,
    ) -> Self {
        PushSession {
            ctx: SessionContext {
                settings,
                connector,
                terminal,
                console: Box::new(io::stdout()),
                shutdown,
            },
        }
    }

    /// Forward the target's boot output to `console` instead of `stdout`.
    pub fn with_console(mut self, console: Box<dyn Write>) -> Self {
        self.ctx.console = console;
        self
    }

    /// The session event loop runs until the `Terminated` state is reached
    /// and its `should_exit` flag is set. At such point, the event loop
    /// terminates and returns an exit code indicating no errors when equal to
    /// **`0`**; otherwise a termination with error.
    pub fn run(&mut self) -> i8 {
        let mut sm = SessionStates::Connecting(ConnectingState {});
        loop {
            sm = sm.step(&mut self.ctx);
            if let SessionStates::Terminated(state) = &sm {
                if state.should_exit {
                    return if state.with_error { 1 } else { 0 };
                }
            }
        }
    }
}

/// Factory function for a session over the serial port named in the
/// `settings`, with the interactive terminal on the process' console.
pub fn factory(settings: Settings, shutdown: Shutdown) -> PushSession {
    let connector = SerialConnector::new(settings.clone(), shutdown.clone());
    let terminal = ConsoleTerminal::new(shutdown.clone(), settings.max_read);
    PushSession::new(settings, Box::new(connector), Box::new(terminal), shutdown)
}

// =============================================================================
// Private stuff
// =============================================================================

/// An enum wrapper around the states of the session state machine. It
/// provides a simpler and more intuitive model for manipulating states and
/// their transitions.
#[derive(Debug)]
enum SessionStates {
    Connecting(ConnectingState),
    AwaitingReadiness(AwaitingReadinessState),
    NegotiatingSize(NegotiatingSizeState),
    Transmitting(TransmittingState),
    InteractivePassthrough(InteractivePassthroughState),
    Recovering(RecoveringState),
    Terminated(TerminatedState),
}
impl SessionStates {
    /// The unit of work in the state machine event loop. It runs the current
    /// state and decides the next transition from the event it returns.
    /// State transitions from events are implemented using the rust
    /// `From`/`Into` pattern, so most state/event mismatches are caught at
    /// compile time.
    fn step(self, ctx: &mut SessionContext) -> Self {
        match self {
            SessionStates::Connecting(state) => match state.run(ctx) {
                Event::LinkOpened(ev) => SessionStates::AwaitingReadiness(ev.into()),
                Event::Recover(ev) => SessionStates::Recovering(ev.into()),
                Event::Terminate(ev) => SessionStates::Terminated(ev.into()),
                event => unreachable!("illegal event {:#?} at Connecting", event),
            },
            SessionStates::AwaitingReadiness(state) => match state.run(ctx) {
                Event::TargetReady(ev) => SessionStates::NegotiatingSize(ev.into()),
                Event::Recover(ev) => SessionStates::Recovering(ev.into()),
                Event::Terminate(ev) => SessionStates::Terminated(ev.into()),
                event => unreachable!("illegal event {:#?} at AwaitingReadiness", event),
            },
            SessionStates::NegotiatingSize(state) => match state.run(ctx) {
                Event::SizeAccepted(ev) => SessionStates::Transmitting(ev.into()),
                Event::Recover(ev) => SessionStates::Recovering(ev.into()),
                Event::Terminate(ev) => SessionStates::Terminated(ev.into()),
                event => unreachable!("illegal event {:#?} at NegotiatingSize", event),
            },
            SessionStates::Transmitting(state) => match state.run(ctx) {
                Event::ImagePushed(ev) => SessionStates::InteractivePassthrough(ev.into()),
                Event::Recover(ev) => SessionStates::Recovering(ev.into()),
                Event::Terminate(ev) => SessionStates::Terminated(ev.into()),
                event => unreachable!("illegal event {:#?} at Transmitting", event),
            },
            SessionStates::InteractivePassthrough(state) => match state.run(ctx) {
                Event::Recover(ev) => SessionStates::Recovering(ev.into()),
                Event::Terminate(ev) => SessionStates::Terminated(ev.into()),
                event => unreachable!("illegal event {:#?} at InteractivePassthrough", event),
            },
            SessionStates::Recovering(state) => match state.run(ctx) {
                Event::Reconnected(ev) => SessionStates::Connecting(ev.into()),
                Event::Terminate(ev) => SessionStates::Terminated(ev.into()),
                event => unreachable!("illegal event {:#?} at Recovering", event),
            },
            SessionStates::Terminated(state) => match state.run(ctx) {
                Event::Exit(ev) => SessionStates::Terminated(ev.into()),
                event => unreachable!("illegal event {:#?} at Terminated", event),
            },
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<LinkOpenedEvent> for AwaitingReadinessState {
    fn from(event: LinkOpenedEvent) -> AwaitingReadinessState {
        AwaitingReadinessState { link: event.link }
    }
}

impl From<TargetReadyEvent> for NegotiatingSizeState {
    fn from(event: TargetReadyEvent) -> NegotiatingSizeState {
        NegotiatingSizeState {
            link: event.link,
            image: event.image,
        }
    }
}

impl From<SizeAcceptedEvent> for TransmittingState {
    fn from(event: SizeAcceptedEvent) -> TransmittingState {
        TransmittingState {
            link: event.link,
            image: event.image,
        }
    }
}

impl From<ImagePushedEvent> for InteractivePassthroughState {
    fn from(event: ImagePushedEvent) -> InteractivePassthroughState {
        InteractivePassthroughState { link: event.link }
    }
}

impl From<RecoverEvent> for RecoveringState {
    fn from(event: RecoverEvent) -> RecoveringState {
        RecoveringState {
            link: event.link,
            error: event.error,
        }
    }
}

impl From<ReconnectedEvent> for ConnectingState {
    fn from(_event: ReconnectedEvent) -> ConnectingState {
        ConnectingState {}
    }
}

impl From<TerminateEvent> for TerminatedState {
    fn from(event: TerminateEvent) -> TerminatedState {
        TerminatedState {
            link: event.link,
            with_error: event.with_error,
            should_exit: false,
        }
    }
}
impl From<ExitEvent> for TerminatedState {
    fn from(event: ExitEvent) -> TerminatedState {
        TerminatedState {
            link: None,
            with_error: event.with_error,
            should_exit: true,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::{
        io,
        path::Path,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use super::*;
    use crate::link::mock::{MockConnector, MockLink, MockTerminal};
    use crate::settings::SettingsBuilder;

    /// Console output shared with the test after the session took it.
    #[derive(Clone, Default)]
    struct Console(Arc<Mutex<Vec<u8>>>);

    impl Write for Console {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        connector: MockConnector,
        terminal: MockTerminal,
        console: Console,
        session: PushSession,
    }

    fn harness(image_path: &Path) -> Harness {
        let shutdown = Shutdown::new();
        let settings = SettingsBuilder::new()
            .path("/dev/ttyMOCK0")
            .image_path(image_path.to_string_lossy())
            .poll_interval(Duration::from_millis(0))
            .finalize();
        let connector = MockConnector::new(shutdown.clone());
        let terminal = MockTerminal::new();
        let console = Console::default();
        let session = PushSession::new(
            settings,
            Box::new(connector.clone()),
            Box::new(terminal.clone()),
            shutdown,
        )
        .with_console(Box::new(console.clone()));
        Harness {
            connector,
            terminal,
            console,
            session,
        }
    }

    fn image_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        file.write_all(&data).unwrap();
        file
    }

    fn target(ack: &[u8]) -> MockLink {
        let link = MockLink::new();
        link.reply(b"boot log...\x03\x03\x03").reply(ack);
        link
    }

    fn segment_sizes(link: &MockLink) -> Vec<usize> {
        link.writes().iter().map(Vec::len).collect()
    }

    #[test]
    fn push_then_terminal() {
        let image = image_file(1500);
        let mut h = harness(image.path());
        let link = target(b"OK");
        h.connector.push(link.clone());

        assert_eq!(h.session.run(), 0);
        assert_eq!(segment_sizes(&link), vec![4, 512, 512, 476]);
        assert_eq!(link.writes()[0], vec![0xDC, 0x05, 0x00, 0x00]);
        assert_eq!(&link.written()[4..], std::fs::read(image.path()).unwrap().as_slice());
        assert_eq!(*h.console.0.lock().unwrap(), b"boot log...");
        assert_eq!(h.terminal.sessions(), 1);
        assert_eq!(h.connector.opened(), 1);
        assert_eq!(link.resets(), 1);
    }

    #[test]
    fn wrong_ack_restarts_from_scratch() {
        let image = image_file(1500);
        let mut h = harness(image.path());
        let first = target(b"NO");
        let second = target(b"OK");
        h.connector.push(first.clone());
        h.connector.push(second.clone());

        assert_eq!(h.session.run(), 0);
        assert_eq!(segment_sizes(&first), vec![4]);
        assert_eq!(first.resets(), 1);
        assert_eq!(segment_sizes(&second), vec![4, 512, 512, 476]);
        assert_eq!(second.resets(), 1);
        assert_eq!(h.connector.opened(), 2);
        assert_eq!(h.terminal.sessions(), 1);
    }

    #[test]
    fn attempts_send_identical_bytes() {
        let image = image_file(2000);
        let mut h = harness(image.path());
        let first = target(b"OK");
        let second = target(b"OK");
        h.connector.push(first.clone());
        h.connector.push(second.clone());
        // The target is unplugged during the first terminal session.
        h.terminal.push(Some(io::ErrorKind::BrokenPipe));
        h.terminal.push(None);

        assert_eq!(h.session.run(), 0);
        assert_eq!(first.writes(), second.writes());
        assert_eq!(h.terminal.sessions(), 2);
    }

    #[test]
    fn link_lost_during_transfer() {
        let image = image_file(1500);
        let mut h = harness(image.path());
        let first = target(b"OK");
        first.fail_writes(2, io::ErrorKind::BrokenPipe);
        let second = target(b"OK");
        h.connector.push(first.clone());
        h.connector.push(second.clone());

        assert_eq!(h.session.run(), 0);
        assert_eq!(segment_sizes(&first), vec![4, 512]);
        assert_eq!(segment_sizes(&second), vec![4, 512, 512, 476]);
    }

    #[test]
    fn waits_for_the_target_to_be_reconnected() {
        let image = image_file(16);
        let mut h = harness(image.path());
        let first = target(b"NO");
        let second = target(b"OK");
        h.connector.push(first.clone());
        h.connector.push(second.clone());
        // Still plugged, unplugged, still unplugged, back.
        h.connector.presence(&[true, false, false, true]);

        assert_eq!(h.session.run(), 0);
        assert_eq!(h.connector.polls(), 4);
        assert_eq!(h.connector.opened(), 2);
        assert_eq!(segment_sizes(&second), vec![4, 16]);
    }

    #[test]
    fn interrupt_while_the_target_is_unplugged() {
        let image = image_file(16);
        let mut h = harness(image.path());
        let first = target(b"NO");
        let spare = target(b"OK");
        h.connector.push(first.clone());
        h.connector.push(spare.clone());
        h.connector.presence(&[false, false, false]);
        h.connector.interrupt_at_poll(2);

        assert_eq!(h.session.run(), 0);
        assert_eq!(h.connector.polls(), 2);
        assert_eq!(h.connector.opened(), 1);
        assert_eq!(first.resets(), 1);
        assert!(spare.writes().is_empty());
    }

    #[test]
    fn handshake_timeout_recovers() {
        let image = image_file(16);
        let mut h = harness(image.path());
        let silent = MockLink::new();
        // Boot log without token, then nothing: the read with a deadline
        // times out.
        silent.reply(b"booting");
        let second = target(b"OK");
        h.connector.push(silent.clone());
        h.connector.push(second.clone());

        assert_eq!(h.session.run(), 0);
        assert!(silent.writes().is_empty());
        assert_eq!(silent.resets(), 1);
        assert_eq!(segment_sizes(&second), vec![4, 16]);
    }

    #[test]
    fn missing_image_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(&dir.path().join("kernel8.img"));
        let link = target(b"OK");
        let spare = target(b"OK");
        h.connector.push(link.clone());
        h.connector.push(spare);

        assert_eq!(h.session.run(), 1);
        assert!(link.writes().is_empty());
        assert_eq!(link.resets(), 1);
        assert_eq!(h.connector.opened(), 1);
        assert_eq!(h.terminal.sessions(), 0);
    }

    #[test]
    fn interrupt_while_waiting_for_the_target() {
        let image = image_file(16);
        let mut h = harness(image.path());
        let link = MockLink::new();
        link.reply(b"booting").fail(io::ErrorKind::Interrupted);
        h.connector.push(link.clone());

        assert_eq!(h.session.run(), 0);
        assert_eq!(link.resets(), 1);
        assert_eq!(h.connector.opened(), 1);
        assert_eq!(*h.console.0.lock().unwrap(), b"booting");
    }

    #[test]
    fn interrupt_while_recovering() {
        let image = image_file(16);
        let mut h = harness(image.path());
        // No device at all: the connector requests a shutdown.

        assert_eq!(h.session.run(), 0);
        assert_eq!(h.connector.opened(), 0);
        assert_eq!(h.terminal.sessions(), 0);
    }
}
