//! States for the `bootpush` session state machine.
//!
//! This module is private and restricted to the [`session`](crate::session)
//! scope. The public interface of the state machine is provided by
//! [`session`](crate::session).
//!
//! ```ignore
//! use super::states::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::{error::Error as _, io::Write, thread};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use super::events::*;
use crate::error::Error;
use crate::image::BinaryImage;
use crate::link::{Connector, Link};
use crate::push_protocol as pp;
use crate::settings::Settings;
use crate::shutdown::Shutdown;
use crate::terminal::Terminal;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Data and collaborators shared by all states.
pub(crate) struct SessionContext {
    pub settings: Settings,
    pub connector: Box<dyn Connector>,
    pub terminal: Box<dyn Terminal>,
    /// Where the target's boot output is forwarded.
    pub console: Box<dyn Write>,
    pub shutdown: Shutdown,
}

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// The `state` is consumed, and any data it holds (the link, the image)
    /// moves into the returned `event`. The `event` is then consumed to
    /// create the `new state` using the corresponding [`From`] trait
    /// implementation (provided such implementation exists).
    fn run(self, ctx: &mut SessionContext) -> Event;
}

// Connecting State ============================================================

/// The initial state, also re-entered after each recovery.
///
///  * **[`LinkOpenedEvent`] => [`AwaitingReadinessState`]** when the serial
///    port was opened,
///  * **[`RecoverEvent`] => [`RecoveringState`]** when it could not be,
///  * **[`TerminateEvent`] => [`TerminatedState`]** on operator interrupt.
#[derive(Debug)]
pub(crate) struct ConnectingState {}
impl Runnable for ConnectingState {
    fn run(self, ctx: &mut SessionContext) -> Event {
        info!("=> Connecting");
        if ctx.shutdown.is_requested() {
            return failure(None, Error::Interrupted);
        }

        println!(
            "[BP] ⏳ Connecting to {}",
            style(ctx.connector.name()).cyan()
        );
        match ctx.connector.open() {
            Ok(link) => {
                println!("[BP] ✅ Serial connected");
                Event::LinkOpened(LinkOpenedEvent { link })
            }
            Err(e) => failure(None, e),
        }
    }
}

// AwaitingReadiness State =====================================================

/// A `state` where the target's output is forwarded to the console until it
/// requests the image by sending **`0x03`** **three(3)** times. The image is
/// then loaded from disk, fresh for this attempt.
///
///  * **[`TargetReadyEvent`] => [`NegotiatingSizeState`]** when the image was
///    requested and loaded,
///  * **[`RecoverEvent`] => [`RecoveringState`]** on timeout, protocol or link
///    error,
///  * **[`TerminateEvent`] => [`TerminatedState`]** when the image can't be
///    loaded or on operator interrupt.
#[derive(Debug)]
pub(crate) struct AwaitingReadinessState {
    pub link: Box<dyn Link>,
}
impl Runnable for AwaitingReadinessState {
    fn run(self, ctx: &mut SessionContext) -> Event {
        info!("=> AwaitingReadiness");
        let mut link = self.link;

        println!("[BP] 🔌 Please power the target now");
        if let Err(e) = pp::wait_for_readiness(
            &mut *link,
            &mut *ctx.console,
            ctx.settings.readiness_budget,
            ctx.settings.max_read,
        ) {
            return failure(Some(link), e);
        }
        println!();

        match BinaryImage::load(&ctx.settings.image_path) {
            Ok(image) => Event::TargetReady(TargetReadyEvent { link, image }),
            Err(e) => failure(Some(link), e),
        }
    }
}

// NegotiatingSize State =======================================================

/// A `state` where the image size is sent, in **[`little
/// endian`](https://en.wikipedia.org/wiki/Endianness)** format, and confirmed
/// by the target with the bytes `'O'` `'K'`.
///
///  * **[`SizeAcceptedEvent`] => [`TransmittingState`]** on `OK`,
///  * **[`RecoverEvent`] => [`RecoveringState`]** on anything else.
#[derive(Debug)]
pub(crate) struct NegotiatingSizeState {
    pub link: Box<dyn Link>,
    pub image: BinaryImage,
}
impl Runnable for NegotiatingSizeState {
    fn run(self, _ctx: &mut SessionContext) -> Event {
        info!("=> NegotiatingSize");
        let mut link = self.link;

        match pp::negotiate_size(&mut *link, self.image.size()) {
            Ok(()) => Event::SizeAccepted(SizeAcceptedEvent {
                link,
                image: self.image,
            }),
            Err(e) => failure(Some(link), e),
        }
    }
}

// Transmitting State ==========================================================

/// A `state` where the entire content of the image is pushed, with no
/// acknowledgment from the target.
///
///  * **[`ImagePushedEvent`] => [`InteractivePassthroughState`]** upon
///    completion,
///  * **[`RecoverEvent`] => [`RecoveringState`]** when the link fails. There
///    is no resume, the whole sequence restarts.
#[derive(Debug)]
pub(crate) struct TransmittingState {
    pub link: Box<dyn Link>,
    pub image: BinaryImage,
}
impl Runnable for TransmittingState {
    fn run(self, ctx: &mut SessionContext) -> Event {
        info!("=> Transmitting");
        let mut link = self.link;

        let mut pb = pp::push_progress_bar(self.image.len());
        match pp::transmit(&mut *link, &self.image, ctx.settings.segment_size, &mut pb) {
            Ok(progress) => {
                debug!(
                    "{} bytes pushed at {:.0} bytes/s",
                    progress.sent(),
                    progress.throughput()
                );
                println!("[BP] 🦀 Image pushed, switching to terminal mode");
                Event::ImagePushed(ImagePushedEvent { link })
            }
            Err(e) => {
                pb.abandon();
                failure(Some(link), e)
            }
        }
    }
}

// InteractivePassthrough State ================================================

/// A `state` where the link is handed over to the interactive terminal.
///
///  * **[`TerminateEvent`] => [`TerminatedState`]** when the operator exits,
///  * **[`RecoverEvent`] => [`RecoveringState`]** when the link fails, so the
///    next image can be pushed once the target is back.
#[derive(Debug)]
pub(crate) struct InteractivePassthroughState {
    pub link: Box<dyn Link>,
}
impl Runnable for InteractivePassthroughState {
    fn run(self, ctx: &mut SessionContext) -> Event {
        info!("=> InteractivePassthrough");
        let mut link = self.link;

        match ctx.terminal.run_interactive_session(&mut *link) {
            Ok(()) => Event::Terminate(TerminateEvent {
                link: Some(link),
                with_error: false,
            }),
            Err(e) => failure(Some(link), e),
        }
    }
}

// Recovering State ============================================================

/// A `state` where the link is reset and the operator is asked to reconnect
/// the target. The presence of the device is polled until it is gone, then
/// until it is back.
///
///  * **[`ReconnectedEvent`] => [`ConnectingState`]** when the device is
///    present,
///  * **[`TerminateEvent`] => [`TerminatedState`]** on operator interrupt.
#[derive(Debug)]
pub(crate) struct RecoveringState {
    pub link: Option<Box<dyn Link>>,
    pub error: Error,
}
impl Runnable for RecoveringState {
    fn run(self, ctx: &mut SessionContext) -> Event {
        info!("=> Recovering from: {}", self.error);
        if let Some(mut link) = self.link {
            link.reset();
        }

        println!();
        println!(
            "[BP] ⚡ {} {}",
            style("Connection or protocol error:").red(),
            self.error
        );
        println!(
            "[BP] ⚡ {}",
            style("Remove power and USB serial. Reinsert serial first, then power").red()
        );

        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(120);
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(SPINNER_TICKS)
                .template("[BP] {spinner:.blue} {msg}"),
        );
        pb.set_message(format!(
            "⏳ Waiting for {} to be removed...",
            style(ctx.connector.name()).cyan()
        ));
        if !wait_for_presence(ctx, false) {
            pb.finish_with_message("❌ Waiting canceled");
            return failure(None, Error::Interrupted);
        }

        pb.set_message(format!(
            "⏳ Waiting for {} to be back...",
            style(ctx.connector.name()).cyan()
        ));
        if !wait_for_presence(ctx, true) {
            pb.finish_with_message("❌ Waiting canceled");
            return failure(None, Error::Interrupted);
        }

        pb.finish_with_message(format!(
            "👍 Serial port {} is ready",
            style(ctx.connector.name()).green()
        ));
        Event::Reconnected(ReconnectedEvent {})
    }
}

// Terminated State ============================================================

/// Reached when the session completes and is about to terminate (normally or
/// abnormally).
///
/// This state goes into a 2-phase execution. During the initial phase, it
/// resets the link if still open and says goodbye. It then triggers the
/// [`ExitEvent`] to cause the session state machine to exit its event loop.
#[derive(Debug)]
pub(crate) struct TerminatedState {
    pub link: Option<Box<dyn Link>>,
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_error: bool,
    /// When `true` instructs the session state machine to exit its event
    /// loop.
    pub should_exit: bool,
}
impl Runnable for TerminatedState {
    fn run(self, _ctx: &mut SessionContext) -> Event {
        info!(
            "=> Terminated with{}errors",
            if self.with_error { " " } else { " no " }
        );
        if let Some(mut link) = self.link {
            link.reset();
        }

        println!();
        println!("[BP] Bye 👋");

        Event::Exit(ExitEvent {
            with_error: self.with_error,
        })
    }
}

// =============================================================================
// Private stuff
// =============================================================================

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"];

/// Poll the presence of the device every `poll_interval` until it matches
/// `present`. Returns `false` when the operator interrupted the wait.
fn wait_for_presence(ctx: &SessionContext, present: bool) -> bool {
    loop {
        if ctx.shutdown.is_requested() {
            return false;
        }
        if ctx.connector.is_connected() == present {
            return true;
        }
        thread::sleep(ctx.settings.poll_interval);
    }
}

/// Classify an error caught at the session boundary into the event that
/// handles it.
fn failure(link: Option<Box<dyn Link>>, error: Error) -> Event {
    match error {
        Error::Interrupted => {
            info!("interrupted by the operator");
            Event::Terminate(TerminateEvent {
                link,
                with_error: false,
            })
        }
        e if e.is_recoverable() => Event::Recover(RecoverEvent { link, error: e }),
        e => {
            println!();
            println!("{}", style(format!("[BP] 💥 Unexpected error: {}", e)).red());
            let mut source = e.source();
            while let Some(cause) = source {
                println!("{}", style(format!("[BP]    caused by: {}", cause)).red());
                source = cause.source();
            }
            debug!("{:#?}", e);
            Event::Terminate(TerminateEvent {
                link,
                with_error: true,
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn interrupt_terminates_without_error() {
        match failure(None, Error::Interrupted) {
            Event::Terminate(ev) => assert!(!ev.with_error),
            event => panic!("unexpected {:?}", event),
        }
    }

    #[test]
    fn recoverable_errors_recover() {
        let errors = vec![
            Error::ProtocolViolation("bad ack"),
            Error::HandshakeTimeout(std::time::Duration::from_secs(10)),
            Error::LinkLost(io::ErrorKind::BrokenPipe.into()),
        ];
        for error in errors {
            assert!(matches!(failure(None, error), Event::Recover(_)));
        }
    }

    #[test]
    fn other_errors_are_fatal() {
        let error = Error::Image {
            path: "kernel8.img".into(),
            source: io::ErrorKind::NotFound.into(),
        };
        match failure(None, error) {
            Event::Terminate(ev) => assert!(ev.with_error),
            event => panic!("unexpected {:?}", event),
        }
    }
}
