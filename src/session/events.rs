//! Events for the `bootpush` session state machine.
//!
//! This module is private and restricted to the [`session`](crate::session)
//! scope. The public interface of the state machine is provided by
//! [`session`](crate::session).
//!
//! ```ignore
//! use super::events::*;
//! ```
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::error::Error;
use crate::image::BinaryImage;
use crate::link::Link;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// LinkOpenedEvent =============================================================

/// Event fired from the `Connecting` state once the serial port is open and
/// configured. Triggers the transition to `AwaitingReadiness`.
#[derive(Debug)]
pub(crate) struct LinkOpenedEvent {
    /// The link to be used in the next state. Consumed and moved to the next
    /// state.
    pub link: Box<dyn Link>,
}

// TargetReadyEvent ============================================================

/// Event fired from the `AwaitingReadiness` state when the target requested
/// the image and the image was loaded from disk. Triggers the transition to
/// `NegotiatingSize`.
#[derive(Debug)]
pub(crate) struct TargetReadyEvent {
    pub link: Box<dyn Link>,
    /// Freshly loaded for this attempt.
    pub image: BinaryImage,
}

// SizeAcceptedEvent ===========================================================

/// Event fired from the `NegotiatingSize` state when the target confirmed
/// the image size. Triggers the transition to `Transmitting`.
#[derive(Debug)]
pub(crate) struct SizeAcceptedEvent {
    pub link: Box<dyn Link>,
    pub image: BinaryImage,
}

// ImagePushedEvent ============================================================

/// Event fired from the `Transmitting` state once the whole image was
/// written. Triggers the transition to `InteractivePassthrough`. The image is
/// dropped here.
#[derive(Debug)]
pub(crate) struct ImagePushedEvent {
    pub link: Box<dyn Link>,
}

// RecoverEvent ================================================================

/// Event fired when a recoverable error occurs in any state between
/// `Connecting` and `InteractivePassthrough`. Triggers the transition to
/// `Recovering`.
#[derive(Debug)]
pub(crate) struct RecoverEvent {
    /// The link, if it was open when the error occurred. It will be reset.
    pub link: Option<Box<dyn Link>>,
    pub error: Error,
}

// ReconnectedEvent ============================================================

/// Event fired from the `Recovering` state once the device is present again.
/// Triggers the transition back to `Connecting`, restarting the whole
/// sequence.
#[derive(Debug)]
pub(crate) struct ReconnectedEvent {}

// TerminateEvent ==============================================================

/// Event fired when the session is over: the operator ended the interactive
/// session or interrupted `bootpush`, or an unrecoverable error occurred.
/// Triggers the transition to `Terminated`.
#[derive(Debug)]
pub(crate) struct TerminateEvent {
    /// Reset as part of the cleanup, when still open.
    pub link: Option<Box<dyn Link>>,
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_error: bool,
}

// ExitEvent ===================================================================

/// The last event that can be triggered in the session state machine. It
/// results in the event loop terminating with an `exit status`.
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub with_error: bool,
}

// Events enum =================================================================

/// Events that can be triggered within the session state machine.
///
/// Each possible value holds an `event`, which in turn may hold additional data
/// for the state transition. Such data is passed by the origin state for
/// potential use by the target state.
#[derive(Debug)]
pub(crate) enum Event {
    LinkOpened(LinkOpenedEvent),
    TargetReady(TargetReadyEvent),
    SizeAccepted(SizeAcceptedEvent),
    ImagePushed(ImagePushedEvent),
    Recover(RecoverEvent),
    Reconnected(ReconnectedEvent),
    Terminate(TerminateEvent),
    Exit(ExitEvent),
}
