//! Bootpush is a utility to simplify kernel development for custom boards by
//! pushing a raw binary image to a chainloader over the serial port
//! connection, then staying connected as a serial console. This is a simple
//! and fast process for rapid iteration over the kernel development and
//! testing.
//!
//! The approach is the one of
//! [`raspbootin`](https://github.com/mrvn/raspbootin) and of the `minipush`
//! tool in
//! [`rust-embedded`](https://github.com/rust-embedded/rust-raspberrypi-OS-tutorials):
//!
//! 1. the target prints its boot log and, when ready, sends `0x03` three
//!    times,
//! 2. `bootpush` sends the image size as 4 bytes, lowest order first, and
//!    waits for `OK`,
//! 3. `bootpush` sends the image in segments of 512 bytes,
//! 4. the link is used as an interactive terminal.
//!
//! Any link, protocol or timeout error restarts the whole sequence once the
//! target has been reconnected.
//!
//! The session is implemented as a state machine, in terms of **states** and
//! **transitions** between them with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed (the open link,
//!   the image being pushed).
//! * It is possible to have some shared data between **all** states.
//! * Transitions between states are triggered via typed **events** and follow
//!   defined semantics.
//! * Only explicitly defined transitions should be permitted and as many errors
//!   should be detected at **compile-time**.
//! * Transitioning from one state to another consumes the original state and
//!   renders it unusable. Any transition back to that state would create a new
//!   state.
//! * Data can be transferred from one state to the next by attaching it to the
//!   transition event. Such data is statically defined as part of the event
//!   type.
//!
//! The implementation of state transitions leverages `rust`'s `From` and `Into`
//! pattern. The `From` trait allows for a type to define how to create itself
//! from another type, hence providing us an intuitive and simple mechanism for
//! converting `events` into new `states`. Only transitions for which the
//! `From` trait is implemented are authorized and any other transition would
//! be detected at compile-time as an error.

mod error;
mod image;
mod link;
mod push_protocol;
mod session;
mod settings;
mod shutdown;
mod terminal;

pub use error::{Error, Result};
pub use image::BinaryImage;
pub use link::{Connector, Link, SerialConnector, SerialLink};
pub use push_protocol::{
    negotiate_size, transmit, wait_for_readiness, ProgressReport, TransferProgress, ACK,
    READINESS_TOKEN, SEGMENT_SIZE,
};
pub use session::{factory, PushSession};
pub use settings::{Settings, SettingsBuilder};
pub use shutdown::Shutdown;
pub use terminal::{ConsoleTerminal, Terminal};
