//! `bootpush` push session.
//!
//! **Example** - Executing the state machine event loop:
//! ```no_run
//! use bootpush::{self as bp, Shutdown};
//!
//! let settings = bp::SettingsBuilder::new()
//!     .path("/dev/ttyUSB0")
//!     .image_path("kernel8.img")
//!     .finalize();
//! let shutdown = Shutdown::install().unwrap();
//! let mut session = bp::factory(settings, shutdown);
//! let status = session.run(); // status code returned after the `Exit` event
//! println!("status: {}", status);
//! std::process::exit(status.into());
//! ```

mod events;
mod state_machine;
mod states;

pub use state_machine::{factory, PushSession};
