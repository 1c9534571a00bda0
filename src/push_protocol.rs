//! `bootpush` serial push protocol.
//!
//! The target drives the exchange:
//!
//! ```text
//!   target                                host
//!     |  boot log ... 0x03 0x03 0x03        |   readiness
//!     |------------------------------------>|
//!     |  image size, u32 little endian      |   size negotiation
//!     |<------------------------------------|
//!     |  'O' 'K'                            |
//!     |------------------------------------>|
//!     |  image, segments of 512 bytes max   |   transfer
//!     |<------------------------------------|
//! ```
//!
//! Nothing is acknowledged after the `OK`. Each step is a plain function
//! over a [`Link`](crate::link::Link) so the session controller can run them
//! one state at a time.
//!
//! **Example** - Pushing an image over an already open link:
//! ```ignore
//! wait_for_readiness(&mut *link, &mut io::stdout(), budget, 4096)?;
//! let image = BinaryImage::load("kernel8.img")?;
//! negotiate_size(&mut *link, image.size())?;
//! transmit(&mut *link, &image, SEGMENT_SIZE, &mut reporter)?;
//! ```

mod negotiate;
mod progress;
mod readiness;
mod transmit;

pub use negotiate::{negotiate_size, ACK};
pub use progress::{ProgressReport, TransferProgress};
pub(crate) use progress::push_progress_bar;
pub use readiness::{wait_for_readiness, READINESS_TOKEN};
pub use transmit::{transmit, SEGMENT_SIZE};
