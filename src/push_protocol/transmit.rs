//! Streaming of the image to the target.

use std::io;

use log::trace;

use super::progress::{ProgressReport, TransferProgress};
use crate::error::Result;
use crate::image::BinaryImage;
use crate::link::Link;

/// Maximum number of bytes written in one go.
pub const SEGMENT_SIZE: usize = 512;

/// Write the whole image to the link in segments of at most `segment_size`
/// bytes.
///
/// The cursor only advances by what the link reports as accepted, so a
/// partial write is simply continued by the next segment. `reporter` gets the
/// progress after every write.
pub fn transmit(
    link: &mut dyn Link,
    image: &BinaryImage,
    segment_size: usize,
    reporter: &mut dyn ProgressReport,
) -> Result<TransferProgress> {
    let data = image.as_bytes();
    let mut progress = TransferProgress::new(data.len());

    while !progress.is_complete() {
        let cursor = progress.sent();
        let len = segment_size.min(progress.remaining());
        let accepted = link.write(&data[cursor..cursor + len])?;
        trace!("{} of {} bytes accepted at offset {}", accepted, len, cursor);
        if accepted == 0 {
            let err = io::Error::new(io::ErrorKind::WriteZero, "link did not accept any byte");
            return Err(err.into());
        }
        progress.advance(accepted);
        reporter.report(&progress);
    }
    reporter.finish(&progress);

    Ok(progress)
}
