//! Accounting of the bytes pushed to the target.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Bytes sent so far out of the image size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    sent: usize,
    total: usize,
    started: Instant,
}

impl TransferProgress {
    pub fn new(total: usize) -> Self {
        TransferProgress {
            sent: 0,
            total,
            started: Instant::now(),
        }
    }

    /// Account for `count` more bytes accepted by the link.
    ///
    /// Never goes past the total.
    pub fn advance(&mut self, count: usize) {
        self.sent = self.total.min(self.sent + count);
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.total - self.sent
    }

    pub fn is_complete(&self) -> bool {
        self.sent == self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Average throughput since the transfer started, in bytes per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.sent as f64 / secs
        } else {
            0.0
        }
    }
}

/// Receives the transfer progress after every write.
pub trait ProgressReport {
    fn report(&mut self, progress: &TransferProgress);

    fn finish(&mut self, _progress: &TransferProgress) {}
}

/// Renders the progress as a terminal progress bar.
impl ProgressReport for ProgressBar {
    fn report(&mut self, progress: &TransferProgress) {
        self.set_length(progress.total() as u64);
        self.set_position(progress.sent() as u64);
    }

    fn finish(&mut self, progress: &TransferProgress) {
        self.finish_with_message(format!(
            "{} bytes in {:.2?}",
            progress.sent(),
            progress.elapsed()
        ));
    }
}

/// A progress bar in the style of the other `bootpush` status lines.
pub(crate) fn push_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(concat!(
                "[BP] ⏩ Pushing [{elapsed_precise}] [{bar:40.cyan/blue}] ",
                "{bytes}/{total_bytes} {bytes_per_sec} ({eta}) {msg}"
            ))
            .progress_chars("=>-"),
    );
    pb
}
