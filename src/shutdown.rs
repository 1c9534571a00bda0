//! Process-wide shutdown request.
//!
//! A single `Ctrl+C` handler is installed for the whole process, also
//! catching `SIGTERM` and `SIGHUP` on unix. It does not exit by itself: it
//! raises a flag that every blocking loop of the session checks, so that the
//! session always goes through its cleanup before the process terminates.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cloneable handle on the shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    /// A flag that is only raised through [`Shutdown::request`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the process `Ctrl+C` handler and return the flag it raises.
    ///
    /// Can only be called once per process.
    pub fn install() -> Result<Self, ctrlc::Error> {
        let shutdown = Self::new();
        let handle = shutdown.clone();
        ctrlc::set_handler(move || {
            println!("\n🛑 received Ctrl+C!");
            handle.request();
        })?;
        Ok(shutdown)
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();
        assert!(!other.is_requested());

        shutdown.request();
        assert!(other.is_requested());
    }

    #[cfg(unix)]
    #[test]
    fn termination_signal_raises_the_flag() {
        use std::{process::Command, thread, time::Duration};

        let shutdown = Shutdown::install().unwrap();
        let pid = std::process::id().to_string();
        let status = Command::new("kill")
            .args(&["-TERM", pid.as_str()])
            .status()
            .unwrap();
        assert!(status.success());

        for _ in 0..100 {
            if shutdown.is_requested() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("SIGTERM did not raise the shutdown flag");
    }
}
