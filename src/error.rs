//! Errors raised while pushing an image to the target.
//!
//! The session controller is the only place where these errors are caught.
//! It uses [`Error::is_recoverable`] to decide between restarting the whole
//! push sequence and terminating.

use std::{io, time::Duration};

/// Alias for `Result<T, bootpush::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the push protocol and its collaborators.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The target sent malformed or unexpected handshake data.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The serial link failed, reached end of stream or could not be opened.
    #[error("serial link lost: {0}")]
    LinkLost(#[source] io::Error),

    /// The readiness token was not received within the budget, counted from
    /// the first byte received.
    #[error("target did not request the image within {0:?}")]
    HandshakeTimeout(Duration),

    /// The operator asked to quit.
    #[error("interrupted by the operator")]
    Interrupted,

    /// The binary image could not be read from disk.
    #[error("could not read image `{path}`: {source}")]
    Image {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The binary image does not fit in the 32-bit size field.
    #[error("image `{path}` is too big ({size} bytes, max is 4294967295)")]
    ImageTooLarge { path: String, size: u64 },

    /// Anything else.
    #[error("{0}")]
    Unexpected(String),
}

impl Error {
    /// Recoverable errors restart the push sequence after the link has been
    /// re-established; anything else ends the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ProtocolViolation(_) | Error::LinkLost(_) | Error::HandshakeTimeout(_)
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Interrupted => Error::Interrupted,
            _ => Error::LinkLost(err),
        }
    }
}

/// Failures of the local console are not link failures: they end the
/// session.
pub(crate) fn console_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Unexpected(format!("console error: {}", e))
}
