use std::io;

use crate::frames::{self, FrameError};

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// Nothing was received within the idle timeout
    #[error("Idle timeout")]
    IdleTimeout,

    /// Framing error
    #[error(transparent)]
    Framing(#[from] FrameError),
}

impl From<frames::Error> for Error {
    fn from(err: frames::Error) -> Self {
        match err {
            frames::Error::Io(e) => Self::Io(e),
            frames::Error::Framing(e) => Self::Framing(e),
        }
    }
}
