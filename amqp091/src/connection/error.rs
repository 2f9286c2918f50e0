use std::{io, sync::Arc};

use amqp091_types::MethodId;

use crate::{auth, frames::FrameError, transport};

/// Errors that end a connection
///
/// The error is cloned to every channel and every call that was waiting when
/// the connection went down.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(Arc<io::Error>),

    /// The peer sent bytes that are not a valid frame
    #[error(transparent)]
    Framing(FrameError),

    /// The peer sent a valid frame at the wrong time
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Nothing was heard from the peer for two heartbeat intervals
    #[error("Missed heartbeats from the peer")]
    MissedHeartbeat,

    /// The peer did not answer `connection.close`
    #[error("Timed out waiting for connection.close-ok")]
    CloseTimeout,

    /// The broker closed the connection
    #[error("Connection closed by peer: {code} {text}")]
    Remote {
        /// Reply code, eg. 320 CONNECTION_FORCED
        code: u16,
        /// Reply text
        text: String,
    },

    /// The connection is closed
    #[error("Connection is closed")]
    Closed,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Io(e) => Self::Io(Arc::new(e)),
            transport::Error::IdleTimeout => Self::MissedHeartbeat,
            transport::Error::Framing(e) => Self::Framing(e),
        }
    }
}

/// Frames that are well formed but violate the protocol state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A method arrived that does not answer the pending call
    #[error("Unexpected method {found} on channel {channel}, expecting one of {expected:?}")]
    UnexpectedMethod {
        /// Channel the method arrived on
        channel: u16,
        /// Replies the pending call accepts
        expected: &'static [MethodId],
        /// Method that arrived
        found: MethodId,
    },

    /// A frame of the wrong type arrived, eg. a body frame without a header
    #[error("Unexpected {kind} frame on channel {channel}")]
    UnexpectedFrame {
        /// Channel the frame arrived on
        channel: u16,
        /// Frame type
        kind: &'static str,
    },

    /// Body frames carried more bytes than the content header announced
    #[error("Body on channel {channel} is {received} bytes, header announced {declared}")]
    BodyOverflow {
        /// Channel the content arrived on
        channel: u16,
        /// Body size from the content header
        declared: u64,
        /// Bytes received so far
        received: u64,
    },
}

/// Errors while opening a connection
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// Url parse error
    #[error(transparent)]
    UrlError(#[from] url::ParseError),

    /// Only `amqp` urls are supported
    #[error("Invalid scheme {0:?}, expecting \"amqp\"")]
    InvalidScheme(String),

    /// The peer answered the protocol header with a different one
    #[error("Protocol header mismatch, peer answered {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),

    /// `connection.start` announced a version other than 0-9
    #[error("Unsupported protocol version {major}-{minor}")]
    UnsupportedVersion {
        /// Major version announced by the broker
        major: u8,
        /// Minor version announced by the broker
        minor: u8,
    },

    /// None of the configured SASL mechanisms is offered by the broker
    #[error("No common SASL mechanism, broker offers {offered:?}")]
    NoCommonMechanism {
        /// Mechanisms the broker offered
        offered: String,
    },

    /// The SASL exchange failed
    #[error(transparent)]
    Sasl(#[from] auth::Error),

    /// The handshake got a frame it did not expect
    #[error("Expecting {expected}, found {found}")]
    UnexpectedFrame {
        /// What the handshake waited for
        expected: &'static str,
        /// What arrived instead
        found: String,
    },

    /// The peer sent bytes that are not a valid frame
    #[error(transparent)]
    Framing(FrameError),

    /// The broker refused the connection, eg. 403 ACCESS_REFUSED
    #[error("Connection refused by peer: {code} {text}")]
    Remote {
        /// Reply code
        code: u16,
        /// Reply text
        text: String,
    },

    /// The handshake did not complete in time
    #[error("Handshake timed out")]
    Timeout,
}

impl From<transport::Error> for OpenError {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Io(e) => Self::Io(e),
            transport::Error::IdleTimeout => Self::Timeout,
            transport::Error::Framing(FrameError::ProtocolHeaderMismatch(header)) => {
                Self::ProtocolHeaderMismatch(header)
            }
            transport::Error::Framing(e) => Self::Framing(e),
        }
    }
}
