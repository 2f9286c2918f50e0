use crate::connection;

/// Errors associated with a [`Channel`](super::Channel)
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The channel is closed, or is closing
    #[error("Channel is closed")]
    Closed,

    /// The broker closed the channel
    #[error("Channel closed by peer: {code} {text}")]
    Remote {
        /// Reply code, eg. 404 NOT_FOUND
        code: u16,
        /// Reply text
        text: String,
        /// Class of the method that caused the close
        class_id: u16,
        /// Method that caused the close
        method_id: u16,
    },

    /// The connection failed or was closed
    #[error(transparent)]
    Connection(#[from] connection::Error),

    /// Another call on this channel is still waiting for its reply
    #[error("A call is already waiting for its reply on this channel")]
    CallInProgress,

    /// Every channel id up to the negotiated channel-max is taken
    #[error("No channel id available")]
    NoChannelsAvailable,

    /// A content-carrying method was called without content
    #[error("{0} must be sent with content")]
    ContentRequired(&'static str),

    /// Content was given to a method that does not carry content
    #[error("{0} does not carry content")]
    UnexpectedContent(&'static str),

    /// A method or content header does not fit into one frame
    #[error("Frame of {size} bytes exceeds the negotiated frame-max of {max}")]
    FrameTooLarge {
        /// Size of the frame that would be sent
        size: usize,
        /// Negotiated frame-max
        max: usize,
    },

    /// Method arguments could not be encoded
    #[error(transparent)]
    Encode(#[from] amqp091_types::Error),
}
