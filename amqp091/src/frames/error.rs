use std::io;

use amqp091_types::MethodId;

/// Violations of the frame layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The octet after the payload is not the frame-end sentinel
    #[error("Frame end octet is {0:#04x}, expecting 0xce")]
    FrameEndMismatch(u8),

    /// Frame type is not method, header, body or heartbeat
    #[error("Unknown frame type {0}")]
    UnknownFrameType(u8),

    /// A frame is larger than the negotiated frame-max
    #[error("Frame of {size} bytes exceeds frame-max {max}")]
    FrameTooLarge {
        /// Size of the whole frame
        size: usize,
        /// Negotiated frame-max
        max: usize,
    },

    /// Heartbeats are only allowed on channel 0
    #[error("Heartbeat frame on channel {0}")]
    HeartbeatOnChannel(u16),

    /// Heartbeat frames carry no payload
    #[error("Heartbeat frame with a {0} byte payload")]
    HeartbeatWithPayload(usize),

    /// The peer answered with its own protocol header, ie. it does not speak
    /// AMQP 0-9-1
    #[error("Peer answered with protocol header {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),

    /// A method or content header payload is malformed
    #[error("Malformed payload of {method:?}: {source}")]
    Decode {
        /// The method, if the payload got that far
        method: Option<MethodId>,
        /// Codec error
        source: amqp091_types::Error,
    },

    /// A method or header could not be encoded
    #[error(transparent)]
    Encode(amqp091_types::Error),
}

/// Errors of the [`FrameCodec`](super::FrameCodec)
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// Framing error
    #[error(transparent)]
    Framing(#[from] FrameError),
}
