//! Protocol constants

/// Protocol header sent by the client before any frame
pub const PROTOCOL_HEADER: [u8; 8] = *b"AMQP\x00\x00\x09\x01";

/// Major protocol version
pub const VERSION_MAJOR: u8 = 0;

/// Minor protocol version
pub const VERSION_MINOR: u8 = 9;

/// Frame type of a method frame
pub const FRAME_METHOD: u8 = 1;

/// Frame type of a content header frame
pub const FRAME_HEADER: u8 = 2;

/// Frame type of a content body frame
pub const FRAME_BODY: u8 = 3;

/// Frame type of a heartbeat frame
pub const FRAME_HEARTBEAT: u8 = 8;

/// Sentinel octet terminating every frame
pub const FRAME_END: u8 = 0xCE;

/// Size of the frame header (type, channel, size)
pub const FRAME_HEADER_SIZE: usize = 7;

/// Bytes a frame adds around its payload (header and end octet)
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + 1;

/// Size of the content header fields ahead of the property flags (class,
/// weight, body size)
pub const CONTENT_HEADER_PREFIX_SIZE: usize = 12;

/// Smallest frame-max a peer may negotiate
pub const FRAME_MIN_SIZE: u32 = 4096;

/// Reply code of a normal shutdown
pub const REPLY_SUCCESS: u16 = 200;

/// Soft error: content too large
pub const CONTENT_TOO_LARGE: u16 = 311;

/// Soft error: no route
pub const NO_ROUTE: u16 = 312;

/// Soft error: no consumers
pub const NO_CONSUMERS: u16 = 313;

/// Hard error: the operator forced the connection closed
pub const CONNECTION_FORCED: u16 = 320;

/// Hard error: invalid path (vhost)
pub const INVALID_PATH: u16 = 402;

/// Soft error: access refused
pub const ACCESS_REFUSED: u16 = 403;

/// Soft error: not found
pub const NOT_FOUND: u16 = 404;

/// Soft error: resource locked
pub const RESOURCE_LOCKED: u16 = 405;

/// Soft error: precondition failed
pub const PRECONDITION_FAILED: u16 = 406;

/// Hard error: malformed frame
pub const FRAME_ERROR: u16 = 501;

/// Hard error: illegal argument values
pub const SYNTAX_ERROR: u16 = 502;

/// Hard error: invalid method sequence
pub const COMMAND_INVALID: u16 = 503;

/// Hard error: invalid channel
pub const CHANNEL_ERROR: u16 = 504;

/// Hard error: unexpected frame
pub const UNEXPECTED_FRAME: u16 = 505;

/// Hard error: resource error
pub const RESOURCE_ERROR: u16 = 506;

/// Hard error: not allowed
pub const NOT_ALLOWED: u16 = 530;

/// Hard error: not implemented
pub const NOT_IMPLEMENTED: u16 = 540;

/// Hard error: internal error
pub const INTERNAL_ERROR: u16 = 541;
