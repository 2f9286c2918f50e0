//! Errors of the argument codec

/// Errors encountered while encoding or decoding AMQP 0-9-1 data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The input ended before the value was complete
    #[error("Unexpected end of input, {needed} more byte(s) needed")]
    UnexpectedEof {
        /// Number of missing bytes
        needed: usize,
    },

    /// A short string is not valid UTF-8
    #[error("Short string is not valid UTF-8")]
    InvalidUtf8,

    /// A short string is longer than its one byte length prefix allows
    #[error("Short string of {0} bytes exceeds 255 bytes")]
    ShortStringTooLong(usize),

    /// A value is too long for its four byte length prefix
    #[error("Length {0} does not fit in a 32-bit length prefix")]
    LengthOverflow(usize),

    /// A field value carries a type tag that is not known
    #[error("Unknown field value type tag {0:#04x}")]
    UnknownFieldType(u8),

    /// The (class id, method id) pair is not part of AMQP 0-9-1
    #[error("Unknown method (class {class_id}, method {method_id})")]
    UnknownMethod {
        /// Class id
        class_id: u16,
        /// Method id
        method_id: u16,
    },

    /// A content header names a class that does not carry content
    #[error("Unknown content class {0}")]
    UnknownContentClass(u16),

    /// Bytes are left over after all arguments of a method were read
    #[error("{0} trailing byte(s) after method arguments")]
    TrailingBytes(usize),
}
