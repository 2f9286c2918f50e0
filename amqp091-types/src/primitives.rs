//! Primitive AMQP 0-9-1 types

use std::{borrow::Borrow, fmt, ops::Deref};

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{get_bytes, get_u32, get_u8},
    Error,
};

/// Timestamp in seconds since the unix epoch
pub type Timestamp = u64;

/// A string of at most 255 bytes with a one byte length prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortString(String);

impl ShortString {
    /// Creates a new [`ShortString`]. The length is checked when it is encoded
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper
    pub fn into_string(self) -> String {
        self.0
    }

    pub(crate) fn decode(src: &mut Bytes) -> Result<Self, Error> {
        let len = get_u8(src)? as usize;
        let bytes = get_bytes(src, len)?;
        let value = std::str::from_utf8(&bytes).map_err(|_| Error::InvalidUtf8)?;
        Ok(Self(value.to_owned()))
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        let len = self.0.len();
        let len = u8::try_from(len).map_err(|_| Error::ShortStringTooLong(len))?;
        dst.put_u8(len);
        dst.put_slice(self.0.as_bytes());
        Ok(())
    }
}

impl Deref for ShortString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ShortString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ShortString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShortString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ShortString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for ShortString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ShortString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Opaque bytes with a four byte length prefix
///
/// Long strings are not required to be UTF-8; SASL responses for example are
/// arbitrary binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LongString(Bytes);

impl LongString {
    /// Borrows the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the wrapper
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Interprets the bytes as UTF-8
    pub fn to_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    /// Returns the number of bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn decode(src: &mut Bytes) -> Result<Self, Error> {
        let len = get_u32(src)? as usize;
        get_bytes(src, len).map(Self)
    }

    pub(crate) fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        let len = self.0.len();
        let len = u32::try_from(len).map_err(|_| Error::LengthOverflow(len))?;
        dst.put_u32(len);
        dst.put_slice(&self.0);
        Ok(())
    }
}

impl fmt::Display for LongString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for LongString {
    fn from(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for LongString {
    fn from(value: String) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<Vec<u8>> for LongString {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<&[u8]> for LongString {
    fn from(value: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for LongString {
    fn from(value: Bytes) -> Self {
        Self(value)
    }
}

/// A decimal value: `value * 10^-scale`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Decimal {
    /// Number of decimal digits
    pub scale: u8,

    /// Unscaled value
    pub value: u32,
}

impl Decimal {
    /// Creates a new [`Decimal`]
    pub fn new(scale: u8, value: u32) -> Self {
        Self { scale, value }
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::{LongString, ShortString};
    use crate::Error;

    #[test]
    fn short_string_over_255_bytes_is_rejected() {
        let long = ShortString::new("x".repeat(256));
        let mut dst = BytesMut::new();
        assert_eq!(long.encode(&mut dst), Err(Error::ShortStringTooLong(256)));
    }

    #[test]
    fn short_string_must_be_utf8() {
        let mut src = Bytes::from_static(&[0x02, 0xff, 0xfe]);
        assert_eq!(ShortString::decode(&mut src), Err(Error::InvalidUtf8));
    }

    #[test]
    fn long_string_keeps_binary() {
        let value = LongString::from(&b"\0guest\0guest"[..]);
        let mut dst = BytesMut::new();
        value.encode(&mut dst).unwrap();
        assert_eq!(&dst[..4], &[0, 0, 0, 12]);

        let mut src = dst.freeze();
        assert_eq!(LongString::decode(&mut src).unwrap(), value);
        assert!(src.is_empty());
    }
}
