//! Argument codec shared by method frames and content headers
//!
//! Integers are big-endian, short strings carry a one byte length prefix,
//! long strings and tables a four byte one. Consecutive `bit` arguments are
//! packed into a single octet, least significant bit first.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    primitives::{LongString, ShortString},
    table::FieldTable,
    Error,
};

#[inline]
pub(crate) fn ensure(src: &Bytes, len: usize) -> Result<(), Error> {
    match src.remaining() < len {
        true => Err(Error::UnexpectedEof {
            needed: len - src.remaining(),
        }),
        false => Ok(()),
    }
}

macro_rules! checked_get {
    ($($name:ident => $ty:ty, $get:ident;)*) => {
        $(
            /// Reads one value, failing instead of panicking on short input
            #[inline]
            pub fn $name(src: &mut Bytes) -> Result<$ty, Error> {
                ensure(src, std::mem::size_of::<$ty>())?;
                Ok(src.$get())
            }
        )*
    };
}

checked_get! {
    get_u8 => u8, get_u8;
    get_i8 => i8, get_i8;
    get_u16 => u16, get_u16;
    get_i16 => i16, get_i16;
    get_u32 => u32, get_u32;
    get_i32 => i32, get_i32;
    get_u64 => u64, get_u64;
    get_i64 => i64, get_i64;
    get_f32 => f32, get_f32;
    get_f64 => f64, get_f64;
}

/// Splits off `len` bytes without copying
pub fn get_bytes(src: &mut Bytes, len: usize) -> Result<Bytes, Error> {
    ensure(src, len)?;
    Ok(src.split_to(len))
}

/// Writes a four byte length prefix followed by whatever `f` writes, patching
/// the prefix once the length is known
pub(crate) fn put_length_prefixed<F>(dst: &mut BytesMut, f: F) -> Result<(), Error>
where
    F: FnOnce(&mut BytesMut) -> Result<(), Error>,
{
    let start = dst.len();
    dst.put_u32(0);
    f(dst)?;
    let len = dst.len() - start - 4;
    let len = u32::try_from(len).map_err(|_| Error::LengthOverflow(len))?;
    dst[start..start + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Sequential reader of method arguments
#[derive(Debug)]
pub struct ArgReader<'a> {
    src: &'a mut Bytes,
    bit_octet: u8,
    // 8 means no packed octet is loaded
    bit_offset: u8,
}

impl<'a> ArgReader<'a> {
    /// Creates a reader over the argument bytes
    pub fn new(src: &'a mut Bytes) -> Self {
        Self {
            src,
            bit_octet: 0,
            bit_offset: 8,
        }
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.src.remaining()
    }

    /// Reads one packed bit
    pub fn read_bit(&mut self) -> Result<bool, Error> {
        if self.bit_offset >= 8 {
            self.bit_octet = get_u8(self.src)?;
            self.bit_offset = 0;
        }
        let bit = (self.bit_octet >> self.bit_offset) & 1 == 1;
        self.bit_offset += 1;
        Ok(bit)
    }

    /// Gives access to the underlying bytes for a non-bit argument
    pub fn bytes(&mut self) -> &mut Bytes {
        self.bit_offset = 8;
        &mut *self.src
    }
}

/// Sequential writer of method arguments
#[derive(Debug)]
pub struct ArgWriter<'a> {
    dst: &'a mut BytesMut,
    bits: u8,
    bit_count: u8,
}

impl<'a> ArgWriter<'a> {
    /// Creates a writer appending to `dst`
    pub fn new(dst: &'a mut BytesMut) -> Self {
        Self {
            dst,
            bits: 0,
            bit_count: 0,
        }
    }

    /// Packs one bit, emitting the octet once eight bits are collected
    pub fn write_bit(&mut self, bit: bool) {
        self.bits |= (bit as u8) << self.bit_count;
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.flush_bits();
        }
    }

    /// Gives access to the underlying buffer for a non-bit argument
    pub fn bytes(&mut self) -> &mut BytesMut {
        self.flush_bits();
        &mut *self.dst
    }

    /// Emits any partially filled bit octet
    pub fn finish(mut self) {
        self.flush_bits();
    }

    fn flush_bits(&mut self) {
        if self.bit_count > 0 {
            self.dst.put_u8(self.bits);
            self.bits = 0;
            self.bit_count = 0;
        }
    }
}

/// A value that can appear in a method argument list
pub trait Argument: Sized {
    /// Reads the argument
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, Error>;

    /// Writes the argument
    fn write_arg(&self, writer: &mut ArgWriter<'_>) -> Result<(), Error>;
}

macro_rules! impl_argument_for_int {
    ($($ty:ty => $get:ident, $put:ident;)*) => {
        $(
            impl Argument for $ty {
                fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, Error> {
                    $get(reader.bytes())
                }

                fn write_arg(&self, writer: &mut ArgWriter<'_>) -> Result<(), Error> {
                    writer.bytes().$put(*self);
                    Ok(())
                }
            }
        )*
    };
}

impl_argument_for_int! {
    u8 => get_u8, put_u8;
    u16 => get_u16, put_u16;
    u32 => get_u32, put_u32;
    u64 => get_u64, put_u64;
}

impl Argument for bool {
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, Error> {
        reader.read_bit()
    }

    fn write_arg(&self, writer: &mut ArgWriter<'_>) -> Result<(), Error> {
        writer.write_bit(*self);
        Ok(())
    }
}

impl Argument for ShortString {
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, Error> {
        ShortString::decode(reader.bytes())
    }

    fn write_arg(&self, writer: &mut ArgWriter<'_>) -> Result<(), Error> {
        self.encode(writer.bytes())
    }
}

impl Argument for LongString {
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, Error> {
        LongString::decode(reader.bytes())
    }

    fn write_arg(&self, writer: &mut ArgWriter<'_>) -> Result<(), Error> {
        self.encode(writer.bytes())
    }
}

impl Argument for FieldTable {
    fn read_arg(reader: &mut ArgReader<'_>) -> Result<Self, Error> {
        FieldTable::decode(reader.bytes())
    }

    fn write_arg(&self, writer: &mut ArgWriter<'_>) -> Result<(), Error> {
        self.encode(writer.bytes())
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::{ArgReader, ArgWriter, Argument};
    use crate::{Error, ShortString};

    #[test]
    fn consecutive_bits_share_one_octet() {
        let mut dst = BytesMut::new();
        let mut writer = ArgWriter::new(&mut dst);
        true.write_arg(&mut writer).unwrap();
        false.write_arg(&mut writer).unwrap();
        true.write_arg(&mut writer).unwrap();
        7u16.write_arg(&mut writer).unwrap();
        true.write_arg(&mut writer).unwrap();
        writer.finish();

        assert_eq!(&dst[..], &[0b101, 0x00, 0x07, 0b1]);

        let mut src = dst.freeze();
        let mut reader = ArgReader::new(&mut src);
        assert!(bool::read_arg(&mut reader).unwrap());
        assert!(!bool::read_arg(&mut reader).unwrap());
        assert!(bool::read_arg(&mut reader).unwrap());
        assert_eq!(u16::read_arg(&mut reader).unwrap(), 7);
        assert!(bool::read_arg(&mut reader).unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn nine_bits_spill_into_a_second_octet() {
        let mut dst = BytesMut::new();
        let mut writer = ArgWriter::new(&mut dst);
        for _ in 0..9 {
            true.write_arg(&mut writer).unwrap();
        }
        writer.finish();
        assert_eq!(&dst[..], &[0xFF, 0x01]);
    }

    #[test]
    fn short_input_is_an_error_not_a_panic() {
        let mut src = Bytes::from_static(&[0x00]);
        let mut reader = ArgReader::new(&mut src);
        assert_eq!(
            u32::read_arg(&mut reader),
            Err(Error::UnexpectedEof { needed: 3 })
        );

        let mut src = Bytes::from_static(&[0x05, b'a', b'b']);
        let mut reader = ArgReader::new(&mut src);
        assert!(matches!(
            ShortString::read_arg(&mut reader),
            Err(Error::UnexpectedEof { .. })
        ));
    }
}
