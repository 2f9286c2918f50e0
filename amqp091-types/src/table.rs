//! Field tables and field values

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{self, get_bytes, put_length_prefixed},
    primitives::{Decimal, LongString, ShortString, Timestamp},
    Error,
};

/// A typed value inside a [`FieldTable`] or a field array
///
/// The type tags follow the table shared by RabbitMQ and most brokers.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `t`
    Bool(bool),
    /// `b`
    I8(i8),
    /// `B`
    U8(u8),
    /// `s`
    I16(i16),
    /// `u`
    U16(u16),
    /// `I`
    I32(i32),
    /// `i`
    U32(u32),
    /// `l`
    I64(i64),
    /// `f`
    F32(f32),
    /// `d`
    F64(f64),
    /// `D`
    Decimal(Decimal),
    /// `S`
    LongString(LongString),
    /// `x`
    ByteArray(Bytes),
    /// `A`
    Array(Vec<FieldValue>),
    /// `T`
    Timestamp(Timestamp),
    /// `F`
    Table(FieldTable),
    /// `V`
    Void,
}

impl FieldValue {
    /// The one byte type tag of this value
    pub fn tag(&self) -> u8 {
        match self {
            FieldValue::Bool(_) => b't',
            FieldValue::I8(_) => b'b',
            FieldValue::U8(_) => b'B',
            FieldValue::I16(_) => b's',
            FieldValue::U16(_) => b'u',
            FieldValue::I32(_) => b'I',
            FieldValue::U32(_) => b'i',
            FieldValue::I64(_) => b'l',
            FieldValue::F32(_) => b'f',
            FieldValue::F64(_) => b'd',
            FieldValue::Decimal(_) => b'D',
            FieldValue::LongString(_) => b'S',
            FieldValue::ByteArray(_) => b'x',
            FieldValue::Array(_) => b'A',
            FieldValue::Timestamp(_) => b'T',
            FieldValue::Table(_) => b'F',
            FieldValue::Void => b'V',
        }
    }

    /// Decodes a tagged value
    pub fn decode(src: &mut Bytes) -> Result<Self, Error> {
        let value = match codec::get_u8(src)? {
            b't' => FieldValue::Bool(codec::get_u8(src)? != 0),
            b'b' => FieldValue::I8(codec::get_i8(src)?),
            b'B' => FieldValue::U8(codec::get_u8(src)?),
            b's' => FieldValue::I16(codec::get_i16(src)?),
            b'u' => FieldValue::U16(codec::get_u16(src)?),
            b'I' => FieldValue::I32(codec::get_i32(src)?),
            b'i' => FieldValue::U32(codec::get_u32(src)?),
            b'l' => FieldValue::I64(codec::get_i64(src)?),
            b'f' => FieldValue::F32(codec::get_f32(src)?),
            b'd' => FieldValue::F64(codec::get_f64(src)?),
            b'D' => {
                let scale = codec::get_u8(src)?;
                let value = codec::get_u32(src)?;
                FieldValue::Decimal(Decimal { scale, value })
            }
            b'S' => FieldValue::LongString(LongString::decode(src)?),
            b'x' => {
                let len = codec::get_u32(src)? as usize;
                FieldValue::ByteArray(get_bytes(src, len)?)
            }
            b'A' => {
                let len = codec::get_u32(src)? as usize;
                let mut items = get_bytes(src, len)?;
                let mut array = Vec::new();
                while !items.is_empty() {
                    array.push(FieldValue::decode(&mut items)?);
                }
                FieldValue::Array(array)
            }
            b'T' => FieldValue::Timestamp(codec::get_u64(src)?),
            b'F' => FieldValue::Table(FieldTable::decode(src)?),
            b'V' => FieldValue::Void,
            tag => return Err(Error::UnknownFieldType(tag)),
        };
        Ok(value)
    }

    /// Encodes the value with its type tag
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u8(self.tag());
        match self {
            FieldValue::Bool(v) => dst.put_u8(*v as u8),
            FieldValue::I8(v) => dst.put_i8(*v),
            FieldValue::U8(v) => dst.put_u8(*v),
            FieldValue::I16(v) => dst.put_i16(*v),
            FieldValue::U16(v) => dst.put_u16(*v),
            FieldValue::I32(v) => dst.put_i32(*v),
            FieldValue::U32(v) => dst.put_u32(*v),
            FieldValue::I64(v) => dst.put_i64(*v),
            FieldValue::F32(v) => dst.put_f32(*v),
            FieldValue::F64(v) => dst.put_f64(*v),
            FieldValue::Decimal(Decimal { scale, value }) => {
                dst.put_u8(*scale);
                dst.put_u32(*value);
            }
            FieldValue::LongString(v) => v.encode(dst)?,
            FieldValue::ByteArray(v) => put_length_prefixed(dst, |dst| {
                dst.put_slice(v);
                Ok(())
            })?,
            FieldValue::Array(items) => put_length_prefixed(dst, |dst| {
                items.iter().try_for_each(|item| item.encode(dst))
            })?,
            FieldValue::Timestamp(v) => dst.put_u64(*v),
            FieldValue::Table(table) => table.encode(dst)?,
            FieldValue::Void => {}
        }
        Ok(())
    }
}

macro_rules! impl_from_for_field_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_field_value! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    LongString => LongString,
    Vec<FieldValue> => Array,
    FieldTable => Table,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::LongString(value.into())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::LongString(value.into())
    }
}

/// An ordered map from short string keys to [`FieldValue`]s
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTable(BTreeMap<ShortString, FieldValue>);

impl FieldTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a value, returning the previous value under the same key
    pub fn insert(
        &mut self,
        key: impl Into<ShortString>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Looks up a value by key
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Removes a value by key
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.remove(key)
    }

    /// Returns true if the key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&ShortString, &FieldValue)> {
        self.0.iter()
    }

    /// Decodes a length-prefixed table
    pub fn decode(src: &mut Bytes) -> Result<Self, Error> {
        let len = codec::get_u32(src)? as usize;
        let entries = get_bytes(src, len)?;
        Self::decode_entries(entries)
    }

    /// Decodes table entries that are not preceded by a length prefix
    pub fn decode_entries(mut entries: Bytes) -> Result<Self, Error> {
        let mut map = BTreeMap::new();
        while !entries.is_empty() {
            let key = ShortString::decode(&mut entries)?;
            let value = FieldValue::decode(&mut entries)?;
            map.insert(key, value);
        }
        Ok(Self(map))
    }

    /// Encodes the table with its length prefix
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        put_length_prefixed(dst, |dst| self.encode_entries(dst))
    }

    /// Encodes only the entries, without the length prefix
    pub fn encode_entries(&self, dst: &mut BytesMut) -> Result<(), Error> {
        for (key, value) in &self.0 {
            key.encode(dst)?;
            value.encode(dst)?;
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for FieldTable
where
    K: Into<ShortString>,
    V: Into<FieldValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for FieldTable {
    type Item = (ShortString, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<ShortString, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::{FieldTable, FieldValue};
    use crate::{Decimal, Error};

    #[test]
    fn nested_table_survives_the_wire() {
        let mut capabilities = FieldTable::new();
        capabilities.insert("publisher_confirms", true);
        capabilities.insert("basic.nack", true);

        let mut table = FieldTable::new();
        table.insert("product", "amqp091");
        table.insert("capabilities", capabilities);
        table.insert("x-max-priority", 10u8);
        table.insert("x-message-ttl", 60_000i32);
        table.insert("price", Decimal::new(2, 1999));
        table.insert(
            "mixed",
            vec![FieldValue::Void, FieldValue::I64(-1), FieldValue::F64(0.5)],
        );
        table.insert("raw", FieldValue::ByteArray(Bytes::from_static(b"\x00\x01")));

        let mut dst = BytesMut::new();
        table.encode(&mut dst).unwrap();
        let declared = u32::from_be_bytes([dst[0], dst[1], dst[2], dst[3]]) as usize;
        assert_eq!(declared, dst.len() - 4);

        let mut src = dst.freeze();
        let decoded = FieldTable::decode(&mut src).unwrap();
        assert!(src.is_empty());
        assert_eq!(decoded, table);
    }

    #[test]
    fn boolean_and_string_tags_match_the_broker_table() {
        let mut dst = BytesMut::new();
        FieldValue::Bool(true).encode(&mut dst).unwrap();
        FieldValue::from("hi").encode(&mut dst).unwrap();
        FieldValue::I16(-2).encode(&mut dst).unwrap();
        assert_eq!(
            &dst[..],
            &[b't', 1, b'S', 0, 0, 0, 2, b'h', b'i', b's', 0xff, 0xfe]
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut src = Bytes::from_static(&[0, 0, 0, 3, 1, b'k', b'?']);
        assert_eq!(
            FieldTable::decode(&mut src),
            Err(Error::UnknownFieldType(b'?'))
        );
    }

    #[test]
    fn table_length_bounds_its_entries() {
        // declared length covers only the key, the value spills outside
        let mut src = Bytes::from_static(&[0, 0, 0, 2, 1, b'k', b'V']);
        assert!(matches!(
            FieldTable::decode(&mut src),
            Err(Error::UnexpectedEof { .. })
        ));
    }
}
