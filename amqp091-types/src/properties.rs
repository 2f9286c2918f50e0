//! Content header and the properties of the basic class

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec,
    methods::CLASS_BASIC,
    primitives::{ShortString, Timestamp},
    table::FieldTable,
    Error,
};

/// Properties of a message, carried in its content header
///
/// Only the properties that are present are put on the wire, each one
/// announced by a bit in the leading property flags word.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicProperties {
    /// MIME content type
    pub content_type: Option<ShortString>,

    /// MIME content encoding
    pub content_encoding: Option<ShortString>,

    /// Application headers
    pub headers: Option<FieldTable>,

    /// 1 for transient, 2 for persistent
    pub delivery_mode: Option<u8>,

    /// Priority, 0 to 9
    pub priority: Option<u8>,

    /// Application correlation identifier
    pub correlation_id: Option<ShortString>,

    /// Address to reply to
    pub reply_to: Option<ShortString>,

    /// Expiration in milliseconds, as a decimal string
    pub expiration: Option<ShortString>,

    /// Application message identifier
    pub message_id: Option<ShortString>,

    /// Message timestamp
    pub timestamp: Option<Timestamp>,

    /// Message type name
    pub kind: Option<ShortString>,

    /// Creating user id
    pub user_id: Option<ShortString>,

    /// Creating application id
    pub app_id: Option<ShortString>,

    /// Deprecated
    pub cluster_id: Option<ShortString>,
}

const CONTENT_TYPE: u16 = 1 << 15;
const CONTENT_ENCODING: u16 = 1 << 14;
const HEADERS: u16 = 1 << 13;
const DELIVERY_MODE: u16 = 1 << 12;
const PRIORITY: u16 = 1 << 11;
const CORRELATION_ID: u16 = 1 << 10;
const REPLY_TO: u16 = 1 << 9;
const EXPIRATION: u16 = 1 << 8;
const MESSAGE_ID: u16 = 1 << 7;
const TIMESTAMP: u16 = 1 << 6;
const TYPE: u16 = 1 << 5;
const USER_ID: u16 = 1 << 4;
const APP_ID: u16 = 1 << 3;
const CLUSTER_ID: u16 = 1 << 2;
// another flags word follows
const CONTINUATION: u16 = 1;

fn decode_if<T>(
    flags: u16,
    bit: u16,
    src: &mut Bytes,
    f: impl FnOnce(&mut Bytes) -> Result<T, Error>,
) -> Result<Option<T>, Error> {
    match flags & bit {
        0 => Ok(None),
        _ => f(src).map(Some),
    }
}

impl BasicProperties {
    /// Property flags announcing which properties are present
    pub fn flags(&self) -> u16 {
        let mut flags = 0;
        let mut set = |present: bool, bit: u16| {
            if present {
                flags |= bit;
            }
        };
        set(self.content_type.is_some(), CONTENT_TYPE);
        set(self.content_encoding.is_some(), CONTENT_ENCODING);
        set(self.headers.is_some(), HEADERS);
        set(self.delivery_mode.is_some(), DELIVERY_MODE);
        set(self.priority.is_some(), PRIORITY);
        set(self.correlation_id.is_some(), CORRELATION_ID);
        set(self.reply_to.is_some(), REPLY_TO);
        set(self.expiration.is_some(), EXPIRATION);
        set(self.message_id.is_some(), MESSAGE_ID);
        set(self.timestamp.is_some(), TIMESTAMP);
        set(self.kind.is_some(), TYPE);
        set(self.user_id.is_some(), USER_ID);
        set(self.app_id.is_some(), APP_ID);
        set(self.cluster_id.is_some(), CLUSTER_ID);
        flags
    }

    /// Decodes the property flags followed by the present properties
    pub fn decode(src: &mut Bytes) -> Result<Self, Error> {
        let flags = codec::get_u16(src)?;
        let mut more = flags & CONTINUATION != 0;
        while more {
            // basic has no properties beyond the first word
            more = codec::get_u16(src)? & CONTINUATION != 0;
        }

        Ok(Self {
            content_type: decode_if(flags, CONTENT_TYPE, src, ShortString::decode)?,
            content_encoding: decode_if(flags, CONTENT_ENCODING, src, ShortString::decode)?,
            headers: decode_if(flags, HEADERS, src, FieldTable::decode)?,
            delivery_mode: decode_if(flags, DELIVERY_MODE, src, codec::get_u8)?,
            priority: decode_if(flags, PRIORITY, src, codec::get_u8)?,
            correlation_id: decode_if(flags, CORRELATION_ID, src, ShortString::decode)?,
            reply_to: decode_if(flags, REPLY_TO, src, ShortString::decode)?,
            expiration: decode_if(flags, EXPIRATION, src, ShortString::decode)?,
            message_id: decode_if(flags, MESSAGE_ID, src, ShortString::decode)?,
            timestamp: decode_if(flags, TIMESTAMP, src, codec::get_u64)?,
            kind: decode_if(flags, TYPE, src, ShortString::decode)?,
            user_id: decode_if(flags, USER_ID, src, ShortString::decode)?,
            app_id: decode_if(flags, APP_ID, src, ShortString::decode)?,
            cluster_id: decode_if(flags, CLUSTER_ID, src, ShortString::decode)?,
        })
    }

    /// Encodes the property flags followed by the present properties
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.flags());

        let short_strings = |dst: &mut BytesMut, values: &[&Option<ShortString>]| {
            values
                .iter()
                .filter_map(|v| v.as_ref())
                .try_for_each(|v| v.encode(dst))
        };

        short_strings(dst, &[&self.content_type, &self.content_encoding])?;
        if let Some(headers) = &self.headers {
            headers.encode(dst)?;
        }
        if let Some(mode) = self.delivery_mode {
            dst.put_u8(mode);
        }
        if let Some(priority) = self.priority {
            dst.put_u8(priority);
        }
        short_strings(
            dst,
            &[
                &self.correlation_id,
                &self.reply_to,
                &self.expiration,
                &self.message_id,
            ],
        )?;
        if let Some(timestamp) = self.timestamp {
            dst.put_u64(timestamp);
        }
        short_strings(
            dst,
            &[&self.kind, &self.user_id, &self.app_id, &self.cluster_id],
        )
    }
}

/// Payload of a content header frame
///
/// ```text
/// class-id: u16 | weight: u16 (always 0) | body-size: u64 | flags + properties
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentHeader {
    /// Class of the method the content belongs to
    pub class_id: u16,

    /// Total size of the body frames that follow
    pub body_size: u64,

    /// Message properties
    pub properties: BasicProperties,
}

impl ContentHeader {
    /// Creates a header of the basic class
    pub fn new(body_size: u64, properties: BasicProperties) -> Self {
        Self {
            class_id: CLASS_BASIC,
            body_size,
            properties,
        }
    }

    /// Decodes a content header frame payload
    pub fn decode(mut src: Bytes) -> Result<Self, Error> {
        let class_id = codec::get_u16(&mut src)?;
        if class_id != CLASS_BASIC {
            return Err(Error::UnknownContentClass(class_id));
        }
        let _weight = codec::get_u16(&mut src)?;
        let body_size = codec::get_u64(&mut src)?;
        let properties = BasicProperties::decode(&mut src)?;
        match src.len() {
            0 => Ok(Self {
                class_id,
                body_size,
                properties,
            }),
            n => Err(Error::TrailingBytes(n)),
        }
    }

    /// Encodes the content header frame payload
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.class_id);
        dst.put_u16(0);
        dst.put_u64(self.body_size);
        self.properties.encode(dst)
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::{BasicProperties, ContentHeader};
    use crate::{Error, FieldTable};

    #[test]
    fn absent_properties_take_no_space() {
        let header = ContentHeader::new(5, BasicProperties::default());
        let mut dst = BytesMut::new();
        header.encode(&mut dst).unwrap();
        assert_eq!(&dst[..], &[0, 60, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5, 0, 0]);
        assert_eq!(ContentHeader::decode(dst.freeze()).unwrap(), header);
    }

    #[test]
    fn present_properties_set_their_flags() {
        let properties = BasicProperties {
            content_type: Some("text/plain".into()),
            delivery_mode: Some(2),
            ..Default::default()
        };
        assert_eq!(properties.flags(), 0b1001_0000_0000_0000);

        let mut dst = BytesMut::new();
        properties.encode(&mut dst).unwrap();
        assert_eq!(&dst[..3], &[0x90, 0x00, 10]);
        assert_eq!(dst[dst.len() - 1], 2);
    }

    #[test]
    fn every_property_survives_the_wire() {
        let mut headers = FieldTable::new();
        headers.insert("x-retry", 3u8);

        let properties = BasicProperties {
            content_type: Some("application/json".into()),
            content_encoding: Some("gzip".into()),
            headers: Some(headers),
            delivery_mode: Some(1),
            priority: Some(9),
            correlation_id: Some("c-1".into()),
            reply_to: Some("amq.rabbitmq.reply-to".into()),
            expiration: Some("60000".into()),
            message_id: Some("m-1".into()),
            timestamp: Some(1_700_000_000),
            kind: Some("order.created".into()),
            user_id: Some("guest".into()),
            app_id: Some("billing".into()),
            cluster_id: None,
        };
        let header = ContentHeader::new(1024, properties);

        let mut dst = BytesMut::new();
        header.encode(&mut dst).unwrap();
        assert_eq!(ContentHeader::decode(dst.freeze()).unwrap(), header);
    }

    #[test]
    fn only_the_basic_class_carries_content() {
        let src = Bytes::from_static(&[0, 50, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            ContentHeader::decode(src),
            Err(Error::UnknownContentClass(50))
        );
    }

    #[test]
    fn continuation_flag_words_are_skipped() {
        let src = Bytes::from_static(&[0, 60, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0, 0]);
        let header = ContentHeader::decode(src).unwrap();
        assert_eq!(header.body_size, 1);
        assert_eq!(header.properties, BasicProperties::default());
    }
}
