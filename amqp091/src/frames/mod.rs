//! AMQP 0-9-1 frames and the corresponding encoder and decoder
//!
//! ```text
//! type: u8 | channel: u16 | size: u32 | payload: [u8; size] | 0xCE
//! ```

use amqp091_types::{
    constants::{
        FRAME_BODY, FRAME_END, FRAME_HEADER, FRAME_HEADER_SIZE, FRAME_HEARTBEAT, FRAME_METHOD,
        FRAME_OVERHEAD,
    },
    ContentHeader, Method, MethodId,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

mod error;
pub use error::*;

/// AMQP 0-9-1 frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Channel of the frame, 0 for the connection itself
    pub channel: u16,

    /// Frame body
    pub body: FrameBody,
}

impl Frame {
    /// Creates a new frame
    pub fn new(channel: u16, body: FrameBody) -> Self {
        Self { channel, body }
    }

    /// Creates a method frame
    pub fn method(channel: u16, method: impl Into<Method>) -> Self {
        Self::new(channel, FrameBody::Method(method.into()))
    }

    /// Creates a heartbeat frame. Heartbeats always go on channel 0
    pub fn heartbeat() -> Self {
        Self::new(0, FrameBody::Heartbeat)
    }

    /// Get the channel of the frame
    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Get the body of the frame
    pub fn body(&self) -> &FrameBody {
        &self.body
    }

    /// Consume the frame to get the frame body
    pub fn into_body(self) -> FrameBody {
        self.body
    }
}

/// Body of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    /// Method frame
    Method(Method),

    /// Content header frame
    Header(ContentHeader),

    /// Content body frame, one chunk of the content
    Body(Bytes),

    /// Heartbeat frame
    Heartbeat,
}

impl FrameBody {
    /// Short name of the frame kind, used in errors and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FrameBody::Method(_) => "method",
            FrameBody::Header(_) => "header",
            FrameBody::Body(_) => "body",
            FrameBody::Heartbeat => "heartbeat",
        }
    }
}

/// Encoder and decoder of frames
///
/// A `max_frame_size` of 0 puts no limit on the frame size.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Creates a new codec
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Get the current frame size limit
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Change the frame size limit, usually after tuning
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) -> &mut Self {
        self.max_frame_size = max_frame_size;
        self
    }

    fn check_size(&self, size: usize) -> Result<(), FrameError> {
        match self.max_frame_size != 0 && size > self.max_frame_size {
            true => Err(FrameError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            }),
            false => Ok(()),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let Frame { channel, body } = item;
        let start = dst.len();

        let frame_type = match &body {
            FrameBody::Method(_) => FRAME_METHOD,
            FrameBody::Header(_) => FRAME_HEADER,
            FrameBody::Body(_) => FRAME_BODY,
            FrameBody::Heartbeat => FRAME_HEARTBEAT,
        };
        dst.put_u8(frame_type);
        dst.put_u16(channel);
        // size is patched once the payload is written
        dst.put_u32(0);

        match body {
            FrameBody::Method(method) => method.encode(dst).map_err(FrameError::Encode)?,
            FrameBody::Header(header) => header.encode(dst).map_err(FrameError::Encode)?,
            FrameBody::Body(payload) => dst.put(payload),
            FrameBody::Heartbeat => {}
        }

        let size = dst.len() - start - FRAME_HEADER_SIZE;
        let size_field = u32::try_from(size).map_err(|_| FrameError::FrameTooLarge {
            size,
            max: u32::MAX as usize,
        })?;
        dst[start + 3..start + FRAME_HEADER_SIZE].copy_from_slice(&size_field.to_be_bytes());
        dst.put_u8(FRAME_END);

        if let Err(err) = self.check_size(size + FRAME_OVERHEAD) {
            dst.truncate(start);
            return Err(err.into());
        }
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() >= 8 && src.starts_with(b"AMQP") {
            let mut header = [0u8; 8];
            header.copy_from_slice(&src[..8]);
            return Err(FrameError::ProtocolHeaderMismatch(header).into());
        }
        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let frame_type = src[0];
        let channel = u16::from_be_bytes([src[1], src[2]]);
        let size = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;
        self.check_size(size + FRAME_OVERHEAD)?;

        let total = size + FRAME_OVERHEAD;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(FRAME_HEADER_SIZE);
        let end = frame[size];
        if end != FRAME_END {
            return Err(FrameError::FrameEndMismatch(end).into());
        }
        frame.truncate(size);
        let payload = frame.freeze();

        let body = match frame_type {
            FRAME_METHOD => FrameBody::Method(decode_method(payload)?),
            FRAME_HEADER => {
                let header = ContentHeader::decode(payload)
                    .map_err(|source| FrameError::Decode {
                        method: None,
                        source,
                    })?;
                FrameBody::Header(header)
            }
            FRAME_BODY => FrameBody::Body(payload),
            FRAME_HEARTBEAT => {
                if channel != 0 {
                    return Err(FrameError::HeartbeatOnChannel(channel).into());
                }
                if !payload.is_empty() {
                    return Err(FrameError::HeartbeatWithPayload(payload.len()).into());
                }
                FrameBody::Heartbeat
            }
            other => return Err(FrameError::UnknownFrameType(other).into()),
        };

        Ok(Some(Frame { channel, body }))
    }
}

fn decode_method(payload: Bytes) -> Result<Method, FrameError> {
    let method = match payload.len() >= 4 {
        true => Some(MethodId::new(
            u16::from_be_bytes([payload[0], payload[1]]),
            u16::from_be_bytes([payload[2], payload[3]]),
        )),
        false => None,
    };
    Method::decode(payload).map_err(|source| FrameError::Decode { method, source })
}
