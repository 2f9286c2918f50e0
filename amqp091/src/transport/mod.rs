//! Implements low level transport framing
//!
//! The transport owns the byte stream once the protocol header has been sent.
//! It is a `Sink` and a `Stream` of [`Frame`]s and keeps track of how long
//! the peer has been silent.

use std::{future::Future, task::Poll, time::Duration};

use amqp091_types::constants::PROTOCOL_HEADER;
use futures_util::{Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;

use crate::{
    frames::{Frame, FrameCodec},
    util::IdleTimeout,
};

mod error;
pub use error::Error;

pin_project! {
    /// Framed byte stream with an optional idle timeout on the receiving side
    #[derive(Debug)]
    pub struct Transport<Io> {
        #[pin]
        framed: Framed<Io, FrameCodec>,
        #[pin]
        idle_timeout: Option<IdleTimeout>,
    }
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    /// Writes the 8 byte protocol header that opens every connection
    pub async fn send_proto_header(io: &mut Io) -> Result<(), Error> {
        io.write_all(&PROTOCOL_HEADER).await?;
        io.flush().await?;
        Ok(())
    }

    /// Wraps the stream. A `max_frame_size` of 0 means no limit
    pub fn bind(io: Io, max_frame_size: usize, idle_timeout: Option<Duration>) -> Self {
        let framed = Framed::new(io, FrameCodec::new(max_frame_size));
        let mut transport = Self {
            framed,
            idle_timeout: None,
        };
        if let Some(duration) = idle_timeout {
            transport.set_idle_timeout(duration);
        }
        transport
    }

    /// Change the frame size limit
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) -> &mut Self {
        self.framed.codec_mut().set_max_frame_size(max_frame_size);
        self
    }

    /// Get the frame size limit
    pub fn max_frame_size(&self) -> usize {
        self.framed.codec().max_frame_size()
    }

    /// Sets the idle timeout. A zero duration disables it
    pub fn set_idle_timeout(&mut self, duration: Duration) -> &mut Self {
        self.idle_timeout = match duration.is_zero() {
            true => None,
            false => Some(IdleTimeout::new(duration)),
        };
        self
    }

    /// Consumes the transport, returning the underlying stream
    pub fn into_inner(self) -> Io {
        self.framed.into_inner()
    }
}

impl<Io> Sink<Frame> for Transport<Io>
where
    Io: AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_ready(cx).map_err(Into::into)
    }

    fn start_send(self: std::pin::Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let this = self.project();
        this.framed.start_send(item).map_err(Into::into)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_close(cx).map_err(Into::into)
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + Unpin,
{
    type Item = Result<Frame, Error>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.framed.poll_next(cx) {
            Poll::Ready(next) => {
                if let Some(delay) = this.idle_timeout.as_pin_mut() {
                    delay.get_mut().reset();
                }
                Poll::Ready(next.map(|item| item.map_err(Into::into)))
            }
            Poll::Pending => {
                // check if idle timeout has exceeded
                if let Some(delay) = this.idle_timeout.as_pin_mut() {
                    if let Poll::Ready(()) = delay.poll(cx) {
                        return Poll::Ready(Some(Err(Error::IdleTimeout)));
                    }
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use amqp091_types::methods::channel;
    use futures_util::{SinkExt, StreamExt};
    use tokio_test::io::Builder;

    use super::{Error, Transport};
    use crate::frames::{Frame, FrameBody};

    #[tokio::test]
    async fn protocol_header_is_amqp_0_9_1() {
        let mut mock = Builder::new().write(b"AMQP\x00\x00\x09\x01").build();
        Transport::send_proto_header(&mut mock).await.unwrap();
    }

    #[tokio::test]
    async fn frames_are_written_and_read() {
        let mock = Builder::new()
            .write(&[1, 0, 1, 0, 0, 0, 5, 0, 20, 0, 20, 0, 0xCE])
            .read(&[8, 0, 0, 0, 0, 0, 0, 0xCE])
            .build();
        let mut transport = Transport::bind(mock, 0, None);

        transport
            .send(Frame::method(1, channel::Flow { active: false }))
            .await
            .unwrap();
        let frame = transport.next().await.unwrap().unwrap();
        assert_eq!(frame.body, FrameBody::Heartbeat);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_trips_the_idle_timeout() {
        let mock = Builder::new().wait(Duration::from_secs(10)).build();
        let mut transport = Transport::bind(mock, 0, Some(Duration::from_secs(2)));

        let result = transport.next().await.unwrap();
        assert!(matches!(result, Err(Error::IdleTimeout)));
    }
}
