//! Channels multiplexed over a connection
//!
//! A [`Channel`] is a cheap handle. The state it refers to lives in the
//! connection engine, which matches replies to calls and reassembles content.
//! Methods the broker pushes on its own (deliveries, returns, confirms,
//! cancellations, flow control) arrive on the channel's [`Deliveries`].

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use amqp091_types::{
    constants::{CONTENT_HEADER_PREFIX_SIZE, FRAME_OVERHEAD, REPLY_SUCCESS},
    methods::channel::{Close, Open},
    BasicProperties, Method,
};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    connection,
    control::{AllocatedChannel, ConnectionControl},
    message::{Content, Message},
};

mod error;
pub(crate) mod mux;

pub use error::Error;

/// Lifecycle of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// `channel.open` was sent
    Opening,

    /// `channel.open-ok` was received
    Open,

    /// `channel.close` was sent, waiting for `channel.close-ok`
    Closing,

    /// The channel is closed and its id may be reused
    Closed,
}

/// A channel on an open connection
///
/// Dropping an open channel closes it in the background.
#[derive(Debug)]
pub struct Channel {
    id: u16,
    control: mpsc::Sender<ConnectionControl>,
    state: Arc<Mutex<ChannelState>>,
    frame_max: usize,
    deliveries: Option<Deliveries>,
}

impl Channel {
    pub(crate) async fn open(
        control: mpsc::Sender<ConnectionControl>,
        frame_max: u32,
    ) -> Result<Self, Error> {
        let (responder, rx) = oneshot::channel();
        control
            .send(ConnectionControl::AllocateChannel { responder })
            .await
            .map_err(|_| connection_closed())?;
        let AllocatedChannel {
            id,
            state,
            deliveries,
        } = rx.await.map_err(|_| connection_closed())??;

        let channel = Self {
            id,
            control,
            state,
            frame_max: frame_max as usize,
            deliveries: Some(Deliveries {
                stream: UnboundedReceiverStream::new(deliveries),
            }),
        };
        channel.call(Open::default()).await?;
        Ok(channel)
    }

    /// Channel id
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Current state
    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    /// Whether the channel is closed
    pub fn is_closed(&self) -> bool {
        self.state() == ChannelState::Closed
    }

    /// Sends a method and, if the method is synchronous, waits for its reply
    ///
    /// Asynchronous methods resolve to `None` once they are written. A
    /// synchronous one resolves to the reply, including its content for
    /// `basic.get-ok`.
    pub async fn call(&self, method: impl Into<Method>) -> Result<Option<Message>, Error> {
        let method = method.into();
        if method.has_content() {
            return Err(Error::ContentRequired(method.name()));
        }
        self.send(method, None).await
    }

    /// Sends a content-carrying method such as `basic.publish`
    ///
    /// The body is split into frames no larger than the negotiated frame-max.
    pub async fn call_with_content(
        &self,
        method: impl Into<Method>,
        properties: BasicProperties,
        body: impl Into<Bytes>,
    ) -> Result<Option<Message>, Error> {
        let method = method.into();
        if !method.has_content() {
            return Err(Error::UnexpectedContent(method.name()));
        }
        self.send(method, Some(Content::new(properties, body))).await
    }

    async fn send(&self, method: Method, content: Option<Content>) -> Result<Option<Message>, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        // Encoding errors belong to the caller, not to the connection
        let mut scratch = BytesMut::new();
        method.encode(&mut scratch)?;
        self.check_frame_size(scratch.len())?;
        if let Some(content) = &content {
            scratch.clear();
            content.properties.encode(&mut scratch)?;
            self.check_frame_size(CONTENT_HEADER_PREFIX_SIZE + scratch.len())?;
        }

        let (responder, rx) = oneshot::channel();
        let control = ConnectionControl::Call {
            channel: self.id,
            state: self.state.clone(),
            method,
            content,
            responder,
        };
        self.control
            .send(control)
            .await
            .map_err(|_| connection_closed())?;
        rx.await.map_err(|_| connection_closed())?
    }

    /// Method and header frames are never split, so each must fit the
    /// frame-max on its own. A frame-max of 0 is unlimited
    fn check_frame_size(&self, payload: usize) -> Result<(), Error> {
        let size = payload + FRAME_OVERHEAD;
        match self.frame_max != 0 && size > self.frame_max {
            true => Err(Error::FrameTooLarge {
                size,
                max: self.frame_max,
            }),
            false => Ok(()),
        }
    }

    /// Takes the sequence of methods the broker pushes to this channel
    ///
    /// Returns `None` if it was taken before.
    pub fn deliveries(&mut self) -> Option<Deliveries> {
        self.deliveries.take()
    }

    /// Closes the channel and waits for the broker to confirm
    pub async fn close(&mut self) -> Result<(), Error> {
        if self.is_closed() {
            return Ok(());
        }

        let (responder, rx) = oneshot::channel();
        let control = ConnectionControl::CloseChannel {
            channel: self.id,
            state: self.state.clone(),
            close: goodbye(),
            responder: Some(responder),
        };
        self.control
            .send(control)
            .await
            .map_err(|_| connection_closed())?;
        match rx.await.map_err(|_| connection_closed())? {
            Ok(_) | Err(Error::Closed) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if matches!(self.state(), ChannelState::Opening | ChannelState::Open) {
            let control = ConnectionControl::CloseChannel {
                channel: self.id,
                state: self.state.clone(),
                close: goodbye(),
                responder: None,
            };
            if let Err(_err) = self.control.try_send(control) {
                #[cfg(feature = "tracing")]
                tracing::debug!(channel = self.id, "Could not close dropped channel: {}", _err);
                #[cfg(feature = "log")]
                log::debug!("Could not close dropped channel {}: {}", self.id, _err);
            }
        }
    }
}

pin_project! {
    /// Methods pushed by the broker to one channel, in arrival order
    ///
    /// The sequence ends with the error that closed the channel.
    #[derive(Debug)]
    pub struct Deliveries {
        #[pin]
        stream: UnboundedReceiverStream<Result<Message, Error>>,
    }
}

impl Deliveries {
    /// Receives the next pushed method
    pub async fn recv(&mut self) -> Option<Result<Message, Error>> {
        self.stream.next().await
    }
}

impl Stream for Deliveries {
    type Item = Result<Message, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.stream.poll_next(cx)
    }
}

fn goodbye() -> Close {
    Close {
        reply_code: REPLY_SUCCESS,
        reply_text: "Goodbye".into(),
        class_id: 0,
        method_id: 0,
    }
}

fn connection_closed() -> Error {
    Error::Connection(connection::Error::Closed)
}
