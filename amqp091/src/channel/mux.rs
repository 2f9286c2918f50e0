//! Per-channel dispatch inside the connection engine
//!
//! The engine hands every frame received on a channel to that channel's
//! [`ChannelMux`]. It matches replies against the single pending call,
//! reassembles content from header and body frames, and pushes everything
//! else to the channel's delivery sequence.

use std::{mem, sync::Arc};

use amqp091_types::{
    constants::REPLY_SUCCESS,
    methods::channel as channel_methods,
    ContentHeader, Method, MethodId,
};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    connection::ProtocolError,
    control::CallResponder,
    frames::FrameBody,
    message::{Content, Message},
};

use super::{ChannelState, Error};

pub(crate) type DeliverySender = mpsc::UnboundedSender<Result<Message, Error>>;

// Bodies announced larger than this are grown on demand
const MAX_PREALLOCATED_BODY: u64 = 1024 * 1024;

/// The single call on a channel that waits for its reply
#[derive(Debug)]
pub(crate) struct PendingCall {
    expected: &'static [MethodId],
    responder: Option<CallResponder>,
}

impl PendingCall {
    fn resolve(self, result: Result<Option<Message>, Error>) {
        if let Some(responder) = self.responder {
            // the caller may have given up waiting
            let _ = responder.send(result);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Call,
    Delivery,
}

#[derive(Debug)]
enum Reassembly {
    Idle,
    AwaitingHeader {
        method: Method,
        route: Route,
    },
    AwaitingBody {
        method: Method,
        header: ContentHeader,
        body: BytesMut,
        route: Route,
    },
}

#[derive(Debug)]
pub(crate) struct ChannelMux {
    id: u16,
    state: Arc<Mutex<ChannelState>>,
    pending: Option<PendingCall>,
    reassembly: Reassembly,
    deliveries: Option<DeliverySender>,
}

impl ChannelMux {
    pub fn new(id: u16, state: Arc<Mutex<ChannelState>>, deliveries: DeliverySender) -> Self {
        Self {
            id,
            state,
            pending: None,
            reassembly: Reassembly::Idle,
            deliveries: Some(deliveries),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ChannelState::Closed
    }

    /// Whether `state` is the one shared with this channel's handle
    pub fn is_shared_with(&self, state: &Arc<Mutex<ChannelState>>) -> bool {
        Arc::ptr_eq(&self.state, state)
    }

    /// Whether new calls may be written on this channel
    pub fn accepts_calls(&self) -> bool {
        matches!(self.state(), ChannelState::Opening | ChannelState::Open)
    }

    /// Registers the pending call. The responder is handed back if another
    /// call is already waiting
    pub fn expect(
        &mut self,
        expected: &'static [MethodId],
        responder: CallResponder,
    ) -> Result<(), CallResponder> {
        match self.pending {
            Some(_) => Err(responder),
            None => {
                self.pending = Some(PendingCall {
                    expected,
                    responder: Some(responder),
                });
                Ok(())
            }
        }
    }

    /// Moves the channel to `Closing` and waits for `channel.close-ok`.
    /// Returns false if there is nothing to close, in which case the
    /// `channel.close` must not be written
    pub fn begin_close(
        &mut self,
        expected: &'static [MethodId],
        responder: Option<CallResponder>,
    ) -> bool {
        match self.state() {
            ChannelState::Closing | ChannelState::Closed => {
                if let Some(responder) = responder {
                    let _ = responder.send(Ok(None));
                }
                false
            }
            ChannelState::Opening | ChannelState::Open => {
                if let Some(pending) = self.pending.take() {
                    pending.resolve(Err(Error::Closed));
                }
                self.reassembly = Reassembly::Idle;
                self.set_state(ChannelState::Closing);
                self.pending = Some(PendingCall {
                    expected,
                    responder,
                });
                true
            }
        }
    }

    /// Resolves the pending call and ends the delivery sequence with `error`
    pub fn shutdown(&mut self, error: Error) {
        if let Some(pending) = self.pending.take() {
            pending.resolve(Err(error.clone()));
        }
        if let Some(deliveries) = self.deliveries.take() {
            let _ = deliveries.send(Err(error));
        }
        self.reassembly = Reassembly::Idle;
        self.set_state(ChannelState::Closed);
    }

    /// Handles one inbound frame. Returns a method the engine has to send
    /// back on this channel, if any
    pub fn on_frame(&mut self, body: FrameBody) -> Result<Option<Method>, ProtocolError> {
        match body {
            FrameBody::Method(method) => self.on_method(method),
            // content of a method discarded while closing
            FrameBody::Header(_) | FrameBody::Body(_)
                if self.state() == ChannelState::Closing =>
            {
                Ok(None)
            }
            FrameBody::Header(header) => self.on_header(header).map(|_| None),
            FrameBody::Body(chunk) => self.on_body(chunk).map(|_| None),
            FrameBody::Heartbeat => Err(ProtocolError::UnexpectedFrame {
                channel: self.id,
                kind: "heartbeat",
            }),
        }
    }

    fn on_method(&mut self, method: Method) -> Result<Option<Method>, ProtocolError> {
        if let Method::ChannelClose(close) = method {
            self.on_remote_close(close);
            return Ok(Some(channel_methods::CloseOk {}.into()));
        }

        if self.state() == ChannelState::Closing && !matches!(method, Method::ChannelCloseOk(_)) {
            #[cfg(feature = "tracing")]
            tracing::debug!(channel = self.id, "Discarding {} while closing", method);
            #[cfg(feature = "log")]
            log::debug!("Discarding {} on closing channel {}", method, self.id);
            return Ok(None);
        }

        if !matches!(self.reassembly, Reassembly::Idle) {
            return Err(ProtocolError::UnexpectedFrame {
                channel: self.id,
                kind: "method",
            });
        }

        let reply = match &method {
            Method::ChannelFlow(flow) => Some(
                channel_methods::FlowOk {
                    active: flow.active,
                }
                .into(),
            ),
            _ => None,
        };

        let found = method.id();
        match self.pending.as_ref().map(|pending| pending.expected) {
            Some(expected) if expected.contains(&found) => self.accept(method, Route::Call),
            Some(expected) if !method.is_server_push() => {
                return Err(ProtocolError::UnexpectedMethod {
                    channel: self.id,
                    expected,
                    found,
                })
            }
            _ => self.accept(method, Route::Delivery),
        }
        Ok(reply)
    }

    fn accept(&mut self, method: Method, route: Route) {
        match method.has_content() {
            true => self.reassembly = Reassembly::AwaitingHeader { method, route },
            false => self.complete(Message::from(method), route),
        }
    }

    fn on_header(&mut self, header: ContentHeader) -> Result<(), ProtocolError> {
        let (method, route) = match mem::replace(&mut self.reassembly, Reassembly::Idle) {
            Reassembly::AwaitingHeader { method, route } => (method, route),
            _ => {
                return Err(ProtocolError::UnexpectedFrame {
                    channel: self.id,
                    kind: "header",
                })
            }
        };

        match header.body_size {
            0 => {
                let content = Content::new(header.properties, Bytes::new());
                self.complete(
                    Message {
                        method,
                        content: Some(content),
                    },
                    route,
                );
            }
            size => {
                let capacity = size.min(MAX_PREALLOCATED_BODY) as usize;
                self.reassembly = Reassembly::AwaitingBody {
                    method,
                    header,
                    body: BytesMut::with_capacity(capacity),
                    route,
                };
            }
        }
        Ok(())
    }

    fn on_body(&mut self, chunk: Bytes) -> Result<(), ProtocolError> {
        let (declared, received) = match &mut self.reassembly {
            Reassembly::AwaitingBody { header, body, .. } => {
                let received = (body.len() + chunk.len()) as u64;
                if received > header.body_size {
                    return Err(ProtocolError::BodyOverflow {
                        channel: self.id,
                        declared: header.body_size,
                        received,
                    });
                }
                body.extend_from_slice(&chunk);
                (header.body_size, received)
            }
            _ => {
                return Err(ProtocolError::UnexpectedFrame {
                    channel: self.id,
                    kind: "body",
                })
            }
        };

        if received == declared {
            if let Reassembly::AwaitingBody {
                method,
                header,
                body,
                route,
            } = mem::replace(&mut self.reassembly, Reassembly::Idle)
            {
                let content = Content::new(header.properties, body.freeze());
                self.complete(
                    Message {
                        method,
                        content: Some(content),
                    },
                    route,
                );
            }
        }
        Ok(())
    }

    fn complete(&mut self, message: Message, route: Route) {
        match route {
            Route::Call => {
                let closed = match &message.method {
                    Method::ChannelOpenOk(_) => {
                        self.set_state(ChannelState::Open);
                        false
                    }
                    Method::ChannelCloseOk(_) => true,
                    _ => false,
                };
                if let Some(pending) = self.pending.take() {
                    pending.resolve(Ok(Some(message)));
                }
                if closed {
                    self.shutdown(Error::Closed);
                }
            }
            Route::Delivery => {
                if let Some(deliveries) = &self.deliveries {
                    // the delivery sequence may never have been taken
                    let _ = deliveries.send(Ok(message));
                }
            }
        }
    }

    fn on_remote_close(&mut self, close: channel_methods::Close) {
        #[cfg(feature = "tracing")]
        tracing::debug!(channel = self.id, code = close.reply_code, "Channel closed by peer: {}", close.reply_text);
        #[cfg(feature = "log")]
        log::debug!("Channel {} closed by peer: {} {}", self.id, close.reply_code, close.reply_text);

        let was_closing = self.state() == ChannelState::Closing;
        if was_closing && close.reply_code == REPLY_SUCCESS {
            // both sides closed at the same time
            if let Some(pending) = self.pending.take() {
                pending.resolve(Ok(None));
            }
            self.shutdown(Error::Closed);
            return;
        }

        self.shutdown(Error::Remote {
            code: close.reply_code,
            text: close.reply_text.into_string(),
            class_id: close.class_id,
            method_id: close.method_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use amqp091_types::{
        methods::{basic, channel, queue},
        BasicProperties, ContentHeader, Method,
    };
    use bytes::Bytes;
    use parking_lot::Mutex;
    use tokio::sync::{mpsc, oneshot};

    use super::ChannelMux;
    use crate::{
        channel::{ChannelState, Error},
        connection::ProtocolError,
        control::CallResponder,
        frames::FrameBody,
        message::Message,
    };

    type Deliveries = mpsc::UnboundedReceiver<Result<Message, Error>>;
    type Reply = oneshot::Receiver<Result<Option<Message>, Error>>;

    fn open_mux() -> (ChannelMux, Deliveries) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ChannelState::Open));
        (ChannelMux::new(1, state, tx), rx)
    }

    fn call(mux: &mut ChannelMux, method: impl Into<Method>) -> Reply {
        let method = method.into();
        let (responder, rx): (CallResponder, _) = oneshot::channel();
        mux.expect(method.responses(), responder).unwrap();
        rx
    }

    fn method(m: impl Into<Method>) -> FrameBody {
        FrameBody::Method(m.into())
    }

    fn header(size: u64) -> FrameBody {
        FrameBody::Header(ContentHeader::new(size, BasicProperties::default()))
    }

    fn body(chunk: &'static [u8]) -> FrameBody {
        FrameBody::Body(Bytes::from_static(chunk))
    }

    fn deliver(tag: u64) -> FrameBody {
        method(basic::Deliver {
            consumer_tag: "ctag".into(),
            delivery_tag: tag,
            ..Default::default()
        })
    }

    #[test]
    fn matching_reply_resolves_the_call() {
        let (mut mux, _deliveries) = open_mux();
        let mut reply = call(&mut mux, queue::Declare::default());

        let declare_ok = queue::DeclareOk {
            queue: "amq.gen-1".into(),
            message_count: 0,
            consumer_count: 0,
        };
        assert_eq!(mux.on_frame(method(declare_ok.clone())).unwrap(), None);

        let message = reply.try_recv().unwrap().unwrap().unwrap();
        assert_eq!(message.method, Method::from(declare_ok));
    }

    #[test]
    fn mismatched_reply_is_a_protocol_error() {
        let (mut mux, _deliveries) = open_mux();
        let _reply = call(&mut mux, queue::Declare::default());

        let err = mux.on_frame(method(queue::BindOk {})).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnexpectedMethod {
                channel: 1,
                expected: &[queue::DeclareOk::ID],
                found: queue::BindOk::ID,
            }
        );
    }

    #[test]
    fn second_call_is_refused_while_one_is_pending() {
        let (mut mux, _deliveries) = open_mux();
        let _reply = call(&mut mux, basic::Qos::default());

        let (responder, _rx) = oneshot::channel();
        assert!(mux
            .expect(Method::from(basic::Qos::default()).responses(), responder)
            .is_err());
    }

    #[test]
    fn content_is_reassembled_before_the_call_resolves() {
        let (mut mux, _deliveries) = open_mux();
        let mut reply = call(&mut mux, basic::Get::default());

        mux.on_frame(method(basic::GetOk {
            delivery_tag: 1,
            ..Default::default()
        }))
        .unwrap();
        mux.on_frame(header(10)).unwrap();
        mux.on_frame(body(b"hello")).unwrap();
        assert!(reply.try_recv().is_err());

        mux.on_frame(body(b"world")).unwrap();
        let message = reply.try_recv().unwrap().unwrap().unwrap();
        assert_eq!(message.body(), b"helloworld");
    }

    #[test]
    fn empty_body_completes_on_the_header() {
        let (mut mux, mut deliveries) = open_mux();
        mux.on_frame(deliver(1)).unwrap();
        mux.on_frame(header(0)).unwrap();

        let message = deliveries.try_recv().unwrap().unwrap();
        assert_eq!(message.body(), b"");
        assert!(message.content.is_some());
    }

    #[test]
    fn body_overflow_is_fatal() {
        let (mut mux, _deliveries) = open_mux();
        mux.on_frame(deliver(1)).unwrap();
        mux.on_frame(header(3)).unwrap();

        let err = mux.on_frame(body(b"four")).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::BodyOverflow {
                channel: 1,
                declared: 3,
                received: 4,
            }
        );
    }

    #[test]
    fn method_in_the_middle_of_content_is_fatal() {
        let (mut mux, _deliveries) = open_mux();
        mux.on_frame(deliver(1)).unwrap();
        mux.on_frame(header(3)).unwrap();

        let err = mux.on_frame(deliver(2)).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnexpectedFrame {
                channel: 1,
                kind: "method",
            }
        );
    }

    #[test]
    fn body_without_header_is_fatal() {
        let (mut mux, _deliveries) = open_mux();
        mux.on_frame(deliver(1)).unwrap();
        assert!(mux.on_frame(body(b"x")).is_err());
    }

    #[test]
    fn deliveries_bypass_a_pending_call() {
        let (mut mux, mut deliveries) = open_mux();
        let mut reply = call(&mut mux, basic::Qos::default());

        mux.on_frame(deliver(7)).unwrap();
        mux.on_frame(header(2)).unwrap();
        mux.on_frame(body(b"hi")).unwrap();
        mux.on_frame(method(basic::Ack {
            delivery_tag: 3,
            multiple: false,
        }))
        .unwrap();
        assert!(reply.try_recv().is_err());

        mux.on_frame(method(basic::QosOk {})).unwrap();
        assert!(reply.try_recv().unwrap().is_ok());

        let first = deliveries.try_recv().unwrap().unwrap();
        assert!(matches!(first.method, Method::BasicDeliver(ref d) if d.delivery_tag == 7));
        assert_eq!(first.body(), b"hi");
        let second = deliveries.try_recv().unwrap().unwrap();
        assert!(matches!(second.method, Method::BasicAck(_)));
    }

    #[test]
    fn flow_is_acknowledged_and_delivered() {
        let (mut mux, mut deliveries) = open_mux();
        let reply = mux
            .on_frame(method(channel::Flow { active: false }))
            .unwrap();
        assert_eq!(reply, Some(Method::from(channel::FlowOk { active: false })));
        assert!(deliveries.try_recv().unwrap().is_ok());
    }

    #[test]
    fn remote_close_fails_the_call_and_ends_deliveries() {
        let (mut mux, mut deliveries) = open_mux();
        let mut reply = call(&mut mux, queue::Declare::default());

        let reply_frame = mux
            .on_frame(method(channel::Close {
                reply_code: 406,
                reply_text: "PRECONDITION_FAILED".into(),
                class_id: 50,
                method_id: 10,
            }))
            .unwrap();
        assert_eq!(reply_frame, Some(Method::from(channel::CloseOk {})));
        assert!(mux.is_closed());

        let err = reply.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, Error::Remote { code: 406, .. }));
        assert!(matches!(
            deliveries.try_recv().unwrap(),
            Err(Error::Remote { code: 406, .. })
        ));
        assert!(deliveries.try_recv().is_err());
    }

    #[test]
    fn local_close_discards_until_close_ok() {
        let (mut mux, mut deliveries) = open_mux();
        let mut pending = call(&mut mux, basic::Qos::default());

        let close = Method::from(channel::Close::default());
        let (responder, mut closed) = oneshot::channel();
        assert!(mux.begin_close(close.responses(), Some(responder)));
        assert!(matches!(pending.try_recv().unwrap(), Err(Error::Closed)));
        assert!(!mux.accepts_calls());

        // in flight deliveries are dropped
        mux.on_frame(deliver(1)).unwrap();
        mux.on_frame(header(1)).unwrap();
        mux.on_frame(body(b"x")).unwrap();
        assert!(deliveries.try_recv().is_err());

        mux.on_frame(method(channel::CloseOk {})).unwrap();
        assert!(closed.try_recv().unwrap().is_ok());
        assert!(mux.is_closed());
        assert!(matches!(deliveries.try_recv().unwrap(), Err(Error::Closed)));
    }

    #[test]
    fn open_ok_moves_the_channel_to_open() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ChannelState::Opening));
        let mut mux = ChannelMux::new(2, state.clone(), tx);
        let _reply = call(&mut mux, channel::Open::default());

        mux.on_frame(method(channel::OpenOk::default())).unwrap();
        assert_eq!(*state.lock(), ChannelState::Open);
    }
}
