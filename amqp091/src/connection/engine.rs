//! The engine owns the transport. It is the only reader and the only writer
//! of the stream, so frames of different channels never interleave mid-frame.

use std::{io, sync::Arc, time::Duration};

use amqp091_types::{
    constants::{FRAME_OVERHEAD, REPLY_SUCCESS, VERSION_MAJOR, VERSION_MINOR},
    methods::{channel::Close as ChannelClose, connection},
    ContentHeader, FieldTable, Method,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    auth::{select_mechanism, SaslMechanism},
    channel::{self, mux::ChannelMux, ChannelState},
    control::{AllocatedChannel, CallResponder, ConnectionControl},
    frames::{Frame, FrameBody},
    message::Content,
    transport::{self, Transport},
    util::{Deadline, Running},
};

use super::{
    Connection, ConnectionState, Error, HeartBeat, OpenError, ProtocolError, Tuning,
};

/// Client side of the handshake
#[derive(Debug)]
pub(crate) struct LocalConfig {
    pub vhost: String,
    pub mechanisms: Vec<Box<dyn SaslMechanism>>,
    pub tuning: Tuning,
    pub locale: String,
    pub client_properties: FieldTable,
    pub close_timeout: Duration,
}

#[derive(Debug)]
pub(crate) struct ConnectionEngine<Io> {
    transport: Transport<Io>,
    connection: Connection,
    control: mpsc::Receiver<ConnectionControl>,
    control_closed: bool,
    heartbeat: HeartBeat,
    close_deadline: Deadline,
    close_timeout: Duration,
    server_properties: FieldTable,
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Runs the handshake without starting the event loop
    pub async fn open(
        mut io: Io,
        config: LocalConfig,
        control: mpsc::Receiver<ConnectionControl>,
    ) -> Result<Self, OpenError> {
        let LocalConfig {
            vhost,
            mut mechanisms,
            tuning: local_tuning,
            locale,
            client_properties,
            close_timeout,
        } = config;

        Transport::send_proto_header(&mut io).await?;
        let mut transport = Transport::bind(io, 0, None);

        // connection.start
        let start = match recv_handshake(&mut transport).await? {
            Method::ConnectionStart(start) => start,
            other => return Err(unexpected("connection.start", other)),
        };
        if (start.version_major, start.version_minor) != (VERSION_MAJOR, VERSION_MINOR) {
            return Err(OpenError::UnsupportedVersion {
                major: start.version_major,
                minor: start.version_minor,
            });
        }

        let offered = start.mechanisms.to_string();
        let index = select_mechanism(&mechanisms, &offered)
            .ok_or(OpenError::NoCommonMechanism { offered })?;
        let mechanism = &mut mechanisms[index];

        #[cfg(feature = "tracing")]
        tracing::debug!(mechanism = mechanism.name(), "Selected SASL mechanism");
        #[cfg(feature = "log")]
        log::debug!("Selected SASL mechanism {}", mechanism.name());

        let start_ok = connection::StartOk {
            client_properties,
            mechanism: mechanism.name().into(),
            response: mechanism.initial_response()?,
            locale: locale.into(),
        };
        send_handshake(&mut transport, start_ok).await?;

        // connection.secure rounds until connection.tune
        let tune = loop {
            match recv_handshake(&mut transport).await? {
                Method::ConnectionSecure(secure) => {
                    let response = mechanism.respond(&secure.challenge)?;
                    send_handshake(&mut transport, connection::SecureOk { response }).await?;
                }
                Method::ConnectionTune(tune) => break tune,
                other => return Err(unexpected("connection.tune", other)),
            }
        };

        let remote_tuning = Tuning {
            channel_max: tune.channel_max,
            frame_max: tune.frame_max,
            heartbeat: tune.heartbeat,
        };
        let tuning = Tuning::negotiate(local_tuning, remote_tuning);
        let tune_ok = connection::TuneOk {
            channel_max: tuning.channel_max,
            frame_max: tuning.frame_max,
            heartbeat: tuning.heartbeat,
        };
        send_handshake(&mut transport, tune_ok).await?;
        transport.set_max_frame_size(tuning.frame_max as usize);

        // connection.open
        let open = connection::Open {
            virtual_host: vhost.into(),
            ..Default::default()
        };
        send_handshake(&mut transport, open).await?;
        match recv_handshake(&mut transport).await? {
            Method::ConnectionOpenOk(_) => {}
            other => return Err(unexpected("connection.open-ok", other)),
        }

        let heartbeat = match tuning.heartbeat {
            0 => HeartBeat::never(),
            secs => HeartBeat::new(Duration::from_secs(secs as u64)),
        };
        if heartbeat.is_enabled() {
            // the peer is considered dead after two silent intervals
            transport.set_idle_timeout(Duration::from_secs(2 * tuning.heartbeat as u64));
        }

        let mut connection = Connection::new(tuning);
        connection.set_state(ConnectionState::Open);

        Ok(Self {
            transport,
            connection,
            control,
            control_closed: false,
            heartbeat,
            close_deadline: Deadline::default(),
            close_timeout,
            server_properties: start.server_properties,
        })
    }

    pub fn tuning(&self) -> Tuning {
        self.connection.tuning
    }

    pub fn server_properties(&self) -> &FieldTable {
        &self.server_properties
    }

    pub fn subscribe(&self) -> (watch::Receiver<ConnectionState>, watch::Receiver<bool>) {
        (
            self.connection.state.subscribe(),
            self.connection.blocked.subscribe(),
        )
    }

    pub fn spawn(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.event_loop())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(name = "SEND", skip_all))]
    async fn feed_frame(&mut self, frame: Frame) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::trace!(channel = frame.channel(), frame = ?frame.body());
        #[cfg(feature = "log")]
        log::trace!("SEND channel = {}, frame = {:?}", frame.channel(), frame.body());
        self.transport.feed(frame).await?;
        Ok(())
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.feed_frame(frame).await?;
        self.transport.flush().await?;
        self.heartbeat.reset();
        Ok(())
    }

    /// Writes a method and its content back to back
    async fn send_method(
        &mut self,
        channel: u16,
        method: Method,
        content: Option<Content>,
    ) -> Result<(), Error> {
        self.feed_frame(Frame::method(channel, method)).await?;
        if let Some(Content { properties, body }) = content {
            let header = ContentHeader::new(body.len() as u64, properties);
            self.feed_frame(Frame::new(channel, FrameBody::Header(header)))
                .await?;
            for chunk in split_body(body, self.transport.max_frame_size()) {
                self.feed_frame(Frame::new(channel, FrameBody::Body(chunk)))
                    .await?;
            }
        }
        self.transport.flush().await?;
        self.heartbeat.reset();
        Ok(())
    }

    async fn on_heartbeat(&mut self) -> Result<Running, Error> {
        #[cfg(feature = "tracing")]
        tracing::trace!("Sending heartbeat");
        #[cfg(feature = "log")]
        log::trace!("Sending heartbeat");
        self.transport.send(Frame::heartbeat()).await?;
        Ok(Running::Continue)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(name = "RECV", skip_all))]
    async fn on_incoming(
        &mut self,
        incoming: Result<Frame, transport::Error>,
    ) -> Result<Running, Error> {
        let Frame { channel, body } = incoming?;

        #[cfg(feature = "tracing")]
        tracing::trace!(channel, frame = ?body);
        #[cfg(feature = "log")]
        log::trace!("RECV channel = {}, frame = {:?}", channel, body);

        match channel {
            0 => self.on_connection_frame(body).await,
            _ => self.on_channel_frame(channel, body).await,
        }
    }

    async fn on_connection_frame(&mut self, body: FrameBody) -> Result<Running, Error> {
        let method = match body {
            FrameBody::Heartbeat => return Ok(Running::Continue),
            FrameBody::Method(method) => method,
            other => {
                return Err(ProtocolError::UnexpectedFrame {
                    channel: 0,
                    kind: other.kind(),
                }
                .into())
            }
        };

        match method {
            Method::ConnectionClose(close) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(code = close.reply_code, text = %close.reply_text, "Connection closed by peer");
                #[cfg(feature = "log")]
                log::debug!("Connection closed by peer: {} {}", close.reply_code, close.reply_text);

                self.connection.set_state(ConnectionState::Closing);
                self.send_frame(Frame::method(0, connection::CloseOk {}))
                    .await?;
                match close.reply_code {
                    REPLY_SUCCESS => Ok(Running::Stop),
                    code => Err(Error::Remote {
                        code,
                        text: close.reply_text.into_string(),
                    }),
                }
            }
            Method::ConnectionCloseOk(_)
                if self.connection.local_state() == ConnectionState::Closing =>
            {
                Ok(Running::Stop)
            }
            Method::ConnectionBlocked(_blocked) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(reason = %_blocked.reason, "Connection blocked");
                #[cfg(feature = "log")]
                log::debug!("Connection blocked: {}", _blocked.reason);
                self.connection.blocked.send_replace(true);
                Ok(Running::Continue)
            }
            Method::ConnectionUnblocked(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Connection unblocked");
                #[cfg(feature = "log")]
                log::debug!("Connection unblocked");
                self.connection.blocked.send_replace(false);
                Ok(Running::Continue)
            }
            other => Err(ProtocolError::UnexpectedMethod {
                channel: 0,
                expected: &[],
                found: other.id(),
            }
            .into()),
        }
    }

    async fn on_channel_frame(&mut self, channel: u16, body: FrameBody) -> Result<Running, Error> {
        if self.connection.local_state() == ConnectionState::Closing {
            return Ok(Running::Continue);
        }

        let reply = match self.connection.channels.get_mut(channel) {
            Some(mux) => {
                let reply = mux.on_frame(body)?;
                if mux.is_closed() {
                    self.connection.channels.release(channel);
                }
                reply
            }
            None => match body {
                FrameBody::Method(Method::ChannelClose(_)) => {
                    Some(Method::from(amqp091_types::methods::channel::CloseOk {}))
                }
                _body => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(channel, frame = ?_body, "Discarding frame for unknown channel");
                    #[cfg(feature = "log")]
                    log::debug!("Discarding frame for unknown channel {}: {:?}", channel, _body);
                    None
                }
            },
        };

        if let Some(reply) = reply {
            self.send_frame(Frame::method(channel, reply)).await?;
        }
        Ok(Running::Continue)
    }

    async fn on_control(&mut self, control: ConnectionControl) -> Result<Running, Error> {
        if self.connection.local_state() != ConnectionState::Open {
            match control {
                ConnectionControl::Close => {}
                control => control.reject(channel::Error::Connection(Error::Closed)),
            }
            return Ok(Running::Continue);
        }

        match control {
            ConnectionControl::Close => self.on_local_close().await,
            ConnectionControl::AllocateChannel { responder } => {
                if let Err(Ok(allocated)) = responder.send(self.allocate_channel()) {
                    // the caller stopped waiting before the channel was opened
                    #[cfg(feature = "tracing")]
                    tracing::debug!(channel = allocated.id, "Releasing unclaimed channel");
                    #[cfg(feature = "log")]
                    log::debug!("Releasing unclaimed channel {}", allocated.id);
                    self.connection.channels.release(allocated.id);
                }
                Ok(Running::Continue)
            }
            ConnectionControl::Call {
                channel,
                state,
                method: Method::ChannelClose(close),
                responder,
                ..
            } => {
                self.close_channel(channel, &state, close, Some(responder))
                    .await
            }
            ConnectionControl::Call {
                channel,
                state,
                method,
                content,
                responder,
            } => {
                self.on_call(channel, &state, method, content, responder)
                    .await
            }
            ConnectionControl::CloseChannel {
                channel,
                state,
                close,
                responder,
            } => self.close_channel(channel, &state, close, responder).await,
        }
    }

    fn allocate_channel(&mut self) -> Result<AllocatedChannel, channel::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ChannelState::Opening));
        let shared = state.clone();
        let id = self
            .connection
            .channels
            .allocate(|id| ChannelMux::new(id, shared, tx))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(channel = id, "Allocated channel");
        #[cfg(feature = "log")]
        log::debug!("Allocated channel {}", id);

        Ok(AllocatedChannel {
            id,
            state,
            deliveries: rx,
        })
    }

    async fn on_call(
        &mut self,
        channel: u16,
        state: &Arc<Mutex<ChannelState>>,
        method: Method,
        content: Option<Content>,
        responder: CallResponder,
    ) -> Result<Running, Error> {
        let mux = match self.connection.channel(channel, state) {
            Some(mux) if mux.accepts_calls() => mux,
            _ => {
                let _ = responder.send(Err(channel::Error::Closed));
                return Ok(Running::Continue);
            }
        };

        // Synchronous calls are resolved by the channel once the reply is in
        let responses = method.responses();
        let responder = match responses.is_empty() {
            true => Some(responder),
            false => match mux.expect(responses, responder) {
                Ok(()) => None,
                Err(responder) => {
                    let _ = responder.send(Err(channel::Error::CallInProgress));
                    return Ok(Running::Continue);
                }
            },
        };

        self.send_method(channel, method, content).await?;
        if let Some(responder) = responder {
            let _ = responder.send(Ok(None));
        }
        Ok(Running::Continue)
    }

    async fn close_channel(
        &mut self,
        channel: u16,
        state: &Arc<Mutex<ChannelState>>,
        close: ChannelClose,
        responder: Option<CallResponder>,
    ) -> Result<Running, Error> {
        let method = Method::from(close);
        match self.connection.channel(channel, state) {
            Some(mux) => {
                if mux.begin_close(method.responses(), responder) {
                    self.send_frame(Frame::method(channel, method)).await?;
                }
            }
            None => {
                if let Some(responder) = responder {
                    let _ = responder.send(Ok(None));
                }
            }
        }
        Ok(Running::Continue)
    }

    async fn on_local_close(&mut self) -> Result<Running, Error> {
        if self.connection.local_state() != ConnectionState::Open {
            return Ok(Running::Continue);
        }

        let close = connection::Close {
            reply_code: REPLY_SUCCESS,
            reply_text: "Goodbye".into(),
            class_id: 0,
            method_id: 0,
        };
        self.send_frame(Frame::method(0, close)).await?;
        self.connection.set_state(ConnectionState::Closing);
        self.shutdown_channels(channel::Error::Connection(Error::Closed));
        self.close_deadline.set(self.close_timeout);
        Ok(Running::Continue)
    }

    fn shutdown_channels(&mut self, err: channel::Error) {
        for mut mux in self.connection.channels.drain() {
            mux.shutdown(err.clone());
        }
    }

    async fn on_stop(&mut self, err: Error) {
        self.shutdown_channels(channel::Error::Connection(err.clone()));
        self.connection.set_state(ConnectionState::Closed);

        self.control.close();
        while let Ok(control) = self.control.try_recv() {
            control.reject(channel::Error::Connection(err.clone()));
        }

        match tokio::time::timeout(self.close_timeout, self.transport.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(_err)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(err = ?_err, "Error closing transport");
                #[cfg(feature = "log")]
                log::debug!("Error closing transport: {:?}", _err);
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Timed out closing transport");
                #[cfg(feature = "log")]
                log::debug!("Timed out closing transport");
            }
        }
    }

    async fn event_loop(mut self) -> Result<(), Error> {
        let outcome = loop {
            let result = tokio::select! {
                _ = self.heartbeat.next() => self.on_heartbeat().await,
                incoming = self.transport.next() => {
                    match incoming {
                        Some(incoming) => self.on_incoming(incoming).await,
                        None => match self.connection.local_state() {
                            // the peer may drop the socket right after close-ok
                            ConnectionState::Closing => Ok(Running::Stop),
                            _ => Err(Error::from(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "Connection closed by peer without connection.close",
                            ))),
                        },
                    }
                },
                control = self.control.recv(), if !self.control_closed => {
                    match control {
                        Some(control) => self.on_control(control).await,
                        None => {
                            // Every handle is dropped
                            self.control_closed = true;
                            self.on_local_close().await
                        }
                    }
                },
                _ = &mut self.close_deadline => Err(Error::CloseTimeout),
            };

            match result {
                Ok(Running::Continue) => {}
                Ok(Running::Stop) => break Ok(()),
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(?err);
                    #[cfg(feature = "log")]
                    log::error!("{:?}", err);
                    break Err(err);
                }
            }
        };

        let err = match &outcome {
            Ok(()) => Error::Closed,
            Err(err) => err.clone(),
        };
        self.on_stop(err).await;

        #[cfg(feature = "tracing")]
        tracing::debug!("Stopped");
        #[cfg(feature = "log")]
        log::debug!("Stopped");

        outcome
    }
}

async fn recv_handshake<Io>(transport: &mut Transport<Io>) -> Result<Method, OpenError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = match transport.next().await {
            Some(frame) => frame?,
            None => {
                return Err(OpenError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Connection closed during handshake",
                )))
            }
        };

        let Frame { channel, body } = frame;
        match (channel, body) {
            (0, FrameBody::Heartbeat) => continue,
            (0, FrameBody::Method(Method::ConnectionClose(close))) => {
                let _ = transport.send(Frame::method(0, connection::CloseOk {})).await;
                return Err(OpenError::Remote {
                    code: close.reply_code,
                    text: close.reply_text.into_string(),
                });
            }
            (0, FrameBody::Method(method)) => return Ok(method),
            (channel, body) => {
                return Err(OpenError::UnexpectedFrame {
                    expected: "a method frame on channel 0",
                    found: format!("{} frame on channel {}", body.kind(), channel),
                })
            }
        }
    }
}

async fn send_handshake<Io>(
    transport: &mut Transport<Io>,
    method: impl Into<Method>,
) -> Result<(), OpenError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    transport.send(Frame::method(0, method)).await?;
    Ok(())
}

fn unexpected(expected: &'static str, found: Method) -> OpenError {
    OpenError::UnexpectedFrame {
        expected,
        found: found.name().to_string(),
    }
}

/// Splits a content body into chunks that fit into body frames
fn split_body(mut body: Bytes, max_frame_size: usize) -> Vec<Bytes> {
    let chunk_size = match max_frame_size {
        0 => usize::MAX,
        max => max.saturating_sub(FRAME_OVERHEAD).max(1),
    };
    let mut chunks = Vec::new();
    while !body.is_empty() {
        let len = body.len().min(chunk_size);
        chunks.push(body.split_to(len));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::split_body;

    #[test]
    fn body_fits_into_frames() {
        let body = Bytes::from(vec![7u8; 250]);
        let chunks = split_body(body, 108);
        assert_eq!(
            chunks.iter().map(Bytes::len).collect::<Vec<_>>(),
            vec![100, 100, 50]
        );
    }

    #[test]
    fn empty_body_sends_no_body_frame() {
        assert!(split_body(Bytes::new(), 4096).is_empty());
    }

    #[test]
    fn no_limit_sends_one_frame() {
        let body = Bytes::from_static(b"hello world");
        assert_eq!(split_body(body.clone(), 0), vec![body]);
    }
}
