//! A scripted broker on the other end of an in-memory stream

#![allow(dead_code)]

use amqp091::{
    connection::Builder,
    frames::{Frame, FrameBody, FrameCodec},
    types::{
        methods::{channel, connection},
        BasicProperties, ContentHeader, FieldTable, Method,
    },
    ConnectionHandle,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio_util::codec::Framed;

pub const PROTOCOL_HEADER: &[u8; 8] = b"AMQP\x00\x00\x09\x01";

pub struct Peer {
    framed: Framed<DuplexStream, FrameCodec>,
}

impl Peer {
    pub async fn accept(mut io: DuplexStream) -> Self {
        let mut header = [0u8; 8];
        io.read_exact(&mut header).await.unwrap();
        assert_eq!(&header, PROTOCOL_HEADER);
        Self {
            framed: Framed::new(io, FrameCodec::new(0)),
        }
    }

    pub async fn send(&mut self, channel: u16, method: impl Into<Method>) {
        self.send_frame(Frame::method(channel, method)).await;
    }

    pub async fn send_frame(&mut self, frame: Frame) {
        self.framed.send(frame).await.unwrap();
    }

    pub async fn send_content(&mut self, channel: u16, method: impl Into<Method>, chunks: &[&'static [u8]]) {
        let size = chunks.iter().map(|c| c.len() as u64).sum();
        self.send(channel, method).await;
        let header = ContentHeader::new(size, BasicProperties::default());
        self.send_frame(Frame::new(channel, FrameBody::Header(header)))
            .await;
        for chunk in chunks {
            self.send_frame(Frame::new(channel, FrameBody::Body(Bytes::from_static(chunk))))
                .await;
        }
    }

    pub async fn recv(&mut self) -> Frame {
        self.framed
            .next()
            .await
            .expect("client closed the stream")
            .expect("client sent a malformed frame")
    }

    /// Next method, skipping heartbeats
    pub async fn recv_method(&mut self) -> (u16, Method) {
        loop {
            let Frame { channel, body } = self.recv().await;
            match body {
                FrameBody::Heartbeat => continue,
                FrameBody::Method(method) => return (channel, method),
                other => panic!("expecting a method, found {:?}", other),
            }
        }
    }

    /// Whether the client closed its end of the stream
    pub async fn is_closed(&mut self) -> bool {
        loop {
            match self.framed.next().await {
                None | Some(Err(_)) => return true,
                Some(Ok(Frame {
                    body: FrameBody::Heartbeat,
                    ..
                })) => continue,
                Some(Ok(_)) => return false,
            }
        }
    }

    pub async fn start(&mut self, mechanisms: &str) {
        let mut server_properties = FieldTable::new();
        server_properties.insert("product", "scripted-broker");
        let start = connection::Start {
            version_major: 0,
            version_minor: 9,
            server_properties,
            mechanisms: mechanisms.into(),
            locales: "en_US".into(),
        };
        self.send(0, start).await;
    }

    /// Start, tune and open. Returns what the client answered
    pub async fn handshake(&mut self, tune: connection::Tune) -> (connection::StartOk, connection::TuneOk) {
        self.start("PLAIN AMQPLAIN").await;
        let start_ok = match self.recv_method().await {
            (0, Method::ConnectionStartOk(start_ok)) => start_ok,
            other => panic!("expecting connection.start-ok, found {:?}", other),
        };

        self.send(0, tune).await;
        let tune_ok = match self.recv_method().await {
            (0, Method::ConnectionTuneOk(tune_ok)) => tune_ok,
            other => panic!("expecting connection.tune-ok, found {:?}", other),
        };

        match self.recv_method().await {
            (0, Method::ConnectionOpen(_)) => {}
            other => panic!("expecting connection.open, found {:?}", other),
        }
        self.send(0, connection::OpenOk::default()).await;

        (start_ok, tune_ok)
    }

    /// Answers the next channel.open, returns its channel id
    pub async fn accept_channel(&mut self) -> u16 {
        match self.recv_method().await {
            (id, Method::ChannelOpen(_)) => {
                self.send(id, channel::OpenOk::default()).await;
                id
            }
            other => panic!("expecting channel.open, found {:?}", other),
        }
    }
}

pub fn tune(channel_max: u16, frame_max: u32, heartbeat: u16) -> connection::Tune {
    connection::Tune {
        channel_max,
        frame_max,
        heartbeat,
    }
}

/// Opens a connection against a scripted peer that completes the handshake
/// with `tune`
pub async fn connect(builder: Builder, tune: connection::Tune) -> (ConnectionHandle, Peer) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let peer = async move {
        let mut peer = Peer::accept(server).await;
        peer.handshake(tune).await;
        peer
    };
    let (connection, peer) = tokio::join!(builder.open_with_stream(client), peer);
    (connection.unwrap(), peer)
}

/// A connection without heartbeats, so the scripts only see what the test
/// sends
pub async fn connect_quiet() -> (ConnectionHandle, Peer) {
    connect(Builder::new().heartbeat(0), tune(2047, 131_072, 0)).await
}
