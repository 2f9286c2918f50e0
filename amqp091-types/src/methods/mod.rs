//! AMQP 0-9-1 methods
//!
//! Every method is a plain struct with public fields. [`Method`] is the closed
//! set of all of them; decoding looks the (class id, method id) pair up and an
//! unknown pair is an [`Error::UnknownMethod`].

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    codec::{self, ArgReader, ArgWriter},
    Error,
};

macro_rules! method {
    (
        $(#[$meta:meta])*
        $name:ident ($class_id:literal, $method_id:literal) {
            $(
                $(#[$field_meta:meta])*
                $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        // fields carry the argument names of the protocol
        #[allow(missing_docs)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        impl $name {
            /// (class id, method id) of this method
            pub const ID: $crate::methods::MethodId =
                $crate::methods::MethodId::new($class_id, $method_id);
        }

        impl $crate::methods::MethodArguments for $name {
            #[allow(unused_variables)]
            fn read_args(
                reader: &mut $crate::codec::ArgReader<'_>,
            ) -> Result<Self, $crate::Error> {
                Ok(Self {
                    $( $field: $crate::codec::Argument::read_arg(reader)?, )*
                })
            }

            #[allow(unused_variables)]
            fn write_args(
                &self,
                writer: &mut $crate::codec::ArgWriter<'_>,
            ) -> Result<(), $crate::Error> {
                $( $crate::codec::Argument::write_arg(&self.$field, writer)?; )*
                Ok(())
            }
        }
    };
}

pub mod basic;
pub mod channel;
pub mod confirm;
pub mod connection;
pub mod exchange;
pub mod queue;
pub mod tx;

/// Class id of the connection class
pub const CLASS_CONNECTION: u16 = 10;
/// Class id of the channel class
pub const CLASS_CHANNEL: u16 = 20;
/// Class id of the exchange class
pub const CLASS_EXCHANGE: u16 = 40;
/// Class id of the queue class
pub const CLASS_QUEUE: u16 = 50;
/// Class id of the basic class, the only class that carries content
pub const CLASS_BASIC: u16 = 60;
/// Class id of the confirm class
pub const CLASS_CONFIRM: u16 = 85;
/// Class id of the tx class
pub const CLASS_TX: u16 = 90;

/// Identity of a method on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
    /// Class id
    pub class_id: u16,

    /// Method id within the class
    pub method_id: u16,
}

impl MethodId {
    /// Creates a new [`MethodId`]
    pub const fn new(class_id: u16, method_id: u16) -> Self {
        Self {
            class_id,
            method_id,
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.class_id, self.method_id)
    }
}

/// Fixed argument schema of a method
pub trait MethodArguments: Sized {
    /// Reads the arguments in declaration order
    fn read_args(reader: &mut ArgReader<'_>) -> Result<Self, Error>;

    /// Writes the arguments in declaration order
    fn write_args(&self, writer: &mut ArgWriter<'_>) -> Result<(), Error>;
}

macro_rules! methods {
    ($($variant:ident($ty:ty) => $name:literal),* $(,)?) => {
        /// The closed set of AMQP 0-9-1 methods
        #[derive(Debug, Clone, PartialEq)]
        pub enum Method {
            $(
                #[doc = $name]
                $variant($ty),
            )*
        }

        impl Method {
            /// (class id, method id) of the method
            pub fn id(&self) -> MethodId {
                match self {
                    $( Method::$variant(_) => <$ty>::ID, )*
                }
            }

            /// Protocol name of the method, eg. `"queue.declare-ok"`
            pub fn name(&self) -> &'static str {
                match self {
                    $( Method::$variant(_) => $name, )*
                }
            }

            /// Protocol name of a method id, if it is known
            pub fn name_of(id: MethodId) -> Option<&'static str> {
                $(
                    if id == <$ty>::ID {
                        return Some($name);
                    }
                )*
                None
            }

            fn read_args(id: MethodId, reader: &mut ArgReader<'_>) -> Result<Self, Error> {
                $(
                    if id == <$ty>::ID {
                        return <$ty as MethodArguments>::read_args(reader).map(Method::$variant);
                    }
                )*
                Err(Error::UnknownMethod {
                    class_id: id.class_id,
                    method_id: id.method_id,
                })
            }

            fn write_args(&self, writer: &mut ArgWriter<'_>) -> Result<(), Error> {
                match self {
                    $( Method::$variant(args) => args.write_args(writer), )*
                }
            }
        }

        $(
            impl From<$ty> for Method {
                fn from(value: $ty) -> Self {
                    Method::$variant(value)
                }
            }
        )*
    };
}

methods! {
    ConnectionStart(connection::Start) => "connection.start",
    ConnectionStartOk(connection::StartOk) => "connection.start-ok",
    ConnectionSecure(connection::Secure) => "connection.secure",
    ConnectionSecureOk(connection::SecureOk) => "connection.secure-ok",
    ConnectionTune(connection::Tune) => "connection.tune",
    ConnectionTuneOk(connection::TuneOk) => "connection.tune-ok",
    ConnectionOpen(connection::Open) => "connection.open",
    ConnectionOpenOk(connection::OpenOk) => "connection.open-ok",
    ConnectionClose(connection::Close) => "connection.close",
    ConnectionCloseOk(connection::CloseOk) => "connection.close-ok",
    ConnectionBlocked(connection::Blocked) => "connection.blocked",
    ConnectionUnblocked(connection::Unblocked) => "connection.unblocked",
    ConnectionUpdateSecret(connection::UpdateSecret) => "connection.update-secret",
    ConnectionUpdateSecretOk(connection::UpdateSecretOk) => "connection.update-secret-ok",

    ChannelOpen(channel::Open) => "channel.open",
    ChannelOpenOk(channel::OpenOk) => "channel.open-ok",
    ChannelFlow(channel::Flow) => "channel.flow",
    ChannelFlowOk(channel::FlowOk) => "channel.flow-ok",
    ChannelClose(channel::Close) => "channel.close",
    ChannelCloseOk(channel::CloseOk) => "channel.close-ok",

    ExchangeDeclare(exchange::Declare) => "exchange.declare",
    ExchangeDeclareOk(exchange::DeclareOk) => "exchange.declare-ok",
    ExchangeDelete(exchange::Delete) => "exchange.delete",
    ExchangeDeleteOk(exchange::DeleteOk) => "exchange.delete-ok",
    ExchangeBind(exchange::Bind) => "exchange.bind",
    ExchangeBindOk(exchange::BindOk) => "exchange.bind-ok",
    ExchangeUnbind(exchange::Unbind) => "exchange.unbind",
    ExchangeUnbindOk(exchange::UnbindOk) => "exchange.unbind-ok",

    QueueDeclare(queue::Declare) => "queue.declare",
    QueueDeclareOk(queue::DeclareOk) => "queue.declare-ok",
    QueueBind(queue::Bind) => "queue.bind",
    QueueBindOk(queue::BindOk) => "queue.bind-ok",
    QueuePurge(queue::Purge) => "queue.purge",
    QueuePurgeOk(queue::PurgeOk) => "queue.purge-ok",
    QueueDelete(queue::Delete) => "queue.delete",
    QueueDeleteOk(queue::DeleteOk) => "queue.delete-ok",
    QueueUnbind(queue::Unbind) => "queue.unbind",
    QueueUnbindOk(queue::UnbindOk) => "queue.unbind-ok",

    BasicQos(basic::Qos) => "basic.qos",
    BasicQosOk(basic::QosOk) => "basic.qos-ok",
    BasicConsume(basic::Consume) => "basic.consume",
    BasicConsumeOk(basic::ConsumeOk) => "basic.consume-ok",
    BasicCancel(basic::Cancel) => "basic.cancel",
    BasicCancelOk(basic::CancelOk) => "basic.cancel-ok",
    BasicPublish(basic::Publish) => "basic.publish",
    BasicReturn(basic::Return) => "basic.return",
    BasicDeliver(basic::Deliver) => "basic.deliver",
    BasicGet(basic::Get) => "basic.get",
    BasicGetOk(basic::GetOk) => "basic.get-ok",
    BasicGetEmpty(basic::GetEmpty) => "basic.get-empty",
    BasicAck(basic::Ack) => "basic.ack",
    BasicReject(basic::Reject) => "basic.reject",
    BasicRecoverAsync(basic::RecoverAsync) => "basic.recover-async",
    BasicRecover(basic::Recover) => "basic.recover",
    BasicRecoverOk(basic::RecoverOk) => "basic.recover-ok",
    BasicNack(basic::Nack) => "basic.nack",

    ConfirmSelect(confirm::Select) => "confirm.select",
    ConfirmSelectOk(confirm::SelectOk) => "confirm.select-ok",

    TxSelect(tx::Select) => "tx.select",
    TxSelectOk(tx::SelectOk) => "tx.select-ok",
    TxCommit(tx::Commit) => "tx.commit",
    TxCommitOk(tx::CommitOk) => "tx.commit-ok",
    TxRollback(tx::Rollback) => "tx.rollback",
    TxRollbackOk(tx::RollbackOk) => "tx.rollback-ok",
}

impl Method {
    /// Decodes a method frame payload: class id, method id and arguments
    pub fn decode(mut src: Bytes) -> Result<Self, Error> {
        let class_id = codec::get_u16(&mut src)?;
        let method_id = codec::get_u16(&mut src)?;
        let mut reader = ArgReader::new(&mut src);
        let method = Self::read_args(MethodId::new(class_id, method_id), &mut reader)?;
        match reader.remaining() {
            0 => Ok(method),
            n => Err(Error::TrailingBytes(n)),
        }
    }

    /// Encodes the method as a method frame payload
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        let id = self.id();
        dst.put_u16(id.class_id);
        dst.put_u16(id.method_id);
        let mut writer = ArgWriter::new(dst);
        self.write_args(&mut writer)?;
        writer.finish();
        Ok(())
    }

    /// Whether the method is followed by a content header and body
    pub fn has_content(&self) -> bool {
        matches!(
            self,
            Method::BasicPublish(_)
                | Method::BasicReturn(_)
                | Method::BasicDeliver(_)
                | Method::BasicGetOk(_)
        )
    }

    /// Replies the peer may answer this method with. An empty slice means
    /// the method is asynchronous, either by definition or because its
    /// `no-wait` flag is set.
    pub fn responses(&self) -> &'static [MethodId] {
        match self {
            Method::ConnectionStartOk(_) => {
                &[connection::Secure::ID, connection::Tune::ID]
            }
            Method::ConnectionSecureOk(_) => {
                &[connection::Secure::ID, connection::Tune::ID]
            }
            Method::ConnectionOpen(_) => &[connection::OpenOk::ID],
            Method::ConnectionClose(_) => &[connection::CloseOk::ID],
            Method::ConnectionUpdateSecret(_) => &[connection::UpdateSecretOk::ID],

            Method::ChannelOpen(_) => &[channel::OpenOk::ID],
            Method::ChannelFlow(_) => &[channel::FlowOk::ID],
            Method::ChannelClose(_) => &[channel::CloseOk::ID],

            Method::ExchangeDeclare(m) if !m.no_wait => &[exchange::DeclareOk::ID],
            Method::ExchangeDelete(m) if !m.no_wait => &[exchange::DeleteOk::ID],
            Method::ExchangeBind(m) if !m.no_wait => &[exchange::BindOk::ID],
            Method::ExchangeUnbind(m) if !m.no_wait => &[exchange::UnbindOk::ID],

            Method::QueueDeclare(m) if !m.no_wait => &[queue::DeclareOk::ID],
            Method::QueueBind(m) if !m.no_wait => &[queue::BindOk::ID],
            Method::QueuePurge(m) if !m.no_wait => &[queue::PurgeOk::ID],
            Method::QueueDelete(m) if !m.no_wait => &[queue::DeleteOk::ID],
            Method::QueueUnbind(_) => &[queue::UnbindOk::ID],

            Method::BasicQos(_) => &[basic::QosOk::ID],
            Method::BasicConsume(m) if !m.no_wait => &[basic::ConsumeOk::ID],
            Method::BasicCancel(m) if !m.no_wait => &[basic::CancelOk::ID],
            Method::BasicGet(_) => &[basic::GetOk::ID, basic::GetEmpty::ID],
            Method::BasicRecover(_) => &[basic::RecoverOk::ID],

            Method::ConfirmSelect(m) if !m.no_wait => &[confirm::SelectOk::ID],

            Method::TxSelect(_) => &[tx::SelectOk::ID],
            Method::TxCommit(_) => &[tx::CommitOk::ID],
            Method::TxRollback(_) => &[tx::RollbackOk::ID],

            _ => &[],
        }
    }

    /// Whether the sender waits for a reply
    pub fn is_synchronous(&self) -> bool {
        !self.responses().is_empty()
    }

    /// Methods a broker pushes to a channel on its own initiative. They may
    /// arrive at any time, including while a call on the channel is waiting
    /// for its reply.
    pub fn is_server_push(&self) -> bool {
        matches!(
            self,
            Method::BasicDeliver(_)
                | Method::BasicReturn(_)
                | Method::BasicAck(_)
                | Method::BasicNack(_)
                | Method::BasicCancel(_)
                | Method::ChannelFlow(_)
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::{basic, connection, queue, Method, MethodId};
    use crate::{Error, FieldTable};

    fn encode(method: &Method) -> BytesMut {
        let mut dst = BytesMut::new();
        method.encode(&mut dst).unwrap();
        dst
    }

    #[test]
    fn tune_ok_layout_is_bit_exact() {
        let method = Method::from(connection::TuneOk {
            channel_max: 11,
            frame_max: 20000,
            heartbeat: 10,
        });
        let dst = encode(&method);
        assert_eq!(
            &dst[..],
            &[0, 10, 0, 31, 0, 11, 0, 0, 0x4e, 0x20, 0, 10]
        );
        assert_eq!(Method::decode(dst.freeze()).unwrap(), method);
    }

    #[test]
    fn queue_declare_packs_its_flags() {
        let method = Method::from(queue::Declare {
            reserved_1: 0,
            queue: "jobs".into(),
            passive: false,
            durable: true,
            exclusive: false,
            auto_delete: true,
            no_wait: false,
            arguments: FieldTable::new(),
        });
        let dst = encode(&method);
        // class, method, reserved, "jobs", flags, empty table
        assert_eq!(
            &dst[..],
            &[0, 50, 0, 10, 0, 0, 4, b'j', b'o', b'b', b's', 0b01010, 0, 0, 0, 0]
        );
        assert_eq!(Method::decode(dst.freeze()).unwrap(), method);
    }

    #[test]
    fn unknown_method_is_a_decode_error() {
        let src = Bytes::from_static(&[0, 60, 0, 99]);
        assert_eq!(
            Method::decode(src),
            Err(Error::UnknownMethod {
                class_id: 60,
                method_id: 99
            })
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let src = Bytes::from_static(&[0, 20, 0, 41, 0xAA]);
        assert_eq!(Method::decode(src), Err(Error::TrailingBytes(1)));
    }

    #[test]
    fn no_wait_turns_a_call_asynchronous() {
        let mut consume = basic::Consume {
            queue: "jobs".into(),
            ..Default::default()
        };
        assert_eq!(
            Method::from(consume.clone()).responses(),
            &[basic::ConsumeOk::ID]
        );

        consume.no_wait = true;
        assert!(!Method::from(consume).is_synchronous());
        assert!(!Method::from(basic::Publish::default()).is_synchronous());
    }

    #[test]
    fn get_accepts_two_replies() {
        let get = Method::from(basic::Get::default());
        assert_eq!(get.responses(), &[basic::GetOk::ID, basic::GetEmpty::ID]);
        assert!(Method::from(basic::GetOk::default()).has_content());
        assert!(!Method::from(basic::GetEmpty::default()).has_content());
    }

    #[test]
    fn names_follow_the_protocol_grammar() {
        assert_eq!(
            Method::from(queue::DeclareOk::default()).name(),
            "queue.declare-ok"
        );
        assert_eq!(
            Method::name_of(MethodId::new(60, 60)),
            Some("basic.deliver")
        );
        assert_eq!(Method::name_of(MethodId::new(1, 1)), None);
    }
}
