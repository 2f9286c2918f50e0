//! Messages sent from handles to the connection engine

use std::sync::Arc;

use amqp091_types::{methods::channel::Close, Method};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::{
    channel::{self, ChannelState},
    message::{Content, Message},
};

pub(crate) type CallResponder = oneshot::Sender<Result<Option<Message>, channel::Error>>;

#[derive(Debug)]
pub(crate) enum ConnectionControl {
    /// Close the connection
    Close,

    /// Allocate a channel id and register it with the engine
    AllocateChannel {
        responder: oneshot::Sender<Result<AllocatedChannel, channel::Error>>,
    },

    /// Send a method on a channel. The responder receives the reply of a
    /// synchronous method, or `None` once an asynchronous one is written.
    /// `state` tells the channel apart from a later one reusing its id
    Call {
        channel: u16,
        state: Arc<Mutex<ChannelState>>,
        method: Method,
        content: Option<Content>,
        responder: CallResponder,
    },

    /// Close a channel. Without a responder nobody waits for the close-ok
    CloseChannel {
        channel: u16,
        state: Arc<Mutex<ChannelState>>,
        close: Close,
        responder: Option<CallResponder>,
    },
}

impl ConnectionControl {
    /// Fails whatever handle is waiting on this request
    pub fn reject(self, err: channel::Error) {
        match self {
            ConnectionControl::Close => {}
            ConnectionControl::AllocateChannel { responder } => {
                let _ = responder.send(Err(err));
            }
            ConnectionControl::Call { responder, .. } => {
                let _ = responder.send(Err(err));
            }
            ConnectionControl::CloseChannel { responder, .. } => {
                if let Some(responder) = responder {
                    let _ = responder.send(Err(err));
                }
            }
        }
    }
}

/// What the engine hands back for a newly allocated channel
#[derive(Debug)]
pub(crate) struct AllocatedChannel {
    pub id: u16,
    pub state: Arc<Mutex<ChannelState>>,
    pub deliveries: mpsc::UnboundedReceiver<Result<Message, channel::Error>>,
}
