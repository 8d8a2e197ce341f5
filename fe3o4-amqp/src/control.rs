//! Control messages between handles and their engines

use bytes::Bytes;
use fe3o4_amqp_types::methods::{BasicCancel, BasicConsume, BasicGet, BasicPublish, Method};
use fe3o4_amqp_types::{BasicProperties, ShortString};
use tokio::sync::{mpsc::Sender, mpsc::UnboundedSender, oneshot};

use crate::channel::{self, PublisherConfirm};
use crate::connection;
use crate::frames::Frame;
use crate::message::{Delivery, GetMessage};

/// What the connection engine routes to each channel engine: a frame for
/// that channel, or the cause of a connection-wide teardown
pub(crate) type ChannelIncomingItem = Result<Frame, channel::Error>;

pub(crate) enum ConnectionControl {
    /// Reserve a channel id and register its incoming sender
    AllocateChannel {
        id: Option<u16>,
        tx: Sender<ChannelIncomingItem>,
        responder: oneshot::Sender<Result<u16, connection::Error>>,
    },
    /// Release a channel id after its engine stopped
    DeallocateChannel(u16),
    /// Close the connection gracefully
    Close {
        responder: oneshot::Sender<Result<(), connection::Error>>,
    },
    /// A channel engine observed a violation that is fatal to the whole
    /// connection
    ProtocolError(connection::Error),
}

pub(crate) enum ChannelControl {
    /// A synchronous method call: send the method, settle the responder
    /// with the matching reply
    Rpc {
        method: Method,
        responder: oneshot::Sender<Result<Method, channel::Error>>,
    },
    /// An asynchronous method call with no reply (ack, nack, reject)
    Send(Method),
    /// Publish a message; the responder carries the delivery tag assigned
    /// under confirm mode
    Publish {
        publish: BasicPublish,
        properties: BasicProperties,
        body: Bytes,
        responder: oneshot::Sender<Result<PublisherConfirm, channel::Error>>,
    },
    /// Start a consumer; the responder carries the (possibly
    /// server-generated) consumer tag
    Consume {
        consume: BasicConsume,
        deliveries: UnboundedSender<Delivery>,
        shutdown: oneshot::Sender<Result<(), channel::Error>>,
        responder: oneshot::Sender<Result<ShortString, channel::Error>>,
    },
    /// Cancel a consumer and deregister it
    Cancel {
        cancel: BasicCancel,
        responder: oneshot::Sender<Result<(), channel::Error>>,
    },
    /// Synchronously fetch one message
    Get {
        get: BasicGet,
        responder: oneshot::Sender<Result<Option<GetMessage>, channel::Error>>,
    },
    /// Close the channel gracefully
    Close {
        responder: oneshot::Sender<Result<(), channel::Error>>,
    },
}
