//! Channel handle and per-channel operations
//!
//! A [`Channel`] is a cheap clonable handle onto the channel engine task.
//! Every method builds a wire method, hands it to the engine over the
//! control queue and awaits the engine's settlement, so callers see plain
//! request/response semantics over the partially ordered frame stream.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use fe3o4_amqp_types::definitions::UNEXPECTED_FRAME;
use fe3o4_amqp_types::methods::{
    BasicAck, BasicConsume, BasicGet, BasicNack, BasicPublish, BasicQos, BasicRecover,
    BasicReject, ChannelFlow, ConfirmSelect, ExchangeBind, ExchangeDeclare, ExchangeDelete,
    ExchangeUnbind, Method, QueueBind, QueueDeclare, QueueDeclareOk, QueueDelete, QueuePurge,
    QueueUnbind,
};
use fe3o4_amqp_types::{BasicProperties, FieldTable, ShortString};

use crate::connection;
use crate::consumer::Consumer;
use crate::control::ChannelControl;
use crate::message::{GetMessage, ReturnedMessage};

pub(crate) mod engine;
mod error;

pub use error::Error;

/// Options for `queue.declare`
#[derive(Debug, Clone, Default)]
pub struct QueueDeclareOptions {
    /// Only check that the queue exists
    pub passive: bool,
    /// Survive a broker restart
    pub durable: bool,
    /// Only accessible by this connection, deleted when it closes
    pub exclusive: bool,
    /// Delete when the last consumer cancels
    pub auto_delete: bool,
    /// Optional broker-specific arguments
    pub arguments: FieldTable,
}

/// Options for `queue.delete`
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueDeleteOptions {
    /// Fail if the queue still has consumers
    pub if_unused: bool,
    /// Fail if the queue still has messages
    pub if_empty: bool,
}

/// Options for `exchange.declare`
#[derive(Debug, Clone, Default)]
pub struct ExchangeDeclareOptions {
    /// Only check that the exchange exists with the same type
    pub passive: bool,
    /// Survive a broker restart
    pub durable: bool,
    /// Delete when the last binding is removed
    pub auto_delete: bool,
    /// Only reachable through exchange-to-exchange bindings
    pub internal: bool,
    /// Optional broker-specific arguments
    pub arguments: FieldTable,
}

/// Options for `basic.publish`
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Hand the message back via `basic.return` if it cannot be routed
    pub mandatory: bool,
    /// Hand the message back if it cannot be delivered immediately
    /// (not implemented by RabbitMQ)
    pub immediate: bool,
}

/// Options for `basic.consume`
#[derive(Debug, Clone, Default)]
pub struct ConsumeOptions {
    /// Consumer tag; empty asks the broker to generate one
    pub consumer_tag: ShortString,
    /// Do not deliver messages published on this connection
    pub no_local: bool,
    /// The broker considers messages acknowledged once delivered
    pub no_ack: bool,
    /// Only this consumer may access the queue
    pub exclusive: bool,
    /// Optional consumer arguments
    pub arguments: FieldTable,
}

/// The engine's receipt for a publish.
///
/// Under confirm mode it carries the delivery tag assigned to the publish
/// and settles once the broker acks or nacks it. Outside confirm mode the
/// tag is 0 and [`wait`](PublisherConfirm::wait) resolves immediately.
#[derive(Debug)]
pub struct PublisherConfirm {
    pub(crate) delivery_tag: u64,
    pub(crate) confirm: Option<oneshot::Receiver<Result<(), Error>>>,
}

impl PublisherConfirm {
    /// The delivery tag the broker will confirm this publish under
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// Waits until the broker settles the publish
    pub async fn wait(self) -> Result<(), Error> {
        match self.confirm {
            None => Ok(()),
            Some(rx) => rx.await.map_err(|_| Error::Closed)?,
        }
    }
}

/// A handle onto one channel of an open connection
#[derive(Debug, Clone)]
pub struct Channel {
    pub(crate) id: u16,
    pub(crate) control: mpsc::Sender<ChannelControl>,
    pub(crate) close_cause: Arc<Mutex<Option<Error>>>,
    pub(crate) returns: Arc<Mutex<Option<mpsc::UnboundedReceiver<ReturnedMessage>>>>,
}

impl Channel {
    /// The channel id on the wire
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Whether the channel engine has stopped
    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    /// Takes the receiver of `basic.return` messages. Returns `None` after
    /// the first call; only one clone of the handle can own the stream.
    pub fn take_returns(&self) -> Option<mpsc::UnboundedReceiver<ReturnedMessage>> {
        self.returns.lock().take()
    }

    fn stored_cause(&self) -> Error {
        self.close_cause.lock().clone().unwrap_or(Error::Closed)
    }

    async fn rpc(&self, method: Method) -> Result<Method, Error> {
        let (responder, rx) = oneshot::channel();
        self.control
            .send(ChannelControl::Rpc { method, responder })
            .await
            .map_err(|_| self.stored_cause())?;
        rx.await.map_err(|_| self.stored_cause())?
    }

    fn unexpected_reply(reply: Method) -> Error {
        Error::Connection(connection::Error::protocol(
            UNEXPECTED_FRAME,
            format!("unexpected reply {}", reply.name()),
        ))
    }

    /// Declares a queue; an empty name asks the broker to generate one
    pub async fn queue_declare(
        &self,
        queue: &str,
        options: QueueDeclareOptions,
    ) -> Result<QueueDeclareOk, Error> {
        let method = Method::QueueDeclare(QueueDeclare {
            queue: queue.try_into()?,
            passive: options.passive,
            durable: options.durable,
            exclusive: options.exclusive,
            auto_delete: options.auto_delete,
            no_wait: false,
            arguments: options.arguments,
        });
        match self.rpc(method).await? {
            Method::QueueDeclareOk(ok) => Ok(ok),
            other => Err(Self::unexpected_reply(other)),
        }
    }

    /// Binds a queue to an exchange
    pub async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        self.rpc(Method::QueueBind(QueueBind {
            queue: queue.try_into()?,
            exchange: exchange.try_into()?,
            routing_key: routing_key.try_into()?,
            no_wait: false,
            arguments,
        }))
        .await?;
        Ok(())
    }

    /// Removes a queue binding
    pub async fn queue_unbind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        self.rpc(Method::QueueUnbind(QueueUnbind {
            queue: queue.try_into()?,
            exchange: exchange.try_into()?,
            routing_key: routing_key.try_into()?,
            arguments,
        }))
        .await?;
        Ok(())
    }

    /// Discards all messages in a queue that are not awaiting
    /// acknowledgment; returns how many were discarded
    pub async fn queue_purge(&self, queue: &str) -> Result<u32, Error> {
        let method = Method::QueuePurge(QueuePurge {
            queue: queue.try_into()?,
            no_wait: false,
        });
        match self.rpc(method).await? {
            Method::QueuePurgeOk(ok) => Ok(ok.message_count),
            other => Err(Self::unexpected_reply(other)),
        }
    }

    /// Deletes a queue; returns how many messages were discarded with it
    pub async fn queue_delete(
        &self,
        queue: &str,
        options: QueueDeleteOptions,
    ) -> Result<u32, Error> {
        let method = Method::QueueDelete(QueueDelete {
            queue: queue.try_into()?,
            if_unused: options.if_unused,
            if_empty: options.if_empty,
            no_wait: false,
        });
        match self.rpc(method).await? {
            Method::QueueDeleteOk(ok) => Ok(ok.message_count),
            other => Err(Self::unexpected_reply(other)),
        }
    }

    /// Declares an exchange of the given type (`direct`, `fanout`, `topic`,
    /// `headers`, or a custom type the broker knows)
    pub async fn exchange_declare(
        &self,
        exchange: &str,
        kind: &str,
        options: ExchangeDeclareOptions,
    ) -> Result<(), Error> {
        self.rpc(Method::ExchangeDeclare(ExchangeDeclare {
            exchange: exchange.try_into()?,
            kind: kind.try_into()?,
            passive: options.passive,
            durable: options.durable,
            auto_delete: options.auto_delete,
            internal: options.internal,
            no_wait: false,
            arguments: options.arguments,
        }))
        .await?;
        Ok(())
    }

    /// Deletes an exchange
    pub async fn exchange_delete(&self, exchange: &str, if_unused: bool) -> Result<(), Error> {
        self.rpc(Method::ExchangeDelete(ExchangeDelete {
            exchange: exchange.try_into()?,
            if_unused,
            no_wait: false,
        }))
        .await?;
        Ok(())
    }

    /// Binds an exchange to another exchange (RabbitMQ extension)
    pub async fn exchange_bind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        self.rpc(Method::ExchangeBind(ExchangeBind {
            destination: destination.try_into()?,
            source: source.try_into()?,
            routing_key: routing_key.try_into()?,
            no_wait: false,
            arguments,
        }))
        .await?;
        Ok(())
    }

    /// Removes an exchange-to-exchange binding (RabbitMQ extension)
    pub async fn exchange_unbind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        self.rpc(Method::ExchangeUnbind(ExchangeUnbind {
            destination: destination.try_into()?,
            source: source.try_into()?,
            routing_key: routing_key.try_into()?,
            no_wait: false,
            arguments,
        }))
        .await?;
        Ok(())
    }

    /// Bounds how many messages the broker sends ahead of acknowledgment
    pub async fn basic_qos(
        &self,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<(), Error> {
        self.rpc(Method::BasicQos(BasicQos {
            prefetch_size,
            prefetch_count,
            global,
        }))
        .await?;
        Ok(())
    }

    /// Publishes a message.
    ///
    /// Resolves as soon as the engine has queued the frames; the returned
    /// [`PublisherConfirm`] settles when the broker acks or nacks the
    /// publish (immediately outside confirm mode).
    pub async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        options: PublishOptions,
        properties: BasicProperties,
        body: impl Into<Bytes>,
    ) -> Result<PublisherConfirm, Error> {
        let publish = BasicPublish {
            exchange: exchange.try_into()?,
            routing_key: routing_key.try_into()?,
            mandatory: options.mandatory,
            immediate: options.immediate,
        };
        let (responder, rx) = oneshot::channel();
        self.control
            .send(ChannelControl::Publish {
                publish,
                properties,
                body: body.into(),
                responder,
            })
            .await
            .map_err(|_| self.stored_cause())?;
        rx.await.map_err(|_| self.stored_cause())?
    }

    /// Synchronously fetches one message, or `None` when the queue is empty
    pub async fn basic_get(&self, queue: &str, no_ack: bool) -> Result<Option<GetMessage>, Error> {
        let get = BasicGet {
            queue: queue.try_into()?,
            no_ack,
        };
        let (responder, rx) = oneshot::channel();
        self.control
            .send(ChannelControl::Get { get, responder })
            .await
            .map_err(|_| self.stored_cause())?;
        rx.await.map_err(|_| self.stored_cause())?
    }

    /// Starts a consumer on a queue
    pub async fn basic_consume(
        &self,
        queue: &str,
        options: ConsumeOptions,
    ) -> Result<Consumer, Error> {
        let consume = BasicConsume {
            queue: queue.try_into()?,
            consumer_tag: options.consumer_tag,
            no_local: options.no_local,
            no_ack: options.no_ack,
            exclusive: options.exclusive,
            no_wait: false,
            arguments: options.arguments,
        };
        let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (responder, rx) = oneshot::channel();
        self.control
            .send(ChannelControl::Consume {
                consume,
                deliveries: deliveries_tx,
                shutdown: shutdown_tx,
                responder,
            })
            .await
            .map_err(|_| self.stored_cause())?;
        let tag = rx.await.map_err(|_| self.stored_cause())??;
        Ok(Consumer::new(
            tag,
            deliveries_rx,
            shutdown_rx,
            self.control.clone(),
        ))
    }

    /// Acknowledges a delivery; with `multiple` every delivery up to and
    /// including the tag
    pub async fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), Error> {
        self.send(Method::BasicAck(BasicAck {
            delivery_tag,
            multiple,
        }))
        .await
    }

    /// Negatively acknowledges one or more deliveries (RabbitMQ extension)
    pub async fn basic_nack(
        &self,
        delivery_tag: u64,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), Error> {
        self.send(Method::BasicNack(BasicNack {
            delivery_tag,
            multiple,
            requeue,
        }))
        .await
    }

    /// Rejects a single delivery
    pub async fn basic_reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.send(Method::BasicReject(BasicReject {
            delivery_tag,
            requeue,
        }))
        .await
    }

    /// Asks the broker to redeliver every unacknowledged message on the
    /// channel
    pub async fn basic_recover(&self, requeue: bool) -> Result<(), Error> {
        self.rpc(Method::BasicRecover(BasicRecover { requeue }))
            .await?;
        Ok(())
    }

    /// Asks the broker to pause or resume delivery on this channel;
    /// returns the flow state the broker settled on
    pub async fn flow(&self, active: bool) -> Result<bool, Error> {
        match self.rpc(Method::ChannelFlow(ChannelFlow { active })).await? {
            Method::ChannelFlowOk(ok) => Ok(ok.active),
            other => Err(Self::unexpected_reply(other)),
        }
    }

    /// Puts the channel into publisher-confirm mode. Sticky; there is no
    /// way back short of closing the channel.
    pub async fn confirm_select(&self) -> Result<(), Error> {
        self.rpc(Method::ConfirmSelect(ConfirmSelect { no_wait: false }))
            .await?;
        Ok(())
    }

    /// Puts the channel into transaction mode. Sticky, and mutually
    /// exclusive with confirm mode.
    pub async fn tx_select(&self) -> Result<(), Error> {
        self.rpc(Method::TxSelect).await?;
        Ok(())
    }

    /// Commits the current transaction
    pub async fn tx_commit(&self) -> Result<(), Error> {
        self.rpc(Method::TxCommit).await?;
        Ok(())
    }

    /// Rolls back the current transaction
    pub async fn tx_rollback(&self) -> Result<(), Error> {
        self.rpc(Method::TxRollback).await?;
        Ok(())
    }

    async fn send(&self, method: Method) -> Result<(), Error> {
        self.control
            .send(ChannelControl::Send(method))
            .await
            .map_err(|_| self.stored_cause())
    }

    /// Closes the channel, rejecting queued operations and shutting down
    /// its consumers. Closing an already closed channel is a no-op.
    pub async fn close(self) -> Result<(), Error> {
        let (responder, rx) = oneshot::channel();
        if self
            .control
            .send(ChannelControl::Close { responder })
            .await
            .is_err()
        {
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }
}
