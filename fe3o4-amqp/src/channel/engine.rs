//! The channel engine: RPC correlation, publish confirms, consumers and
//! content reassembly
//!
//! One engine task per channel. Synchronous methods are queued FIFO and
//! settled strictly in order against the broker's replies; content-bearing
//! methods open the single reassembly slot and complete once the announced
//! body size has arrived. All channel state lives here and is only touched
//! from the event loop.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use fe3o4_amqp_types::definitions::{CLASS_EXCHANGE, REPLY_SUCCESS, UNEXPECTED_FRAME};
use fe3o4_amqp_types::methods::{
    BasicCancelOk, BasicDeliver, BasicGetOk, BasicReturn, ChannelClose, ChannelFlowOk, Method,
};
use fe3o4_amqp_types::{BasicProperties, ContentHeader, ShortString};

use crate::connection;
use crate::control::{ChannelControl, ChannelIncomingItem, ConnectionControl};
use crate::frames::Frame;
use crate::message::{Delivery, GetMessage, ReturnedMessage};
use crate::util::Running;

use super::{Error, PublisherConfirm};

/// Upper bound on the buffer reserved up front for an announced body;
/// the size field is peer-controlled
const BODY_PREALLOC_MAX: u64 = 128 * 1024;

/// A queued continuation awaiting the broker's synchronous reply
enum PendingRpc {
    Sync {
        request: (u16, u16),
        responder: oneshot::Sender<Result<Method, Error>>,
    },
    Consume {
        deliveries: mpsc::UnboundedSender<Delivery>,
        shutdown: oneshot::Sender<Result<(), Error>>,
        responder: oneshot::Sender<Result<ShortString, Error>>,
    },
    Cancel {
        tag: ShortString,
        responder: oneshot::Sender<Result<(), Error>>,
    },
    Get {
        responder: oneshot::Sender<Result<Option<GetMessage>, Error>>,
    },
    Close {
        responder: oneshot::Sender<Result<(), Error>>,
    },
}

impl PendingRpc {
    fn reject(self, cause: Error) {
        match self {
            PendingRpc::Sync { responder, .. } => {
                let _ = responder.send(Err(cause));
            }
            PendingRpc::Consume {
                responder,
                shutdown,
                ..
            } => {
                drop(shutdown);
                let _ = responder.send(Err(cause));
            }
            PendingRpc::Cancel { responder, .. } => {
                let _ = responder.send(Err(cause));
            }
            PendingRpc::Get { responder } => {
                let _ = responder.send(Err(cause));
            }
            PendingRpc::Close { responder } => {
                let _ = responder.send(Err(cause));
            }
        }
    }
}

/// Whether the broker's reply settles the request at the head of the RPC
/// queue. Replies carry the request's method id plus one, except for the
/// irregular `exchange.unbind-ok`.
fn reply_matches(request: (u16, u16), reply: (u16, u16)) -> bool {
    let (req_class, req_method) = request;
    let (reply_class, reply_method) = reply;
    req_class == reply_class
        && match (req_class, req_method) {
            (CLASS_EXCHANGE, 40) => reply_method == 51,
            _ => reply_method == req_method + 1,
        }
}

enum ContentDestination {
    Deliver(BasicDeliver),
    Get {
        ok: BasicGetOk,
        responder: oneshot::Sender<Result<Option<GetMessage>, Error>>,
    },
    Return(BasicReturn),
}

/// The single reassembly slot. `properties` stays `None` until the content
/// header frame arrives.
struct PendingContent {
    destination: ContentDestination,
    properties: Option<BasicProperties>,
    body_size: u64,
    body: Vec<u8>,
}

struct ConsumerEntry {
    deliveries: mpsc::UnboundedSender<Delivery>,
    shutdown: Option<oneshot::Sender<Result<(), Error>>>,
}

pub(crate) struct ChannelEngine {
    id: u16,
    incoming: mpsc::Receiver<ChannelIncomingItem>,
    control: mpsc::Receiver<ChannelControl>,
    outgoing: mpsc::Sender<Frame>,
    conn_control: mpsc::Sender<ConnectionControl>,
    close_cause: Arc<Mutex<Option<Error>>>,
    returns: mpsc::UnboundedSender<ReturnedMessage>,

    rpc_queue: VecDeque<PendingRpc>,
    unconfirmed: VecDeque<(u64, oneshot::Sender<Result<(), Error>>)>,
    next_publish_tag: u64,
    confirm_mode: bool,
    tx_mode: bool,
    flow_active: bool,
    consumers: HashMap<ShortString, ConsumerEntry>,
    pending_content: Option<PendingContent>,
}

impl ChannelEngine {
    /// Opens the channel on the wire (`channel.open` / `open-ok`) without
    /// starting the event loop
    pub(crate) async fn open(
        id: u16,
        incoming: mpsc::Receiver<ChannelIncomingItem>,
        control: mpsc::Receiver<ChannelControl>,
        outgoing: mpsc::Sender<Frame>,
        conn_control: mpsc::Sender<ConnectionControl>,
        close_cause: Arc<Mutex<Option<Error>>>,
        returns: mpsc::UnboundedSender<ReturnedMessage>,
    ) -> Result<Self, Error> {
        let mut engine = Self {
            id,
            incoming,
            control,
            outgoing,
            conn_control,
            close_cause,
            returns,
            rpc_queue: VecDeque::new(),
            unconfirmed: VecDeque::new(),
            next_publish_tag: 1,
            confirm_mode: false,
            tx_mode: false,
            flow_active: true,
            consumers: HashMap::new(),
            pending_content: None,
        };

        engine.send_method(Method::ChannelOpen).await?;
        match engine.incoming.recv().await {
            Some(Ok(Frame::Method {
                method: Method::ChannelOpenOk,
                ..
            })) => {
                debug!(channel = id, "channel opened");
                Ok(engine)
            }
            Some(Ok(frame)) => {
                let err = connection::Error::protocol(
                    UNEXPECTED_FRAME,
                    format!("expected channel.open-ok, got {frame:?}"),
                );
                let _ = engine
                    .conn_control
                    .send(ConnectionControl::ProtocolError(err.clone()))
                    .await;
                Err(Error::Connection(err))
            }
            Some(Err(cause)) => Err(cause),
            None => Err(Error::Closed),
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.event_loop())
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.outgoing.send(frame).await.map_err(|_| Error::Closed)
    }

    async fn send_method(&mut self, method: Method) -> Result<(), Error> {
        let channel = self.id;
        self.send_frame(Frame::Method { channel, method }).await
    }

    async fn event_loop(mut self) {
        loop {
            let running = tokio::select! {
                item = self.incoming.recv() => match item {
                    Some(Ok(frame)) => self.on_incoming(frame).await,
                    Some(Err(cause)) => {
                        self.teardown(Err(cause)).await;
                        Running::Stop
                    }
                    None => {
                        self.teardown(Err(Error::Closed)).await;
                        Running::Stop
                    }
                },
                command = self.control.recv() => match command {
                    Some(command) => self.on_control(command).await,
                    // every handle and consumer is gone
                    None => self.close_on_drop().await,
                },
            };
            if let Running::Stop = running {
                break;
            }
        }
        debug!(channel = self.id, "channel engine stopped");
    }

    /// All handles were dropped without an explicit close; close the
    /// channel on the wire and drain until the broker confirms
    async fn close_on_drop(&mut self) -> Running {
        let close = ChannelClose {
            reply_code: REPLY_SUCCESS,
            reply_text: "Goodbye".try_into().unwrap_or_default(),
            class_id: 0,
            method_id: 0,
        };
        if self.send_method(Method::ChannelClose(close)).await.is_ok() {
            loop {
                match self.incoming.recv().await {
                    Some(Ok(Frame::Method {
                        method: Method::ChannelCloseOk,
                        ..
                    })) => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) | None => break,
                }
            }
        }
        self.teardown(Ok(())).await;
        Running::Stop
    }

    /// Reports a violation that is fatal to the whole connection, then
    /// tears this channel down with it as the cause
    async fn fault(&mut self, err: connection::Error) -> Running {
        let _ = self
            .conn_control
            .send(ConnectionControl::ProtocolError(err.clone()))
            .await;
        self.teardown(Err(Error::Connection(err))).await;
        Running::Stop
    }

    /// Settles every queued continuation and records the closing cause.
    /// `Ok` means a graceful close; consumers also treat a plain
    /// connection close as graceful.
    async fn teardown(&mut self, outcome: Result<(), Error>) {
        let cause = outcome.clone().err().unwrap_or(Error::Closed);
        debug!(
            channel = self.id,
            confirm = self.confirm_mode,
            tx = self.tx_mode,
            %cause,
            "tearing down channel"
        );

        for rpc in self.rpc_queue.drain(..) {
            rpc.reject(cause.clone());
        }
        for (tag, confirm) in self.unconfirmed.drain(..) {
            debug!(channel = self.id, tag, "rejecting unconfirmed publish");
            let _ = confirm.send(Err(cause.clone()));
        }
        if let Some(content) = self.pending_content.take() {
            if let ContentDestination::Get { responder, .. } = content.destination {
                let _ = responder.send(Err(cause.clone()));
            }
        }

        let consumer_outcome = match &outcome {
            Ok(()) => Ok(()),
            Err(Error::Closed) => Ok(()),
            Err(err) => Err(err.clone()),
        };
        for (_, mut entry) in self.consumers.drain() {
            if let Some(shutdown) = entry.shutdown.take() {
                let _ = shutdown.send(consumer_outcome.clone());
            }
        }

        *self.close_cause.lock() = Some(cause);
        let _ = self
            .conn_control
            .send(ConnectionControl::DeallocateChannel(self.id))
            .await;
        self.incoming.close();
        self.control.close();
    }

    async fn on_control(&mut self, command: ChannelControl) -> Running {
        match command {
            ChannelControl::Rpc { method, responder } => {
                let request = method.ids();
                if self.send_method(method).await.is_err() {
                    let _ = responder.send(Err(Error::Closed));
                    self.teardown(Err(Error::Closed)).await;
                    return Running::Stop;
                }
                self.rpc_queue.push_back(PendingRpc::Sync { request, responder });
            }
            ChannelControl::Send(method) => {
                if self.send_method(method).await.is_err() {
                    self.teardown(Err(Error::Closed)).await;
                    return Running::Stop;
                }
            }
            ChannelControl::Publish {
                publish,
                properties,
                body,
                responder,
            } => return self.on_publish(publish, properties, body, responder).await,
            ChannelControl::Consume {
                consume,
                deliveries,
                shutdown,
                responder,
            } => {
                if self.send_method(Method::BasicConsume(consume)).await.is_err() {
                    let _ = responder.send(Err(Error::Closed));
                    self.teardown(Err(Error::Closed)).await;
                    return Running::Stop;
                }
                self.rpc_queue.push_back(PendingRpc::Consume {
                    deliveries,
                    shutdown,
                    responder,
                });
            }
            ChannelControl::Cancel { cancel, responder } => {
                let tag = cancel.consumer_tag.clone();
                if self.send_method(Method::BasicCancel(cancel)).await.is_err() {
                    let _ = responder.send(Err(Error::Closed));
                    self.teardown(Err(Error::Closed)).await;
                    return Running::Stop;
                }
                self.rpc_queue.push_back(PendingRpc::Cancel { tag, responder });
            }
            ChannelControl::Get { get, responder } => {
                if self.send_method(Method::BasicGet(get)).await.is_err() {
                    let _ = responder.send(Err(Error::Closed));
                    self.teardown(Err(Error::Closed)).await;
                    return Running::Stop;
                }
                self.rpc_queue.push_back(PendingRpc::Get { responder });
            }
            ChannelControl::Close { responder } => {
                let close = ChannelClose {
                    reply_code: REPLY_SUCCESS,
                    reply_text: "Goodbye".try_into().unwrap_or_default(),
                    class_id: 0,
                    method_id: 0,
                };
                if self.send_method(Method::ChannelClose(close)).await.is_err() {
                    let _ = responder.send(Ok(()));
                    self.teardown(Ok(())).await;
                    return Running::Stop;
                }
                self.rpc_queue.push_back(PendingRpc::Close { responder });
            }
        }
        Running::Continue
    }

    async fn on_publish(
        &mut self,
        publish: fe3o4_amqp_types::methods::BasicPublish,
        properties: BasicProperties,
        body: Bytes,
        responder: oneshot::Sender<Result<PublisherConfirm, Error>>,
    ) -> Running {
        if !self.flow_active {
            warn!(channel = self.id, "publishing while the broker asked to pause flow");
        }

        let header = ContentHeader::basic(body.len() as u64, properties);
        let frames = [
            Some(Frame::Method {
                channel: self.id,
                method: Method::BasicPublish(publish),
            }),
            Some(Frame::Header {
                channel: self.id,
                header,
            }),
            (!body.is_empty()).then(|| Frame::Body {
                channel: self.id,
                payload: body,
            }),
        ];
        for frame in frames.into_iter().flatten() {
            if self.send_frame(frame).await.is_err() {
                let _ = responder.send(Err(Error::Closed));
                self.teardown(Err(Error::Closed)).await;
                return Running::Stop;
            }
        }

        let confirm = if self.confirm_mode {
            let tag = self.next_publish_tag;
            self.next_publish_tag += 1;
            let (tx, rx) = oneshot::channel();
            self.unconfirmed.push_back((tag, tx));
            PublisherConfirm {
                delivery_tag: tag,
                confirm: Some(rx),
            }
        } else {
            PublisherConfirm {
                delivery_tag: 0,
                confirm: None,
            }
        };
        let _ = responder.send(Ok(confirm));
        Running::Continue
    }

    async fn on_incoming(&mut self, frame: Frame) -> Running {
        match frame {
            Frame::Method { method, .. } => self.on_incoming_method(method).await,
            Frame::Header { header, .. } => self.on_content_header(header).await,
            Frame::Body { payload, .. } => self.on_content_body(payload).await,
            // heartbeats belong to channel 0 and never reach here
            Frame::Heartbeat { .. } => Running::Continue,
        }
    }

    async fn on_incoming_method(&mut self, method: Method) -> Running {
        match method {
            Method::BasicDeliver(deliver) => {
                self.start_content(ContentDestination::Deliver(deliver)).await
            }
            Method::BasicReturn(ret) => self.start_content(ContentDestination::Return(ret)).await,
            Method::BasicGetOk(ok) => match self.rpc_queue.pop_front() {
                Some(PendingRpc::Get { responder }) => {
                    self.start_content(ContentDestination::Get { ok, responder }).await
                }
                head => self.unexpected_reply(head, "basic.get-ok").await,
            },
            Method::BasicGetEmpty => match self.rpc_queue.pop_front() {
                Some(PendingRpc::Get { responder }) => {
                    let _ = responder.send(Ok(None));
                    Running::Continue
                }
                head => self.unexpected_reply(head, "basic.get-empty").await,
            },
            Method::BasicAck(ack) => {
                self.settle_confirms(ack.delivery_tag, ack.multiple, true);
                Running::Continue
            }
            Method::BasicNack(nack) => {
                self.settle_confirms(nack.delivery_tag, nack.multiple, false);
                Running::Continue
            }
            Method::BasicCancel(cancel) => {
                // the broker cancelled the consumer, e.g. its queue was
                // deleted
                if let Some(mut entry) = self.consumers.remove(&cancel.consumer_tag) {
                    if let Some(shutdown) = entry.shutdown.take() {
                        let _ = shutdown
                            .send(Err(Error::CancelledByServer(cancel.consumer_tag.clone())));
                    }
                }
                if !cancel.no_wait {
                    let reply = Method::BasicCancelOk(BasicCancelOk {
                        consumer_tag: cancel.consumer_tag,
                    });
                    if self.send_method(reply).await.is_err() {
                        self.teardown(Err(Error::Closed)).await;
                        return Running::Stop;
                    }
                }
                Running::Continue
            }
            Method::ChannelFlow(flow) => {
                self.flow_active = flow.active;
                debug!(channel = self.id, active = flow.active, "flow changed by broker");
                let reply = Method::ChannelFlowOk(ChannelFlowOk { active: flow.active });
                if self.send_method(reply).await.is_err() {
                    self.teardown(Err(Error::Closed)).await;
                    return Running::Stop;
                }
                Running::Continue
            }
            Method::ChannelClose(close) => {
                let cause = Error::ClosedByBroker {
                    reply_code: close.reply_code,
                    reply_text: close.reply_text.to_string(),
                    class_id: close.class_id,
                    method_id: close.method_id,
                };
                let _ = self.send_method(Method::ChannelCloseOk).await;
                self.teardown(Err(cause)).await;
                Running::Stop
            }
            reply => self.on_sync_reply(reply).await,
        }
    }

    /// Settles the head of the RPC queue with a synchronous reply
    async fn on_sync_reply(&mut self, reply: Method) -> Running {
        match self.rpc_queue.pop_front() {
            Some(PendingRpc::Sync { request, responder })
                if reply_matches(request, reply.ids()) =>
            {
                self.apply_reply(&reply);
                let _ = responder.send(Ok(reply));
                Running::Continue
            }
            Some(PendingRpc::Consume {
                deliveries,
                shutdown,
                responder,
            }) => match reply {
                Method::BasicConsumeOk(ok) => {
                    self.consumers.insert(
                        ok.consumer_tag.clone(),
                        ConsumerEntry {
                            deliveries,
                            shutdown: Some(shutdown),
                        },
                    );
                    debug!(channel = self.id, tag = %ok.consumer_tag, "consumer registered");
                    let _ = responder.send(Ok(ok.consumer_tag));
                    Running::Continue
                }
                other => {
                    self.unexpected_reply(
                        Some(PendingRpc::Consume {
                            deliveries,
                            shutdown,
                            responder,
                        }),
                        other.name(),
                    )
                    .await
                }
            },
            Some(PendingRpc::Cancel { tag, responder }) => match reply {
                Method::BasicCancelOk(ok) if ok.consumer_tag == tag => {
                    if let Some(mut entry) = self.consumers.remove(&tag) {
                        if let Some(shutdown) = entry.shutdown.take() {
                            let _ = shutdown.send(Ok(()));
                        }
                    }
                    let _ = responder.send(Ok(()));
                    Running::Continue
                }
                other => {
                    self.unexpected_reply(Some(PendingRpc::Cancel { tag, responder }), other.name())
                        .await
                }
            },
            Some(PendingRpc::Close { responder }) => match reply {
                Method::ChannelCloseOk => {
                    self.teardown(Ok(())).await;
                    let _ = responder.send(Ok(()));
                    Running::Stop
                }
                other => {
                    self.unexpected_reply(Some(PendingRpc::Close { responder }), other.name())
                        .await
                }
            },
            head => self.unexpected_reply(head, reply.name()).await,
        }
    }

    /// A reply arrived that matches no expectation at the head of the
    /// queue; this is fatal to the connection
    async fn unexpected_reply(&mut self, head: Option<PendingRpc>, got: &str) -> Running {
        let err = connection::Error::protocol(
            UNEXPECTED_FRAME,
            format!("unexpected {got} on channel {}", self.id),
        );
        if let Some(rpc) = head {
            rpc.reject(Error::Connection(err.clone()));
        }
        self.fault(err).await
    }

    /// Flags that stick once their select round-trips
    fn apply_reply(&mut self, reply: &Method) {
        match reply {
            Method::ConfirmSelectOk => {
                self.confirm_mode = true;
                debug!(channel = self.id, "entered confirm mode");
            }
            Method::TxSelectOk => {
                self.tx_mode = true;
                debug!(channel = self.id, "entered transaction mode");
            }
            Method::ChannelFlowOk(ok) => {
                self.flow_active = ok.active;
            }
            _ => {}
        }
    }

    /// Resolves (`acked`) or rejects publisher confirms. With `multiple`
    /// every tag up to and including `tag` settles; unknown tags are a
    /// no-op.
    fn settle_confirms(&mut self, tag: u64, multiple: bool, acked: bool) {
        if multiple {
            while self
                .unconfirmed
                .front()
                .is_some_and(|(pending, _)| *pending <= tag)
            {
                if let Some((pending, confirm)) = self.unconfirmed.pop_front() {
                    let outcome = if acked { Ok(()) } else { Err(Error::Nacked(pending)) };
                    let _ = confirm.send(outcome);
                }
            }
        } else if let Some(pos) = self.unconfirmed.iter().position(|(pending, _)| *pending == tag) {
            if let Some((pending, confirm)) = self.unconfirmed.remove(pos) {
                let outcome = if acked { Ok(()) } else { Err(Error::Nacked(pending)) };
                let _ = confirm.send(outcome);
            }
        }
    }

    /// Opens the reassembly slot for an announced content
    async fn start_content(&mut self, destination: ContentDestination) -> Running {
        if self.pending_content.is_some() {
            return self
                .fault(connection::Error::protocol(
                    UNEXPECTED_FRAME,
                    format!("content announced while reassembly in progress on channel {}", self.id),
                ))
                .await;
        }
        self.pending_content = Some(PendingContent {
            destination,
            properties: None,
            body_size: 0,
            body: Vec::new(),
        });
        Running::Continue
    }

    async fn on_content_header(&mut self, header: ContentHeader) -> Running {
        match &mut self.pending_content {
            Some(content) if content.properties.is_none() => {
                content.body_size = header.body_size;
                content.properties = Some(header.properties);
                content.body.reserve(header.body_size.min(BODY_PREALLOC_MAX) as usize);
                if header.body_size == 0 {
                    if let Some(content) = self.pending_content.take() {
                        self.dispatch_content(content);
                    }
                }
                Running::Continue
            }
            _ => {
                self.fault(connection::Error::protocol(
                    UNEXPECTED_FRAME,
                    format!("unexpected content header on channel {}", self.id),
                ))
                .await
            }
        }
    }

    async fn on_content_body(&mut self, payload: Bytes) -> Running {
        match &mut self.pending_content {
            Some(content) if content.properties.is_some() => {
                content.body.extend_from_slice(&payload);
                if content.body.len() as u64 > content.body_size {
                    return self
                        .fault(connection::Error::protocol(
                            UNEXPECTED_FRAME,
                            format!("content body exceeds announced size on channel {}", self.id),
                        ))
                        .await;
                }
                if content.body.len() as u64 == content.body_size {
                    if let Some(content) = self.pending_content.take() {
                        self.dispatch_content(content);
                    }
                }
                Running::Continue
            }
            _ => {
                self.fault(connection::Error::protocol(
                    UNEXPECTED_FRAME,
                    format!("unexpected content body on channel {}", self.id),
                ))
                .await
            }
        }
    }

    /// Routes a fully reassembled content to its destination
    fn dispatch_content(&mut self, content: PendingContent) {
        let properties = content.properties.unwrap_or_default();
        let body = content.body;
        match content.destination {
            ContentDestination::Deliver(deliver) => {
                match self.consumers.get(&deliver.consumer_tag) {
                    Some(entry) => {
                        let delivery = Delivery {
                            consumer_tag: deliver.consumer_tag,
                            delivery_tag: deliver.delivery_tag,
                            redelivered: deliver.redelivered,
                            exchange: deliver.exchange,
                            routing_key: deliver.routing_key,
                            properties,
                            body,
                        };
                        // the consumer may have been dropped; its acks are
                        // the broker's problem then
                        let _ = entry.deliveries.send(delivery);
                    }
                    None => {
                        debug!(
                            channel = self.id,
                            tag = %deliver.consumer_tag,
                            "dropping delivery for unknown consumer"
                        );
                    }
                }
            }
            ContentDestination::Get { ok, responder } => {
                let message = GetMessage {
                    delivery_tag: ok.delivery_tag,
                    redelivered: ok.redelivered,
                    exchange: ok.exchange,
                    routing_key: ok.routing_key,
                    message_count: ok.message_count,
                    properties,
                    body,
                };
                let _ = responder.send(Ok(Some(message)));
            }
            ContentDestination::Return(ret) => {
                let returned = ReturnedMessage {
                    reply_code: ret.reply_code,
                    reply_text: ret.reply_text,
                    exchange: ret.exchange,
                    routing_key: ret.routing_key,
                    properties,
                    body,
                };
                let _ = self.returns.send(returned);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fe3o4_amqp_types::methods::{BasicAck, BasicCancel, BasicConsumeOk, BasicNack, QueueDeclareOk};
    use fe3o4_amqp_types::FieldTable;

    use crate::channel::{Channel, ConsumeOptions, PublishOptions};
    use crate::consumer::WaitError;

    use super::*;

    struct Rig {
        channel: Channel,
        incoming: mpsc::Sender<ChannelIncomingItem>,
        outgoing: mpsc::Receiver<Frame>,
        conn_control: mpsc::Receiver<ConnectionControl>,
        returns: mpsc::UnboundedReceiver<ReturnedMessage>,
    }

    impl Rig {
        async fn open() -> Self {
            let (incoming_tx, incoming_rx) = mpsc::channel(32);
            let (control_tx, control_rx) = mpsc::channel(32);
            let (outgoing_tx, mut outgoing_rx) = mpsc::channel(32);
            let (conn_tx, conn_rx) = mpsc::channel(32);
            let (returns_tx, returns_rx) = mpsc::unbounded_channel();
            let close_cause = Arc::new(Mutex::new(None));

            incoming_tx
                .send(Ok(Frame::Method {
                    channel: 1,
                    method: Method::ChannelOpenOk,
                }))
                .await
                .unwrap();
            let engine = ChannelEngine::open(
                1,
                incoming_rx,
                control_rx,
                outgoing_tx,
                conn_tx,
                close_cause.clone(),
                returns_tx,
            )
            .await
            .unwrap();
            assert_eq!(
                outgoing_rx.recv().await.unwrap(),
                Frame::Method {
                    channel: 1,
                    method: Method::ChannelOpen
                }
            );
            let _ = engine.spawn();

            let channel = Channel {
                id: 1,
                control: control_tx,
                close_cause,
                returns: Arc::new(Mutex::new(None)),
            };
            Self {
                channel,
                incoming: incoming_tx,
                outgoing: outgoing_rx,
                conn_control: conn_rx,
                returns: returns_rx,
            }
        }

        async fn inject(&self, method: Method) {
            self.incoming
                .send(Ok(Frame::Method { channel: 1, method }))
                .await
                .unwrap();
        }

        async fn next_out(&mut self) -> Frame {
            self.outgoing.recv().await.unwrap()
        }

        async fn enter_confirm_mode(&mut self) {
            let channel = self.channel.clone();
            let select = tokio::spawn(async move { channel.confirm_select().await });
            assert!(matches!(
                self.next_out().await,
                Frame::Method {
                    method: Method::ConfirmSelect(_),
                    ..
                }
            ));
            self.inject(Method::ConfirmSelectOk).await;
            select.await.unwrap().unwrap();
        }
    }

    fn declare_ok(queue: &str) -> Method {
        Method::QueueDeclareOk(QueueDeclareOk {
            queue: queue.try_into().unwrap(),
            message_count: 0,
            consumer_count: 0,
        })
    }

    #[tokio::test]
    async fn rpc_replies_settle_in_fifo_order() {
        let mut rig = Rig::open().await;
        let first = rig.channel.clone();
        let declare =
            tokio::spawn(async move { first.queue_declare("tasks", Default::default()).await });
        let second = rig.channel.clone();
        assert!(matches!(
            rig.next_out().await,
            Frame::Method {
                method: Method::QueueDeclare(_),
                ..
            }
        ));
        let bind = tokio::spawn(async move {
            second.queue_bind("tasks", "amq.topic", "#", FieldTable::new()).await
        });
        assert!(matches!(
            rig.next_out().await,
            Frame::Method {
                method: Method::QueueBind(_),
                ..
            }
        ));

        rig.inject(declare_ok("tasks")).await;
        rig.inject(Method::QueueBindOk).await;

        let ok = declare.await.unwrap().unwrap();
        assert_eq!(ok.queue.as_str(), "tasks");
        bind.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn mismatched_reply_is_fatal_to_the_connection() {
        let mut rig = Rig::open().await;
        let channel = rig.channel.clone();
        let declare =
            tokio::spawn(async move { channel.queue_declare("tasks", Default::default()).await });
        rig.next_out().await;

        rig.inject(Method::QueueBindOk).await;

        assert!(matches!(
            rig.conn_control.recv().await,
            Some(ConnectionControl::ProtocolError(_))
        ));
        assert!(declare.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn confirm_tags_count_up_and_settle_by_range() {
        let mut rig = Rig::open().await;
        rig.enter_confirm_mode().await;

        let mut confirms = Vec::new();
        for _ in 0..3 {
            let confirm = rig
                .channel
                .basic_publish(
                    "",
                    "tasks",
                    PublishOptions::default(),
                    BasicProperties::default(),
                    &b"payload"[..],
                )
                .await
                .unwrap();
            // publish emits method, header and body frames
            rig.next_out().await;
            rig.next_out().await;
            rig.next_out().await;
            confirms.push(confirm);
        }
        assert_eq!(
            confirms.iter().map(|c| c.delivery_tag()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        // ack 1..=2 in one go, nack 3
        rig.inject(Method::BasicAck(BasicAck {
            delivery_tag: 2,
            multiple: true,
        }))
        .await;
        rig.inject(Method::BasicNack(BasicNack {
            delivery_tag: 3,
            multiple: false,
            requeue: false,
        }))
        .await;

        let mut confirms = confirms.into_iter();
        confirms.next().unwrap().wait().await.unwrap();
        confirms.next().unwrap().wait().await.unwrap();
        assert!(matches!(
            confirms.next().unwrap().wait().await,
            Err(Error::Nacked(3))
        ));
    }

    #[tokio::test]
    async fn publishes_without_confirm_mode_settle_immediately() {
        let mut rig = Rig::open().await;
        let confirm = rig
            .channel
            .basic_publish(
                "",
                "tasks",
                PublishOptions::default(),
                BasicProperties::default(),
                &b"x"[..],
            )
            .await
            .unwrap();
        rig.next_out().await;
        rig.next_out().await;
        rig.next_out().await;
        assert_eq!(confirm.delivery_tag(), 0);
        confirm.wait().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_confirm_tag_is_a_no_op() {
        let mut rig = Rig::open().await;
        rig.enter_confirm_mode().await;
        let confirm = rig
            .channel
            .basic_publish(
                "",
                "tasks",
                PublishOptions::default(),
                BasicProperties::default(),
                &b"x"[..],
            )
            .await
            .unwrap();
        rig.next_out().await;
        rig.next_out().await;
        rig.next_out().await;

        rig.inject(Method::BasicAck(BasicAck {
            delivery_tag: 99,
            multiple: false,
        }))
        .await;
        rig.inject(Method::BasicAck(BasicAck {
            delivery_tag: 1,
            multiple: false,
        }))
        .await;
        confirm.wait().await.unwrap();
    }

    async fn start_consumer(rig: &mut Rig, tag: &str) -> crate::consumer::Consumer {
        let channel = rig.channel.clone();
        let options = ConsumeOptions {
            consumer_tag: tag.try_into().unwrap(),
            ..Default::default()
        };
        let consume =
            tokio::spawn(async move { channel.basic_consume("tasks", options).await });
        assert!(matches!(
            rig.next_out().await,
            Frame::Method {
                method: Method::BasicConsume(_),
                ..
            }
        ));
        rig.inject(Method::BasicConsumeOk(BasicConsumeOk {
            consumer_tag: tag.try_into().unwrap(),
        }))
        .await;
        consume.await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn deliveries_reassemble_across_body_frames() {
        let mut rig = Rig::open().await;
        let mut consumer = start_consumer(&mut rig, "ctag-1").await;

        rig.inject(Method::BasicDeliver(BasicDeliver {
            consumer_tag: "ctag-1".try_into().unwrap(),
            delivery_tag: 7,
            redelivered: false,
            exchange: "events".try_into().unwrap(),
            routing_key: "task.created".try_into().unwrap(),
        }))
        .await;
        rig.incoming
            .send(Ok(Frame::Header {
                channel: 1,
                header: ContentHeader::basic(11, BasicProperties::default()),
            }))
            .await
            .unwrap();
        for chunk in [&b"hello "[..], &b"world"[..]] {
            rig.incoming
                .send(Ok(Frame::Body {
                    channel: 1,
                    payload: Bytes::copy_from_slice(chunk),
                }))
                .await
                .unwrap();
        }

        let delivery = consumer.recv().await.unwrap();
        assert_eq!(delivery.delivery_tag, 7);
        assert_eq!(delivery.body, b"hello world");
    }

    #[tokio::test]
    async fn zero_length_bodies_complete_at_the_header() {
        let mut rig = Rig::open().await;
        let mut consumer = start_consumer(&mut rig, "ctag-1").await;

        rig.inject(Method::BasicDeliver(BasicDeliver {
            consumer_tag: "ctag-1".try_into().unwrap(),
            delivery_tag: 1,
            redelivered: false,
            exchange: "".try_into().unwrap(),
            routing_key: "tasks".try_into().unwrap(),
        }))
        .await;
        rig.incoming
            .send(Ok(Frame::Header {
                channel: 1,
                header: ContentHeader::basic(0, BasicProperties::default()),
            }))
            .await
            .unwrap();

        let delivery = consumer.recv().await.unwrap();
        assert!(delivery.body.is_empty());
    }

    #[tokio::test]
    async fn get_resolves_none_on_empty_and_some_with_content() {
        let mut rig = Rig::open().await;

        let channel = rig.channel.clone();
        let get = tokio::spawn(async move { channel.basic_get("tasks", false).await });
        rig.next_out().await;
        rig.inject(Method::BasicGetEmpty).await;
        assert!(get.await.unwrap().unwrap().is_none());

        let channel = rig.channel.clone();
        let get = tokio::spawn(async move { channel.basic_get("tasks", false).await });
        rig.next_out().await;
        rig.inject(Method::BasicGetOk(BasicGetOk {
            delivery_tag: 4,
            redelivered: true,
            exchange: "".try_into().unwrap(),
            routing_key: "tasks".try_into().unwrap(),
            message_count: 2,
        }))
        .await;
        rig.incoming
            .send(Ok(Frame::Header {
                channel: 1,
                header: ContentHeader::basic(3, BasicProperties::default()),
            }))
            .await
            .unwrap();
        rig.incoming
            .send(Ok(Frame::Body {
                channel: 1,
                payload: Bytes::from_static(b"msg"),
            }))
            .await
            .unwrap();

        let message = get.await.unwrap().unwrap().unwrap();
        assert_eq!(message.delivery_tag, 4);
        assert_eq!(message.message_count, 2);
        assert_eq!(message.body, b"msg");
    }

    #[tokio::test]
    async fn content_announced_while_busy_is_fatal() {
        let mut rig = Rig::open().await;
        let _consumer = start_consumer(&mut rig, "ctag-1").await;

        let deliver = BasicDeliver {
            consumer_tag: "ctag-1".try_into().unwrap(),
            delivery_tag: 1,
            redelivered: false,
            exchange: "".try_into().unwrap(),
            routing_key: "tasks".try_into().unwrap(),
        };
        rig.inject(Method::BasicDeliver(deliver.clone())).await;
        rig.inject(Method::BasicDeliver(deliver)).await;

        assert!(matches!(
            rig.conn_control.recv().await,
            Some(ConnectionControl::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn broker_close_cascades_to_pending_work() {
        let mut rig = Rig::open().await;
        rig.enter_confirm_mode().await;
        let mut consumer = start_consumer(&mut rig, "ctag-1").await;

        let confirm = rig
            .channel
            .basic_publish(
                "",
                "tasks",
                PublishOptions::default(),
                BasicProperties::default(),
                &b"x"[..],
            )
            .await
            .unwrap();
        rig.next_out().await;
        rig.next_out().await;
        rig.next_out().await;

        let channel = rig.channel.clone();
        let declare =
            tokio::spawn(async move { channel.queue_declare("tasks", Default::default()).await });
        rig.next_out().await;

        rig.inject(Method::ChannelClose(ChannelClose {
            reply_code: 406,
            reply_text: "PRECONDITION_FAILED".try_into().unwrap(),
            class_id: 50,
            method_id: 10,
        }))
        .await;

        // the engine answers with close-ok before tearing down
        assert!(matches!(
            rig.next_out().await,
            Frame::Method {
                method: Method::ChannelCloseOk,
                ..
            }
        ));
        assert!(matches!(
            rig.conn_control.recv().await,
            Some(ConnectionControl::DeallocateChannel(1))
        ));
        assert!(matches!(
            declare.await.unwrap(),
            Err(Error::ClosedByBroker { reply_code: 406, .. })
        ));
        assert!(matches!(
            confirm.wait().await,
            Err(Error::ClosedByBroker { reply_code: 406, .. })
        ));
        assert!(matches!(
            consumer.wait().await,
            Err(Error::ClosedByBroker { reply_code: 406, .. })
        ));
        // later operations fail locally with the stored cause
        assert!(matches!(
            rig.channel.queue_purge("tasks").await,
            Err(Error::ClosedByBroker { reply_code: 406, .. })
        ));
    }

    #[tokio::test]
    async fn graceful_close_resolves_consumers_ok() {
        let mut rig = Rig::open().await;
        let mut consumer = start_consumer(&mut rig, "ctag-1").await;

        let channel = rig.channel.clone();
        let close = tokio::spawn(async move { channel.close().await });
        assert!(matches!(
            rig.next_out().await,
            Frame::Method {
                method: Method::ChannelClose(_),
                ..
            }
        ));
        rig.inject(Method::ChannelCloseOk).await;

        close.await.unwrap().unwrap();
        consumer.wait().await.unwrap();
    }

    #[tokio::test]
    async fn connection_teardown_fans_out_the_cause() {
        let mut rig = Rig::open().await;
        let mut consumer = start_consumer(&mut rig, "ctag-1").await;

        let cause = Error::Connection(connection::Error::HeartbeatTimeout);
        rig.incoming.send(Err(cause)).await.unwrap();

        assert!(matches!(
            consumer.wait().await,
            Err(Error::Connection(connection::Error::HeartbeatTimeout))
        ));
        assert!(matches!(
            rig.channel.queue_purge("tasks").await,
            Err(Error::Connection(connection::Error::HeartbeatTimeout))
        ));
    }

    #[tokio::test]
    async fn server_cancel_closes_the_consumer_with_a_cause() {
        let mut rig = Rig::open().await;
        let mut consumer = start_consumer(&mut rig, "ctag-1").await;

        rig.inject(Method::BasicCancel(BasicCancel {
            consumer_tag: "ctag-1".try_into().unwrap(),
            no_wait: true,
        }))
        .await;

        assert!(matches!(
            consumer.wait().await,
            Err(Error::CancelledByServer(tag)) if tag.as_str() == "ctag-1"
        ));
    }

    #[tokio::test]
    async fn cancelling_a_consumer_resolves_wait() {
        let mut rig = Rig::open().await;
        let mut consumer = start_consumer(&mut rig, "ctag-1").await;

        let cancel = tokio::spawn(async move {
            consumer.cancel().await.unwrap();
            consumer.wait().await
        });
        assert!(matches!(
            rig.next_out().await,
            Frame::Method {
                method: Method::BasicCancel(_),
                ..
            }
        ));
        rig.inject(Method::BasicCancelOk(BasicCancelOk {
            consumer_tag: "ctag-1".try_into().unwrap(),
        }))
        .await;

        cancel.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn a_timed_out_wait_can_be_awaited_again() {
        let mut rig = Rig::open().await;
        let mut consumer = start_consumer(&mut rig, "ctag-1").await;

        assert!(matches!(
            consumer.wait_timeout(Duration::from_secs(1)).await,
            Err(WaitError::Elapsed)
        ));

        // the expired deadline leaves the wait re-armable
        let settle = tokio::spawn(async move {
            consumer.cancel().await.unwrap();
            consumer.wait().await
        });
        assert!(matches!(
            rig.next_out().await,
            Frame::Method {
                method: Method::BasicCancel(_),
                ..
            }
        ));
        rig.inject(Method::BasicCancelOk(BasicCancelOk {
            consumer_tag: "ctag-1".try_into().unwrap(),
        }))
        .await;

        settle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn huge_announced_body_sizes_are_not_preallocated() {
        let mut rig = Rig::open().await;
        let _consumer = start_consumer(&mut rig, "ctag-1").await;

        rig.inject(Method::BasicDeliver(BasicDeliver {
            consumer_tag: "ctag-1".try_into().unwrap(),
            delivery_tag: 1,
            redelivered: false,
            exchange: "".try_into().unwrap(),
            routing_key: "tasks".try_into().unwrap(),
        }))
        .await;
        rig.incoming
            .send(Ok(Frame::Header {
                channel: 1,
                header: ContentHeader::basic(u64::MAX, BasicProperties::default()),
            }))
            .await
            .unwrap();

        // the engine keeps serving while the body trickles in
        let channel = rig.channel.clone();
        let declare =
            tokio::spawn(async move { channel.queue_declare("tasks", Default::default()).await });
        rig.next_out().await;
        rig.inject(declare_ok("tasks")).await;
        declare.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn returned_messages_reach_the_return_stream() {
        let mut rig = Rig::open().await;

        rig.inject(Method::BasicReturn(BasicReturn {
            reply_code: 312,
            reply_text: "NO_ROUTE".try_into().unwrap(),
            exchange: "".try_into().unwrap(),
            routing_key: "nowhere".try_into().unwrap(),
        }))
        .await;
        rig.incoming
            .send(Ok(Frame::Header {
                channel: 1,
                header: ContentHeader::basic(4, BasicProperties::default()),
            }))
            .await
            .unwrap();
        rig.incoming
            .send(Ok(Frame::Body {
                channel: 1,
                payload: Bytes::from_static(b"lost"),
            }))
            .await
            .unwrap();

        let returned = rig.returns.recv().await.unwrap();
        assert_eq!(returned.reply_code, 312);
        assert_eq!(returned.body, b"lost");
    }

    #[test]
    fn reply_matching_covers_the_irregular_ids() {
        // queue.declare -> declare-ok
        assert!(reply_matches((50, 10), (50, 11)));
        // exchange.unbind -> unbind-ok skips to 51
        assert!(reply_matches((40, 40), (40, 51)));
        assert!(!reply_matches((40, 40), (40, 41)));
        // wrong class never matches
        assert!(!reply_matches((50, 10), (40, 11)));
    }
}
